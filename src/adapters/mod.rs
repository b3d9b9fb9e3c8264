//! Infrastructure adapters. Implement outbound ports.
//!
//! HTTP gateways to the backend, the in-memory mock, local persistence and
//! the terminal UI. Map transport errors to `ApiError`.

pub mod http;
pub mod mock;
pub mod persistence;
pub mod ui;
