//! Local persistence. Credential storage on disk.

pub mod token_store;

pub use token_store::TokenStore;
