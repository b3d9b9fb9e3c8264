//! Application use cases. Orchestrate domain logic via ports.

pub mod retry;
pub mod session;

pub use retry::{NoSleep, RetryPolicy, Sleeper, TokioSleeper};
pub use session::{SessionController, SessionSnapshot};
