//! Local (reqwest) implementation of the Metaso upstream.

pub mod http;
pub mod retry;

pub use http::MetasoHttpClient;
pub use retry::{run_with_retry, Decision, RetryPolicy, RetryState, Sleep, TokioSleep};
