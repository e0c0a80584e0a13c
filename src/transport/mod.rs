//! Transport layer
//!
//! One reqwest client per session, sharing the session's cookie jar, with
//! pacing, CSRF propagation and bounded 429 retry applied to every call.

pub mod http;
pub mod retry;

pub use http::{Form, RawResponse, Transport};
pub use retry::{Attempt, RetryPolicy, retry_with_backoff};
