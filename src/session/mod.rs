//! Session management
//!
//! The cookie jar shared with the HTTP client, durable snapshots of an
//! authenticated session, and the login state machine that produces them.

pub mod auth;
pub mod cookies;
pub mod store;

pub use auth::{
    AuthState, Authenticator, Challenge, FixedCode, NoCodeProvider, VerificationCodeProvider,
};
pub use cookies::SessionCookieJar;
pub use store::{SessionStore, SnapshotRejection};
