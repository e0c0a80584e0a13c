//! Error handling for the web client
//!
//! This module defines error types and handling patterns used throughout the crate.

pub mod types;

pub use types::{AuthError, Error, Result, TransportError, UploadError};
