//! Read and write operations over an authenticated transport

pub mod read;
pub mod write;

pub use write::{ActionOutcome, Actions, UserRef};
