//! Type definitions for the web client
//!
//! Domain models returned to callers, the persisted session record, and the
//! wire shapes of each platform endpoint.

pub mod profile;
pub mod response;
pub mod serde_helpers;
pub mod session;

pub use profile::{MediaItem, MediaKind, OwnerRef, Profile, StoryItem};
pub use session::{CookieRecord, Identity, SessionSnapshot};
