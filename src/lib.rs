//! gramweb - browser web API client for a photo-sharing platform
//!
//! A session-aware client that talks to the platform's private, browser-facing
//! endpoints the same way a logged-in browser does: cookie-derived CSRF
//! tokens, web-form writes, cursor-paginated reads and the two-phase media
//! upload protocol.
//!
//! # Architecture
//!
//! - **Session**: login state machine (checkpoint and two-factor branches),
//!   cookie jar and on-disk snapshot store
//! - **Transport**: CSRF-aware request layer with bounded HTTP 429 backoff
//! - **Operations**: reads (profiles, followers, media, likers, hashtags) and
//!   governed writes (follow, like, comment)
//! - **Governor**: hourly and daily ceilings for mutating actions
//! - **Upload**: binary transfer then configure, for feed, story and clips
//!
//! # Examples
//!
//! ```rust,no_run
//! use gramweb::{NoCodeProvider, Settings, WebClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = WebClient::new(Settings::default())?;
//! client.ensure_session("user", "secret", &NoCodeProvider).await?;
//!
//! let media_id = client.resolve_post_url("https://www.instagram.com/p/Cabc123/").await;
//! if let Some(id) = media_id {
//!     client.like_media(id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod governor;
pub mod ops;
pub mod session;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::WebClient;
pub use config::Settings;
pub use error::{AuthError, Error, Result, TransportError, UploadError};
pub use governor::{ActionKind, GovernorStats, RateGovernor};
pub use ops::{ActionOutcome, UserRef};
pub use session::{AuthState, FixedCode, NoCodeProvider, VerificationCodeProvider};
pub use types::{Identity, MediaItem, MediaKind, Profile, SessionSnapshot, StoryItem};
pub use upload::{MediaProbe, PublishedMedia, Surface, VideoInfo};
