//! Media publishing
//!
//! Photos, videos, stories and clips all go through [`UploadPipeline`]: a
//! binary transfer followed by one configure call, correlated by an
//! [`UploadId`].

pub mod pipeline;
pub mod probe;
pub mod upload_id;

pub use pipeline::{
    PublishedMedia, Surface, UploadKind, UploadPhase, UploadPipeline, UploadRequest,
    UploadSession,
};
pub use probe::{FfmpegProbe, MediaProbe, VideoInfo};
pub use upload_id::UploadId;
