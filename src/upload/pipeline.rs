//! Two-phase publish protocol
//!
//! Every publish runs the same sequence under one fresh [`UploadId`]:
//!
//! 1. `Init`: read the source file, probe videos
//! 2. `BinaryUploading`: raw bytes to `rupload_igphoto/` or `rupload_igvideo/`
//! 3. `ThumbnailUploading`: videos only, a frame sent through the photo call
//! 4. `Configuring`: one surface-specific configure POST
//!
//! Neither binary transfers nor configure calls are retried. A configure
//! retried after a partial success can publish the same media twice.

use super::probe::{MediaProbe, VideoInfo};
use super::upload_id::UploadId;
use crate::config::DelaySettings;
use crate::governor::{DelayRange, human_pause};
use crate::transport::{Form, RawResponse, RetryPolicy, Transport};
use crate::types::response::{ConfigureResponse, STATUS_OK};
use crate::{Error, Result, TransportError, UploadError};
use chrono::{Local, Utc};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Story videos longer than this may be cut or refused
pub const STORY_MAX_SECS: f64 = 60.0;
/// Clips longer than this may be cut or refused
pub const CLIP_MAX_SECS: f64 = 90.0;
/// Captions longer than this may be truncated
pub const CAPTION_MAX_CHARS: usize = 2_200;

/// Where the published media appears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Feed,
    Story,
    Clip,
}

impl Surface {
    /// Advisory duration ceiling for videos on this surface
    pub fn max_video_secs(&self) -> Option<f64> {
        match self {
            Surface::Feed => None,
            Surface::Story => Some(STORY_MAX_SECS),
            Surface::Clip => Some(CLIP_MAX_SECS),
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Feed => write!(f, "feed"),
            Surface::Story => write!(f, "story"),
            Surface::Clip => write!(f, "clip"),
        }
    }
}

/// Declared kind of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Video,
}

/// Pipeline position of an [`UploadSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Init,
    BinaryUploading,
    ThumbnailUploading,
    Configuring,
    Published,
    Failed,
}

/// What to publish and where
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub kind: UploadKind,
    pub surface: Surface,
    pub caption: String,
    /// Caller-supplied thumbnail for videos, left in place afterwards
    pub thumbnail: Option<PathBuf>,
}

impl UploadRequest {
    pub fn photo(path: impl Into<PathBuf>, surface: Surface) -> Self {
        Self {
            path: path.into(),
            kind: UploadKind::Photo,
            surface,
            caption: String::new(),
            thumbnail: None,
        }
    }

    pub fn video(path: impl Into<PathBuf>, surface: Surface) -> Self {
        Self {
            path: path.into(),
            kind: UploadKind::Video,
            surface,
            caption: String::new(),
            thumbnail: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<PathBuf>) -> Self {
        self.thumbnail = thumbnail;
        self
    }
}

/// State of one publish, discarded once it finishes
#[derive(Debug)]
pub struct UploadSession {
    upload_id: UploadId,
    kind: UploadKind,
    surface: Surface,
    payload: Arc<Vec<u8>>,
    video: Option<VideoInfo>,
    phase: UploadPhase,
}

impl UploadSession {
    fn new(kind: UploadKind, surface: Surface, payload: Vec<u8>) -> Self {
        Self {
            upload_id: UploadId::next(),
            kind,
            surface,
            payload: Arc::new(payload),
            video: None,
            phase: UploadPhase::Init,
        }
    }

    pub fn upload_id(&self) -> UploadId {
        self.upload_id
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    fn advance(&mut self, phase: UploadPhase) {
        tracing::info!(
            "Upload {} ({} {:?}): {:?} -> {:?}",
            self.upload_id,
            self.surface,
            self.kind,
            self.phase,
            phase
        );
        self.phase = phase;
    }
}

/// Descriptor returned by a successful configure call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedMedia {
    pub upload_id: String,
    pub surface: Surface,
    pub media_id: String,
    pub pk: u64,
    pub code: String,
    /// Full configure response
    pub raw: Value,
}

/// Runs publishes against one transport
pub struct UploadPipeline<'a> {
    transport: &'a Transport,
    probe: &'a dyn MediaProbe,
    delays: &'a DelaySettings,
    user_id: &'a str,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(
        transport: &'a Transport,
        probe: &'a dyn MediaProbe,
        delays: &'a DelaySettings,
        user_id: &'a str,
    ) -> Self {
        Self {
            transport,
            probe,
            delays,
            user_id,
        }
    }

    /// Publish one file, returning the configured media
    pub async fn publish(&self, request: &UploadRequest) -> Result<PublishedMedia> {
        let payload = read_source(&request.path).await?;
        let mut session = UploadSession::new(request.kind, request.surface, payload);
        tracing::info!(
            "Publishing {} to {} as upload {} ({} bytes)",
            request.path.display(),
            request.surface,
            session.upload_id,
            session.payload.len()
        );

        let caption_chars = request.caption.chars().count();
        if caption_chars > CAPTION_MAX_CHARS {
            tracing::warn!(
                "Caption has {} characters, above the {} the platform displays",
                caption_chars,
                CAPTION_MAX_CHARS
            );
        }

        if request.kind == UploadKind::Video {
            let info = self.probe.probe_video(&request.path).await;
            if let Some(ceiling) = request.surface.max_video_secs()
                && info.duration_secs > ceiling
            {
                tracing::warn!(
                    "{} video is {:.1}s, above the {}s the surface allows; proceeding",
                    request.surface,
                    info.duration_secs,
                    ceiling
                );
            }
            session.video = Some(info);
        }

        let result = self.run(&mut session, request).await;
        if let Err(e) = &result {
            session.advance(UploadPhase::Failed);
            tracing::error!("Upload {} failed: {}", session.upload_id, e);
        }
        result
    }

    async fn run(
        &self,
        session: &mut UploadSession,
        request: &UploadRequest,
    ) -> Result<PublishedMedia> {
        session.advance(UploadPhase::BinaryUploading);
        let pause = match session.video {
            None => {
                let entity_type = photo_entity_type(&request.path);
                self.upload_photo_binary(session.upload_id, &session.payload, entity_type)
                    .await?;
                self.delays.before_photo_configure
            }
            Some(info) => {
                self.upload_video_binary(session, info).await?;
                session.advance(UploadPhase::ThumbnailUploading);
                self.upload_thumbnail(session.upload_id, request).await;
                self.delays.before_video_configure
            }
        };

        pause_before_configure(pause).await;

        session.advance(UploadPhase::Configuring);
        let (endpoint, form) = self.configure_form(session, &request.caption);
        let published = self
            .configure(endpoint, &form, session.upload_id, session.surface)
            .await?;
        session.advance(UploadPhase::Published);
        tracing::info!(
            "Published upload {} to {} as media {} ({})",
            session.upload_id,
            session.surface,
            published.media_id,
            published.code
        );
        Ok(published)
    }

    async fn upload_photo_binary(
        &self,
        upload_id: UploadId,
        bytes: &Arc<Vec<u8>>,
        entity_type: &str,
    ) -> Result<()> {
        let entity_name = upload_id.entity_name();
        let params = json!({
            "retry_context": retry_context(),
            "media_type": "1",
            "xsharing_user_ids": "[]",
            "upload_id": upload_id.to_string(),
            "image_compression": json!({
                "lib_name": "moz",
                "lib_version": "3.1.m",
                "quality": "80",
            })
            .to_string(),
        });

        let headers = header_map(&[
            ("x-entity-name", entity_name.clone()),
            ("x-entity-length", bytes.len().to_string()),
            ("x-entity-type", entity_type.to_string()),
            ("x-instagram-rupload-params", params.to_string()),
            ("offset", "0".to_string()),
            ("content-type", "application/octet-stream".to_string()),
        ])?;

        let path = format!("rupload_igphoto/{entity_name}");
        let raw = self
            .transfer(Method::POST, &path, headers, Some(Arc::clone(bytes)), upload_id)
            .await?;
        tracing::debug!("Photo binary for {} accepted: HTTP {}", upload_id, raw.status);
        Ok(())
    }

    async fn upload_video_binary(&self, session: &UploadSession, info: VideoInfo) -> Result<()> {
        let upload_id = session.upload_id;
        let entity_name = upload_id.entity_name();
        let waterfall_id = uuid::Uuid::new_v4().to_string();
        let sharing = if self.user_id.is_empty() {
            "[]".to_string()
        } else {
            json!([self.user_id]).to_string()
        };

        let mut params = json!({
            "retry_context": retry_context(),
            "media_type": "2",
            "xsharing_user_ids": sharing,
            "upload_id": upload_id.to_string(),
            "upload_media_duration_ms": info.duration_ms().to_string(),
            "upload_media_width": info.width.to_string(),
            "upload_media_height": info.height.to_string(),
        });
        match session.surface {
            Surface::Clip => {
                params["is_clips_video"] = json!("1");
            }
            Surface::Story => {
                params["extract_cover_frame"] = json!("1");
                params["content_tags"] = json!("has-overlay");
                params["for_album"] = json!("1");
            }
            Surface::Feed => {}
        }
        let params = params.to_string();
        let length = session.payload.len().to_string();
        let path = format!("rupload_igvideo/{entity_name}");

        let init_headers = header_map(&[
            ("accept-encoding", "gzip, deflate".to_string()),
            ("x-instagram-rupload-params", params.clone()),
            ("x_fb_video_waterfall_id", waterfall_id.clone()),
            ("x-entity-type", "video/mp4".to_string()),
            ("x-entity-name", entity_name.clone()),
            ("x-entity-length", length.clone()),
        ])?;
        let init = self
            .transfer(Method::GET, &path, init_headers, None, upload_id)
            .await?;
        tracing::debug!("Video init for {}: HTTP {}", upload_id, init.status);

        let upload_headers = header_map(&[
            ("offset", "0".to_string()),
            ("x-entity-name", entity_name),
            ("x-entity-length", length),
            ("content-type", "application/octet-stream".to_string()),
            ("x-entity-type", "video/mp4".to_string()),
            ("x-instagram-rupload-params", params),
            ("x_fb_video_waterfall_id", waterfall_id),
        ])?;
        let raw = self
            .transfer(
                Method::POST,
                &path,
                upload_headers,
                Some(Arc::clone(&session.payload)),
                upload_id,
            )
            .await?;
        tracing::debug!("Video binary for {} accepted: HTTP {}", upload_id, raw.status);
        Ok(())
    }

    /// Upload a cover frame under the same id; failures only warn
    async fn upload_thumbnail(&self, upload_id: UploadId, request: &UploadRequest) {
        let frame = match &request.thumbnail {
            Some(path) => tokio::fs::read(path).await.map_err(Error::from),
            None => self.extract_thumbnail(&request.path).await,
        };

        let bytes = match frame {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                tracing::warn!("No thumbnail for upload {}: {}; skipping", upload_id, e);
                return;
            }
        };

        let entity_type = request
            .thumbnail
            .as_deref()
            .map(photo_entity_type)
            .unwrap_or("image/jpeg");
        if let Err(e) = self.upload_photo_binary(upload_id, &bytes, entity_type).await {
            tracing::warn!("Thumbnail for upload {} rejected: {}", upload_id, e);
        }
    }

    async fn extract_thumbnail(&self, video: &Path) -> Result<Vec<u8>> {
        // Removed on drop, whether or not the frame is ever uploaded
        let frame = tempfile::Builder::new()
            .prefix("gramweb-thumb-")
            .suffix(".jpg")
            .tempfile()?;
        self.probe.extract_frame(video, frame.path()).await?;
        let bytes = tokio::fs::read(frame.path()).await?;
        Ok(bytes)
    }

    /// Binary transfer; any non-2xx answer rejects the upload
    async fn transfer(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Arc<Vec<u8>>>,
        upload_id: UploadId,
    ) -> Result<RawResponse> {
        let raw = match self.transport.upload(method, path, headers, body).await {
            Ok(raw) => raw,
            Err(Error::Transport(TransportError::RateLimited { body, .. })) => {
                return Err(UploadError::BinaryRejected {
                    upload_id: upload_id.to_string(),
                    status: 429,
                    body,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        if !raw.is_success() {
            return Err(UploadError::BinaryRejected {
                upload_id: upload_id.to_string(),
                status: raw.status,
                body: raw.body,
            }
            .into());
        }
        Ok(raw)
    }

    fn configure_form(&self, session: &UploadSession, caption: &str) -> (&'static str, Form) {
        let upload_id = session.upload_id.to_string();
        let timezone_offset = self.transport.platform().timezone_offset.to_string();

        match (session.surface, session.video) {
            (Surface::Feed, None) => (
                "media/configure/",
                vec![
                    ("upload_id", upload_id),
                    ("caption", caption.to_string()),
                    ("usertags", String::new()),
                    ("custom_accessibility_caption", String::new()),
                    ("retry_timeout", String::new()),
                ],
            ),
            (Surface::Story, None) => {
                let now = Utc::now().timestamp();
                let mut form = story_fields(upload_id, timezone_offset, now - 5, now, "4");
                form.push(("original_media_type", "photo".to_string()));
                form.push(("_uid", self.user_id.to_string()));
                ("media/configure_to_story/", form)
            }
            (Surface::Story, Some(info)) => {
                let now = Utc::now().timestamp();
                let length = seconds(info.length_secs());
                let mut form = story_fields(upload_id, timezone_offset, now - 7, now, "3");
                form.extend([
                    ("original_media_type", "video".to_string()),
                    ("video_result", String::new()),
                    ("camera_position", "back".to_string()),
                    ("length", length),
                    (
                        "clips",
                        json!([{
                            "length": info.length_secs(),
                            "source_type": "3",
                            "camera_position": "back",
                        }])
                        .to_string(),
                    ),
                    ("extra", source_extra(&info)),
                    ("_uid", self.user_id.to_string()),
                ]);
                ("media/configure_to_story/?video=1", form)
            }
            (Surface::Feed, Some(info)) => (
                "media/configure/?video=1",
                vec![
                    ("upload_id", upload_id),
                    ("caption", caption.to_string()),
                    ("source_type", "4".to_string()),
                    ("filter_type", "0".to_string()),
                    ("poster_frame_index", "0".to_string()),
                    ("length", seconds(info.length_secs())),
                    ("audio_muted", "false".to_string()),
                    ("usertags", json!({"in": []}).to_string()),
                    ("date_time_original", date_time_original()),
                    ("timezone_offset", timezone_offset),
                    ("clips", video_clips(&info)),
                    ("extra", source_extra(&info)),
                ],
            ),
            (Surface::Clip, _) => {
                let info = session.video.unwrap_or(VideoInfo::FALLBACK);
                (
                    "media/configure_to_clips/?video=1",
                    vec![
                        ("upload_id", upload_id),
                        ("caption", caption.to_string()),
                        ("source_type", "4".to_string()),
                        ("filter_type", "0".to_string()),
                        ("timezone_offset", timezone_offset),
                        ("date_time_original", date_time_original()),
                        ("clips_share_preview_to_feed", "1".to_string()),
                        ("length", seconds(info.length_secs())),
                        ("audio_muted", "false".to_string()),
                        ("poster_frame_index", "70".to_string()),
                        ("usertags", json!({"in": []}).to_string()),
                        ("clips", video_clips(&info)),
                        ("extra", source_extra(&info)),
                    ],
                )
            }
        }
    }

    async fn configure(
        &self,
        endpoint: &str,
        form: &Form,
        upload_id: UploadId,
        surface: Surface,
    ) -> Result<PublishedMedia> {
        let url = self.transport.api_url(endpoint);
        let rejected = |body: String| -> Error {
            UploadError::ConfigureRejected {
                upload_id: upload_id.to_string(),
                body,
            }
            .into()
        };

        let raw = match self
            .transport
            .execute(endpoint, RetryPolicy::SingleShot, |http| {
                http.post(&url).form(form)
            })
            .await
        {
            Ok(raw) => raw,
            Err(Error::Transport(TransportError::RateLimited { body, .. })) => {
                return Err(rejected(body));
            }
            Err(e) => return Err(e),
        };

        if !raw.is_success() {
            tracing::warn!("Configure {} answered HTTP {}", endpoint, raw.status);
            return Err(rejected(raw.body));
        }

        let Ok(response) = serde_json::from_str::<ConfigureResponse>(&raw.body) else {
            return Err(rejected(raw.body));
        };
        let media = match response.media {
            Some(media) if response.status.as_deref() == Some(STATUS_OK) && !media.is_empty() => {
                media
            }
            _ => {
                if let Some(message) = &response.message {
                    tracing::warn!("Configure {} refused: {}", endpoint, message);
                }
                return Err(rejected(raw.body));
            }
        };

        let full: Value = serde_json::from_str(&raw.body).unwrap_or(Value::Null);
        let media_id = if media.id.is_empty() {
            media.pk.to_string()
        } else {
            media.id
        };
        Ok(PublishedMedia {
            upload_id: upload_id.to_string(),
            surface,
            media_id,
            pk: media.pk,
            code: media.code,
            raw: full,
        })
    }
}

async fn read_source(path: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(UploadError::MissingFile {
            path: path.display().to_string(),
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

async fn pause_before_configure(range: DelayRange) {
    if !range.is_zero() {
        tracing::debug!(
            "Waiting {}-{}ms before configure",
            range.min_ms,
            range.max_ms
        );
    }
    human_pause(range).await;
}

fn photo_entity_type(path: &Path) -> &'static str {
    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if is_png { "image/png" } else { "image/jpeg" }
}

fn retry_context() -> String {
    json!({
        "num_step_auto_retry": 0,
        "num_reupload": 0,
        "num_step_manual_retry": 0,
    })
    .to_string()
}

fn header_map(pairs: &[(&'static str, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::internal(format!("invalid {name} header: {e}")))?;
        headers.insert(HeaderName::from_static(*name), value);
    }
    Ok(headers)
}

/// Render seconds the way JSON renders the same float, so `length` and
/// `clips[].length` agree
fn seconds(secs: f64) -> String {
    serde_json::Number::from_f64(secs)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "0.0".to_string())
}

fn video_clips(info: &VideoInfo) -> String {
    json!([{ "length": info.length_secs(), "source_type": "4" }]).to_string()
}

fn source_extra(info: &VideoInfo) -> String {
    json!({ "source_width": info.width, "source_height": info.height }).to_string()
}

fn date_time_original() -> String {
    Local::now().format("%Y%m%dT%H%M%S.000").to_string()
}

fn story_fields(
    upload_id: String,
    timezone_offset: String,
    shared_at: i64,
    now: i64,
    source_type: &str,
) -> Form {
    vec![
        ("upload_id", upload_id),
        ("source_type", source_type.to_string()),
        ("configure_mode", "1".to_string()),
        ("timezone_offset", timezone_offset),
        ("client_shared_at", shared_at.to_string()),
        ("client_timestamp", now.to_string()),
        ("capture_type", "normal".to_string()),
        ("creation_surface", "camera".to_string()),
        ("camera_entry_point", "25".to_string()),
        ("has_original_sound", "1".to_string()),
        ("camera_session_id", uuid::Uuid::new_v4().to_string()),
        ("composition_id", uuid::Uuid::new_v4().to_string()),
        ("filter_type", "0".to_string()),
        ("_uuid", uuid::Uuid::new_v4().to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::session::SessionCookieJar;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{
        body_string_contains, header, header_exists, method, path, path_regex, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubProbe {
        info: VideoInfo,
        frames: Mutex<Vec<PathBuf>>,
        fail_frames: bool,
    }

    impl StubProbe {
        fn new(info: VideoInfo) -> Self {
            Self {
                info,
                frames: Mutex::new(Vec::new()),
                fail_frames: false,
            }
        }
    }

    #[async_trait]
    impl MediaProbe for StubProbe {
        async fn probe_video(&self, _path: &Path) -> VideoInfo {
            self.info
        }

        async fn extract_frame(&self, _video: &Path, output: &Path) -> Result<()> {
            self.frames.lock().unwrap().push(output.to_path_buf());
            if self.fail_frames {
                return Err(Error::internal("no frame"));
            }
            tokio::fs::write(output, b"\xff\xd8frame").await?;
            Ok(())
        }
    }

    fn ten_second_portrait() -> VideoInfo {
        VideoInfo {
            duration_secs: 10.0,
            width: 1080,
            height: 1920,
        }
    }

    async fn setup(server: &MockServer) -> (Transport, DelaySettings) {
        let settings = Settings::default().with_base_url(&server.uri()).without_delays();
        let jar = Arc::new(SessionCookieJar::new());
        jar.set("csrftoken", "tok");
        jar.set("sessionid", "sess");
        let transport = Transport::new(&settings, jar).unwrap();
        (transport, settings.delays.clone())
    }

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn configured() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "media": {"pk": 3141592653u64, "id": "3141592653_42", "code": "CxYz"}
        }))
    }

    #[tokio::test]
    async fn test_photo_to_feed_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/rupload_igphoto/\d+_0_\d{10}$"))
            .and(header("x-entity-type", "image/jpeg"))
            .and(header("x-entity-length", "4"))
            .and(header("offset", "0"))
            .and(header_exists("x-instagram-rupload-params"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure/"))
            .and(body_string_contains("caption=hello"))
            .respond_with(configured())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_file(&dir, "pic.jpg", b"\xff\xd8\xff\xe0");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let published = pipeline
            .publish(&UploadRequest::photo(&photo, Surface::Feed).with_caption("hello"))
            .await
            .unwrap();
        assert_eq!(published.media_id, "3141592653_42");
        assert_eq!(published.code, "CxYz");
        assert_eq!(published.surface, Surface::Feed);
        assert_eq!(published.raw["status"], "ok");
    }

    #[tokio::test]
    async fn test_video_to_feed_shares_one_upload_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/rupload_igvideo/"))
            .and(header_exists("x_fb_video_waterfall_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"offset": 0})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/rupload_igvideo/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/rupload_igphoto/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure/"))
            .and(query_param("video", "1"))
            .and(body_string_contains("length=10.0"))
            .respond_with(configured())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let video = write_file(&dir, "clip.mp4", b"\x00\x00\x00\x18ftypmp42");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        pipeline
            .publish(&UploadRequest::video(&video, Surface::Feed).with_caption("ten seconds"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let upload_ids: Vec<String> = requests
            .iter()
            .filter_map(|r| r.headers.get("x-instagram-rupload-params"))
            .map(|v| {
                let params: Value = serde_json::from_slice(v.as_bytes()).unwrap();
                params["upload_id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(upload_ids.len(), 3);
        assert!(upload_ids.iter().all(|id| id == &upload_ids[0]));

        let video_params: Value = serde_json::from_slice(
            requests[0].headers["x-instagram-rupload-params"].as_bytes(),
        )
        .unwrap();
        assert_eq!(video_params["upload_media_duration_ms"], "10000");
        assert_eq!(video_params["xsharing_user_ids"], "[\"42\"]");

        let configure = requests.last().unwrap();
        let body = String::from_utf8_lossy(&configure.body);
        assert!(body.contains(&format!("upload_id={}", upload_ids[0])));

        let frames = probe.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].exists(), "temporary thumbnail must be removed");
    }

    #[tokio::test]
    async fn test_caller_thumbnail_is_kept() {
        let server = MockServer::start().await;
        Mock::given(path_regex(r"^/rupload_ig(video|photo)/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure_to_story/"))
            .and(body_string_contains("original_media_type=video"))
            .respond_with(configured())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let video = write_file(&dir, "story.mp4", b"video");
        let thumb = write_file(&dir, "cover.png", b"\x89PNG");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        pipeline
            .publish(
                &UploadRequest::video(&video, Surface::Story).with_thumbnail(Some(thumb.clone())),
            )
            .await
            .unwrap();

        assert!(thumb.exists());
        assert!(probe.frames.lock().unwrap().is_empty());
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().any(|r| {
            r.url.path().starts_with("/rupload_igphoto/")
                && r.headers.get("x-entity-type").is_some_and(|v| v == "image/png")
        }));
    }

    #[tokio::test]
    async fn test_story_video_over_ceiling_still_publishes() {
        let server = MockServer::start().await;
        Mock::given(path_regex(r"^/rupload_ig(video|photo)/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure_to_story/"))
            .and(query_param("video", "1"))
            .and(body_string_contains("length=75.5"))
            .respond_with(configured())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let video = write_file(&dir, "long.mp4", b"video");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(VideoInfo {
            duration_secs: 75.5,
            width: 1080,
            height: 1920,
        });
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let published = pipeline
            .publish(&UploadRequest::video(&video, Surface::Story))
            .await
            .unwrap();
        assert_eq!(published.surface, Surface::Story);
        assert_eq!(published.code, "CxYz");

        let requests = server.received_requests().await.unwrap();
        let params: Value = serde_json::from_slice(
            requests[0].headers["x-instagram-rupload-params"].as_bytes(),
        )
        .unwrap();
        assert_eq!(params["upload_media_duration_ms"], "75500");
        assert_eq!(params["extract_cover_frame"], "1");
    }

    #[tokio::test]
    async fn test_thumbnail_failure_still_configures() {
        let server = MockServer::start().await;
        Mock::given(path_regex(r"^/rupload_igvideo/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure_to_clips/"))
            .and(body_string_contains("poster_frame_index=70"))
            .respond_with(configured())
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let video = write_file(&dir, "reel.mp4", b"video");
        let (transport, delays) = setup(&server).await;
        let mut probe = StubProbe::new(VideoInfo {
            duration_secs: 120.0,
            width: 720,
            height: 1280,
        });
        probe.fail_frames = true;
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let published = pipeline
            .publish(&UploadRequest::video(&video, Surface::Clip))
            .await
            .unwrap();
        assert_eq!(published.surface, Surface::Clip);

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.iter().any(|r| r.url.path().starts_with("/rupload_igphoto/")));
        let params: Value = serde_json::from_slice(
            requests[0].headers["x-instagram-rupload-params"].as_bytes(),
        )
        .unwrap();
        assert_eq!(params["is_clips_video"], "1");
    }

    #[tokio::test]
    async fn test_binary_rejection_stops_before_configure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/rupload_igphoto/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad image"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path_regex(r"configure"))
            .respond_with(configured())
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_file(&dir, "pic.jpg", b"jpeg");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let err = pipeline
            .publish(&UploadRequest::photo(&photo, Surface::Story))
            .await
            .unwrap_err();
        match err {
            Error::Upload(UploadError::BinaryRejected { status, body, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad image");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case(json!({"status": "fail", "message": "media_needs_reupload"}), 200)]
    #[case(json!({"status": "ok", "media": {}}), 200)]
    #[case(json!({"status": "ok"}), 200)]
    #[case(json!({"message": "login_required"}), 400)]
    #[tokio::test]
    async fn test_configure_rejections_carry_raw_body(#[case] reply: Value, #[case] status: u16) {
        let server = MockServer::start().await;
        Mock::given(path_regex(r"^/rupload_igphoto/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/media/configure/"))
            .respond_with(ResponseTemplate::new(status).set_body_json(reply.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_file(&dir, "pic.jpg", b"jpeg");
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let err = pipeline
            .publish(&UploadRequest::photo(&photo, Surface::Feed))
            .await
            .unwrap_err();
        match err {
            Error::Upload(UploadError::ConfigureRejected { upload_id, body }) => {
                assert!(!upload_id.is_empty());
                let echoed: Value = serde_json::from_str(&body).unwrap();
                assert_eq!(echoed, reply);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_sends_nothing() {
        let server = MockServer::start().await;
        let (transport, delays) = setup(&server).await;
        let probe = StubProbe::new(ten_second_portrait());
        let pipeline = UploadPipeline::new(&transport, &probe, &delays, "42");

        let err = pipeline
            .publish(&UploadRequest::photo("/nonexistent/pic.jpg", Surface::Feed))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upload(UploadError::MissingFile { .. })));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[rstest]
    #[case(10.0, "10.0")]
    #[case(10.01, "10.01")]
    #[case(61.235, "61.235")]
    fn test_seconds_matches_json_rendering(#[case] secs: f64, #[case] expected: &str) {
        assert_eq!(seconds(secs), expected);
        assert_eq!(json!(secs).to_string(), expected);
    }

    #[rstest]
    #[case("a.PNG", "image/png")]
    #[case("a.png", "image/png")]
    #[case("a.jpeg", "image/jpeg")]
    #[case("noext", "image/jpeg")]
    fn test_photo_entity_type(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(photo_entity_type(Path::new(name)), expected);
    }
}
