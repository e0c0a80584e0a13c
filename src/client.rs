//! High-level client over one authenticated session
//!
//! [`WebClient`] owns the cookie jar, transport, rate governor and
//! authenticator for a single account. Mutating calls (writes, uploads,
//! login and logout) are serialized through one async lock so that no two of
//! them race on the jar's CSRF cookie. Reads run without the lock.

use crate::config::Settings;
use crate::governor::{GovernorStats, RateGovernor};
use crate::ops::{ActionOutcome, Actions, UserRef, read};
use crate::session::{
    AuthState, Authenticator, SessionCookieJar, SessionStore, VerificationCodeProvider,
};
use crate::transport::Transport;
use crate::types::{Identity, MediaItem, Profile, SessionSnapshot, StoryItem};
use crate::upload::{
    FfmpegProbe, MediaProbe, PublishedMedia, Surface, UploadPipeline, UploadRequest,
};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Session-aware client for the platform's browser web API
pub struct WebClient {
    settings: Settings,
    transport: Transport,
    governor: RateGovernor,
    auth: Authenticator,
    probe: Arc<dyn MediaProbe>,
    mutation: Mutex<()>,
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("base_url", &self.settings.platform.base_url)
            .field("state", &self.auth.state())
            .finish_non_exhaustive()
    }
}

impl WebClient {
    /// Build a client from validated settings. No network call is made.
    pub fn new(settings: Settings) -> Result<Self> {
        let jar = Arc::new(SessionCookieJar::new());
        let transport = Transport::new(&settings, jar)?;
        let store = SessionStore::from_settings(&settings.session);
        let auth = Authenticator::new(transport.clone(), store, settings.delays.login);
        let probe: Arc<dyn MediaProbe> = Arc::new(FfmpegProbe::new(&settings.upload));

        tracing::debug!(
            "Client ready for {} (session file {})",
            settings.platform.base_url,
            auth.store().path().display()
        );

        Ok(Self {
            governor: RateGovernor::new(settings.limits.clone()),
            settings,
            transport,
            auth,
            probe,
            mutation: Mutex::new(()),
        })
    }

    /// Replace the ffprobe/ffmpeg backed media probe
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.auth.identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    // Session lifecycle

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        codes: &dyn VerificationCodeProvider,
    ) -> Result<Identity> {
        let _guard = self.mutation.lock().await;
        self.auth.login(username, password, codes).await
    }

    /// Restore the persisted snapshot, if any, and verify it with one probe
    pub async fn restore_session(&self) -> Result<AuthState> {
        let _guard = self.mutation.lock().await;
        self.auth.restore_from_store().await
    }

    /// Restore a snapshot obtained elsewhere
    pub async fn restore_snapshot(&self, snapshot: SessionSnapshot) -> Result<AuthState> {
        let _guard = self.mutation.lock().await;
        self.auth.restore_session(snapshot).await
    }

    /// Restore the stored session, falling back to a fresh login
    pub async fn ensure_session(
        &self,
        username: &str,
        password: &str,
        codes: &dyn VerificationCodeProvider,
    ) -> Result<Identity> {
        if let AuthState::Authenticated(identity) = self.restore_session().await? {
            return Ok(identity);
        }
        tracing::info!("No usable stored session, logging in as {}", username);
        self.login(username, password, codes).await
    }

    pub async fn logout(&self) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.auth.logout().await
    }

    fn require_identity(&self) -> Result<Identity> {
        self.auth.identity().ok_or(Error::NotAuthenticated)
    }

    fn actions(&self) -> Actions<'_> {
        Actions {
            transport: &self.transport,
            governor: &self.governor,
            delays: &self.settings.delays,
        }
    }

    // Governed writes

    pub async fn follow_user(&self, user: impl Into<UserRef>) -> Result<ActionOutcome> {
        let user = user.into();
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().follow(&user).await
    }

    pub async fn unfollow_user(&self, user: impl Into<UserRef>) -> Result<ActionOutcome> {
        let user = user.into();
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().unfollow(&user).await
    }

    pub async fn like_media(&self, media_id: u64) -> Result<ActionOutcome> {
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().like(media_id).await
    }

    pub async fn unlike_media(&self, media_id: u64) -> Result<ActionOutcome> {
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().unlike(media_id).await
    }

    pub async fn comment_on_media(&self, media_id: u64, text: &str) -> Result<ActionOutcome> {
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().comment(media_id, text).await
    }

    /// Report stories as viewed; not counted by the governor
    pub async fn mark_stories_seen(&self, stories: &[StoryItem]) -> Result<ActionOutcome> {
        let _guard = self.mutation.lock().await;
        self.require_identity()?;
        self.actions().mark_stories_seen(stories).await
    }

    /// Hourly and daily counters of the rate governor
    pub fn get_stats(&self) -> GovernorStats {
        self.governor.get_stats()
    }

    // Reads

    pub async fn get_profile(&self, username: &str) -> Result<Option<Profile>> {
        self.require_identity()?;
        read::get_profile(&self.transport, username).await
    }

    /// Profile of the logged-in account
    pub async fn get_account_info(&self) -> Result<Option<Profile>> {
        let identity = self.require_identity()?;
        read::get_profile(&self.transport, &identity.username).await
    }

    pub async fn list_followers(&self, user_id: u64, amount: usize) -> Result<Vec<Profile>> {
        self.require_identity()?;
        read::list_followers(&self.transport, user_id, amount).await
    }

    pub async fn list_following(&self, user_id: u64, amount: usize) -> Result<Vec<Profile>> {
        self.require_identity()?;
        read::list_following(&self.transport, user_id, amount).await
    }

    pub async fn list_user_media(&self, user_id: u64, amount: usize) -> Result<Vec<MediaItem>> {
        self.require_identity()?;
        read::list_user_media(&self.transport, user_id, amount).await
    }

    pub async fn list_media_likers(&self, shortcode: &str, amount: usize) -> Result<Vec<Profile>> {
        self.require_identity()?;
        read::list_media_likers(&self.transport, shortcode, amount).await
    }

    pub async fn list_hashtag_media(&self, tag: &str, amount: usize) -> Result<Vec<MediaItem>> {
        self.require_identity()?;
        read::list_hashtag_media(&self.transport, tag, amount).await
    }

    pub async fn list_user_stories(&self, user_id: u64) -> Result<Vec<StoryItem>> {
        self.require_identity()?;
        read::list_user_stories(&self.transport, user_id).await
    }

    pub async fn search_users(&self, query: &str, amount: usize) -> Result<Vec<Profile>> {
        self.require_identity()?;
        read::search_users(&self.transport, query, amount).await
    }

    /// Numeric media id for a shortcode; `None` when it does not resolve
    pub async fn resolve_shortcode_to_id(&self, shortcode: &str) -> Option<u64> {
        read::resolve_shortcode_to_id(&self.transport, shortcode).await
    }

    /// Numeric media id for a post, reel or tv URL
    pub async fn resolve_post_url(&self, post_url: &str) -> Option<u64> {
        read::resolve_post_url(&self.transport, post_url).await
    }

    // Publishing

    pub async fn upload_photo_to_feed(
        &self,
        path: impl AsRef<Path>,
        caption: &str,
    ) -> Result<PublishedMedia> {
        let request = UploadRequest::photo(path.as_ref(), Surface::Feed).with_caption(caption);
        self.publish(&request).await
    }

    pub async fn upload_video_to_feed(
        &self,
        path: impl AsRef<Path>,
        caption: &str,
        thumbnail: Option<&Path>,
    ) -> Result<PublishedMedia> {
        let request = UploadRequest::video(path.as_ref(), Surface::Feed)
            .with_caption(caption)
            .with_thumbnail(thumbnail.map(Path::to_path_buf));
        self.publish(&request).await
    }

    pub async fn upload_photo_to_story(&self, path: impl AsRef<Path>) -> Result<PublishedMedia> {
        let request = UploadRequest::photo(path.as_ref(), Surface::Story);
        self.publish(&request).await
    }

    pub async fn upload_video_to_story(
        &self,
        path: impl AsRef<Path>,
        thumbnail: Option<&Path>,
    ) -> Result<PublishedMedia> {
        let request = UploadRequest::video(path.as_ref(), Surface::Story)
            .with_thumbnail(thumbnail.map(Path::to_path_buf));
        self.publish(&request).await
    }

    pub async fn upload_clip(
        &self,
        path: impl AsRef<Path>,
        caption: &str,
        thumbnail: Option<&Path>,
    ) -> Result<PublishedMedia> {
        let request = UploadRequest::video(path.as_ref(), Surface::Clip)
            .with_caption(caption)
            .with_thumbnail(thumbnail.map(Path::to_path_buf));
        self.publish(&request).await
    }

    /// Run one full publish for an arbitrary request
    pub async fn publish(&self, request: &UploadRequest) -> Result<PublishedMedia> {
        let _guard = self.mutation.lock().await;
        let identity = self.require_identity()?;
        let pipeline = UploadPipeline::new(
            &self.transport,
            self.probe.as_ref(),
            &self.settings.delays,
            &identity.user_id,
        );
        pipeline.publish(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_client(dir: &TempDir) -> WebClient {
        let mut settings = Settings::default()
            .with_base_url("http://127.0.0.1:9")
            .without_delays();
        settings.session.path = dir.path().join("session.json");
        WebClient::new(settings).unwrap()
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);

        assert_eq!(client.auth_state(), AuthState::Unauthenticated);
        assert!(matches!(
            client.like_media(1).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.list_followers(1, 10).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.upload_photo_to_feed(dir.path().join("x.jpg"), "").await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.list_user_stories(1).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.mark_stories_seen(&[]).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            client.get_account_info().await,
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_stays_unauthenticated() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);

        let state = client.restore_session().await.unwrap();
        assert_eq!(state, AuthState::Unauthenticated);
        assert!(client.identity().is_none());
    }

    #[test]
    fn test_fresh_stats_are_empty() {
        let dir = TempDir::new().unwrap();
        let client = offline_client(&dir);
        let stats = client.get_stats();
        assert!(stats.actions.values().all(|a| a.count == 0));
    }
}
