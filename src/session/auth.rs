//! Login state machine
//!
//! ```text
//! Unauthenticated -> AwaitingCsrf -> LoggingIn -> Authenticated
//!                                              -> CheckpointRequired -> Authenticated | Failed
//!                                              -> TwoFactorRequired  -> Authenticated | Failed
//!                                              -> Failed
//! ```
//!
//! Verification codes for the checkpoint and two-factor branches come from an
//! injected [`VerificationCodeProvider`]. Every transition into
//! `Authenticated` writes a session snapshot before returning.

use super::cookies::SessionCookieJar;
use super::store::SessionStore;
use crate::governor::{DelayRange, human_pause};
use crate::transport::{Form, RawResponse, RetryPolicy, Transport};
use crate::types::response::{LoginResponse, WebFormDataResponse};
use crate::types::{Identity, SessionSnapshot};
use crate::{AuthError, Error, Result, TransportError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};

const LOGIN_PATH: &str = "accounts/login/ajax/";
const TWO_FACTOR_PATH: &str = "accounts/login/ajax/two_factor/";
const LOGOUT_PATH: &str = "accounts/logout/ajax/";
const PROBE_PATH: &str = "accounts/edit/web_form_data/";

/// Where the session is in the login lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingCsrf,
    LoggingIn,
    CheckpointRequired,
    TwoFactorRequired,
    Authenticated(Identity),
    Failed(String),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Which out-of-band verification the platform asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Security checkpoint; the code was sent over the selected channel
    Checkpoint { username: String },
    /// Two-factor login
    TwoFactor { username: String },
}

/// Supplies verification codes during login
#[async_trait]
pub trait VerificationCodeProvider: Send + Sync {
    async fn request_code(&self, challenge: &Challenge) -> Result<String>;
}

/// Provider that always answers with the same code
#[derive(Debug, Clone)]
pub struct FixedCode(pub String);

#[async_trait]
impl VerificationCodeProvider for FixedCode {
    async fn request_code(&self, _challenge: &Challenge) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Provider for unattended runs; any challenge fails the login
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCodeProvider;

#[async_trait]
impl VerificationCodeProvider for NoCodeProvider {
    async fn request_code(&self, challenge: &Challenge) -> Result<String> {
        Err(Error::internal(format!(
            "verification code required ({:?}) but no provider is configured",
            challenge
        )))
    }
}

/// Drives login and restoration for one session
#[derive(Debug)]
pub struct Authenticator {
    transport: Transport,
    store: SessionStore,
    login_delay: DelayRange,
    state: Mutex<AuthState>,
}

impl Authenticator {
    pub fn new(transport: Transport, store: SessionStore, login_delay: DelayRange) -> Self {
        Self {
            transport,
            store,
            login_delay,
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        match &*self.lock() {
            AuthState::Authenticated(identity) => Some(identity.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn jar(&self) -> &Arc<SessionCookieJar> {
        self.transport.jar()
    }

    /// Log in with credentials, resolving checkpoint and two-factor branches
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        codes: &dyn VerificationCodeProvider,
    ) -> Result<Identity> {
        tracing::info!("Logging in as {}", username);
        self.jar().clear();
        self.transition(AuthState::AwaitingCsrf);

        let root = self.transport.web_url("/");
        if let Err(e) = self.transport.get_page(&root).await {
            self.fail(&e.to_string());
            return Err(e);
        }
        if self.jar().csrf_token().is_none() {
            self.fail("no CSRF cookie");
            return Err(AuthError::NoCsrfToken.into());
        }

        human_pause(self.login_delay).await;
        self.transition(AuthState::LoggingIn);

        let form: Form = vec![
            ("username", username.to_string()),
            ("enc_password", browser_password(password, Utc::now().timestamp())),
            ("queryParams", "{}".to_string()),
            ("optIntoOneTap", "false".to_string()),
        ];
        let raw = self
            .transport
            .post_form_url(
                &self.transport.web_url(LOGIN_PATH),
                &form,
                RetryPolicy::Retryable,
            )
            .await
            .inspect_err(|e| self.fail(&e.to_string()))?;
        let response =
            decode_login(&raw, LOGIN_PATH).inspect_err(|e| self.fail(&e.to_string()))?;

        if response.authenticated == Some(true) {
            let Some(user_id) = self.account_id(response.user_id.clone()) else {
                let message = "authenticated without an account id".to_string();
                tracing::error!("Login for {} {}", username, message);
                self.fail(&message);
                return Err(AuthError::LoginRejected {
                    message,
                    body: raw.body,
                }
                .into());
            };
            return Ok(self.authenticated(Identity::new(user_id, username)));
        }

        if let Some(checkpoint_url) = response.checkpoint_url.as_deref() {
            tracing::warn!("Login for {} requires a security checkpoint", username);
            self.transition(AuthState::CheckpointRequired);
            return self.resolve_checkpoint(username, checkpoint_url, codes).await;
        }

        if response.two_factor_required == Some(true) {
            tracing::warn!("Login for {} requires two-factor verification", username);
            self.transition(AuthState::TwoFactorRequired);
            let identifier = response
                .two_factor_info
                .map(|info| info.two_factor_identifier)
                .unwrap_or_default();
            return self.resolve_two_factor(username, &identifier, codes).await;
        }

        let message = response
            .message
            .unwrap_or_else(|| "credentials were not accepted".to_string());
        tracing::error!("Login rejected: {}", message);
        self.fail(&message);
        Err(AuthError::LoginRejected {
            message,
            body: raw.body,
        }
        .into())
    }

    async fn resolve_checkpoint(
        &self,
        username: &str,
        checkpoint_url: &str,
        codes: &dyn VerificationCodeProvider,
    ) -> Result<Identity> {
        let url = if checkpoint_url.starts_with("http") {
            checkpoint_url.to_string()
        } else {
            self.transport.web_url(checkpoint_url)
        };

        let result = async {
            self.transport.get_page(&url).await?;
            // Channel 1 is email, the channel the web client offers first
            let choice: Form = vec![("choice", "1".to_string())];
            self.transport
                .post_form_url(&url, &choice, RetryPolicy::SingleShot)
                .await?;

            let code = codes
                .request_code(&Challenge::Checkpoint {
                    username: username.to_string(),
                })
                .await?;
            let submit: Form = vec![("security_code", code.trim().to_string())];
            self.transport
                .post_form_url(&url, &submit, RetryPolicy::SingleShot)
                .await
        }
        .await;

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => return Err(self.checkpoint_failed(e.to_string())),
        };

        if !raw.is_success() || !self.jar().has_session() {
            return Err(self.checkpoint_failed(format!(
                "HTTP {} without a session cookie: {}",
                raw.status, raw.body
            )));
        }
        let Some(user_id) = self.jar().user_id() else {
            return Err(
                self.checkpoint_failed("session cookie issued without an account id".to_string())
            );
        };

        tracing::info!("Checkpoint passed for {}", username);
        Ok(self.authenticated(Identity::new(user_id, username)))
    }

    async fn resolve_two_factor(
        &self,
        username: &str,
        identifier: &str,
        codes: &dyn VerificationCodeProvider,
    ) -> Result<Identity> {
        let result = async {
            let code = codes
                .request_code(&Challenge::TwoFactor {
                    username: username.to_string(),
                })
                .await?;
            let form: Form = vec![
                ("username", username.to_string()),
                ("verificationCode", code.trim().to_string()),
                ("identifier", identifier.to_string()),
                ("queryParams", "{}".to_string()),
            ];
            let raw = self
                .transport
                .post_form_url(
                    &self.transport.web_url(TWO_FACTOR_PATH),
                    &form,
                    RetryPolicy::SingleShot,
                )
                .await?;
            let response: LoginResponse = decode_login(&raw, TWO_FACTOR_PATH)?;
            Ok::<_, Error>((raw, response))
        }
        .await;

        let (raw, response) = match result {
            Ok(pair) => pair,
            Err(e) => return Err(self.two_factor_failed(e.to_string())),
        };

        if response.authenticated != Some(true) {
            let reason = response.message.unwrap_or(raw.body);
            return Err(self.two_factor_failed(reason));
        }

        let Some(user_id) = self.account_id(response.user_id) else {
            let reason = "authenticated without an account id".to_string();
            return Err(self.two_factor_failed(reason));
        };
        tracing::info!("Two-factor verification passed for {}", username);
        Ok(self.authenticated(Identity::new(user_id, username)))
    }

    /// Restore a previously saved session and confirm it with one probe
    ///
    /// Returns the resulting state, which is either `Authenticated` or
    /// `Unauthenticated`. A snapshot that fails validation or the probe is
    /// discarded. Network failures, rate limiting and server errors propagate
    /// and leave the snapshot in place.
    pub async fn restore_session(&self, snapshot: SessionSnapshot) -> Result<AuthState> {
        if let Err(reason) = self.store.check(&snapshot, Utc::now()) {
            tracing::info!("Not restoring session: {}", reason);
            self.reset(true);
            return Ok(AuthState::Unauthenticated);
        }

        self.jar().import(snapshot.cookie_records());
        match self.probe().await {
            Ok(true) => {
                tracing::info!("Restored session for {}", snapshot.username);
                Ok(AuthState::Authenticated(self.authenticated(snapshot.identity())))
            }
            Ok(false) => {
                tracing::warn!("Saved session for {} is no longer valid", snapshot.username);
                self.reset(true);
                Ok(AuthState::Unauthenticated)
            }
            Err(e) => {
                self.reset(false);
                Err(e)
            }
        }
    }

    /// Restore whatever snapshot the store currently holds
    pub async fn restore_from_store(&self) -> Result<AuthState> {
        match self.store.load() {
            Some(snapshot) => self.restore_session(snapshot).await,
            None => {
                self.reset(false);
                Ok(AuthState::Unauthenticated)
            }
        }
    }

    /// Whether the current cookies still belong to a live session
    ///
    /// Only 401, 403 and a body that is not the settings form (typically the
    /// login page a dead session is redirected to) count as an invalid
    /// session. Rate limiting, server errors and network failures say nothing
    /// about the cookies and are returned as errors.
    pub async fn probe(&self) -> Result<bool> {
        match self
            .transport
            .api_get::<WebFormDataResponse>(PROBE_PATH, &[])
            .await
        {
            Ok(response) => Ok(response.is_valid_session()),
            Err(Error::Transport(TransportError::HttpStatus { code, .. }))
                if code == 401 || code == 403 =>
            {
                tracing::debug!("Session probe refused with HTTP {}", code);
                Ok(false)
            }
            Err(Error::ProtocolDrift { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// End the session on the platform and locally
    ///
    /// The platform call is best effort; local state is always cleared.
    pub async fn logout(&self) -> Result<()> {
        if self.is_authenticated() {
            let form: Form = vec![("one_tap_app_login", "0".to_string())];
            if let Err(e) = self
                .transport
                .post_form_url(
                    &self.transport.web_url(LOGOUT_PATH),
                    &form,
                    RetryPolicy::SingleShot,
                )
                .await
            {
                tracing::debug!("Logout call failed: {}", e);
            }
        }
        self.reset(true);
        tracing::info!("Logged out");
        Ok(())
    }

    /// Account id from the login body, else from the `ds_user_id` cookie
    fn account_id(&self, from_body: Option<String>) -> Option<String> {
        from_body
            .filter(|id| !id.is_empty())
            .or_else(|| self.jar().user_id())
            .filter(|id| !id.is_empty())
    }

    /// Mark the session authenticated and persist it
    fn authenticated(&self, identity: Identity) -> Identity {
        let snapshot = SessionSnapshot::new(&identity, self.jar().export(), Utc::now());
        if let Err(e) = self.store.save(&snapshot) {
            tracing::error!("Failed to persist session snapshot: {}", e);
        }
        tracing::info!("Authenticated as {} ({})", identity.username, identity.user_id);
        self.transition(AuthState::Authenticated(identity.clone()));
        identity
    }

    fn checkpoint_failed(&self, reason: String) -> Error {
        tracing::error!("Checkpoint unresolved: {}", reason);
        self.fail(&reason);
        AuthError::CheckpointUnresolved { reason }.into()
    }

    fn two_factor_failed(&self, reason: String) -> Error {
        tracing::error!("Two-factor verification unresolved: {}", reason);
        self.fail(&reason);
        AuthError::TwoFactorUnresolved { reason }.into()
    }

    /// Drop local session state, optionally deleting the stored snapshot
    fn reset(&self, discard_snapshot: bool) {
        self.jar().clear();
        if discard_snapshot && let Err(e) = self.store.discard() {
            tracing::warn!("Failed to discard session snapshot: {}", e);
        }
        self.transition(AuthState::Unauthenticated);
    }

    fn fail(&self, reason: &str) {
        self.transition(AuthState::Failed(reason.to_string()));
    }

    fn transition(&self, next: AuthState) {
        let mut state = self.lock();
        tracing::debug!(
            "Auth state {} -> {}",
            discriminant_name(&state),
            discriminant_name(&next)
        );
        *state = next;
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn discriminant_name(state: &AuthState) -> &'static str {
    match state {
        AuthState::Unauthenticated => "Unauthenticated",
        AuthState::AwaitingCsrf => "AwaitingCsrf",
        AuthState::LoggingIn => "LoggingIn",
        AuthState::CheckpointRequired => "CheckpointRequired",
        AuthState::TwoFactorRequired => "TwoFactorRequired",
        AuthState::Authenticated(_) => "Authenticated",
        AuthState::Failed(_) => "Failed",
    }
}

/// Password wrapper the browser login form submits
fn browser_password(password: &str, timestamp: i64) -> String {
    format!("#PWD_INSTAGRAM_BROWSER:0:{}:{}", timestamp, password)
}

/// Login endpoints use 4xx for logical failures, so the body wins over the status
fn decode_login(raw: &RawResponse, endpoint: &str) -> Result<LoginResponse> {
    match raw.json::<LoginResponse>(endpoint) {
        Ok(response) => Ok(response),
        Err(_) if !raw.is_success() => Err(TransportError::HttpStatus {
            code: raw.status,
            body: raw.body.clone(),
        }
        .into()),
        Err(e) => Err(e),
    }
}
