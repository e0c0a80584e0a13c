//! HTTP transport over the shared session cookie jar
//!
//! Every call goes through [`Transport::execute`], which:
//! - pauses for a random interval drawn from `transport.request_delay`,
//! - sets `X-CSRFToken` from the jar's current `csrftoken` cookie,
//! - retries HTTP 429 according to the call's [`RetryPolicy`].
//!
//! Non-429 statuses are returned to the caller as [`RawResponse`]; typed
//! helpers turn them into `TransportError::HttpStatus` and decode bodies,
//! mapping undecodable bodies to `Error::ProtocolDrift`.

use super::retry::{Attempt, RetryPolicy, retry_with_backoff};
use crate::config::{PlatformSettings, Settings, TransportSettings};
use crate::governor::human_pause;
use crate::session::SessionCookieJar;
use crate::types::response::GraphQlResponse;
use crate::{Error, Result, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx status into `TransportError::HttpStatus`
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::HttpStatus {
                code: self.status,
                body: self.body,
            }
            .into())
        }
    }

    /// Decode the body, reporting an unexpected shape as protocol drift
    pub fn json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::debug!("Undecodable response from {}: {}", endpoint, e);
            Error::drift(endpoint, self.body.clone())
        })
    }
}

/// Form body as ordered key/value pairs
pub type Form = Vec<(&'static str, String)>;

/// Cookie-jar-backed client for the platform's web surfaces
#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    jar: Arc<SessionCookieJar>,
    platform: PlatformSettings,
    config: TransportSettings,
}

impl Transport {
    /// Build the HTTP client with browser-like default headers
    pub fn new(settings: &Settings, jar: Arc<SessionCookieJar>) -> Result<Self> {
        let platform = settings.platform.clone();
        let config = settings.transport.clone();

        let mut builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(platform.user_agent.clone())
            .cookie_provider(Arc::clone(&jar))
            .default_headers(default_headers(&platform)?);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::config(format!("Invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
            tracing::debug!("Routing platform traffic through configured proxy");
        }

        let http = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            jar,
            platform,
            config,
        })
    }

    pub fn jar(&self) -> &Arc<SessionCookieJar> {
        &self.jar
    }

    pub fn platform(&self) -> &PlatformSettings {
        &self.platform
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.config
    }

    /// Absolute URL under the web root
    pub fn web_url(&self, path: &str) -> String {
        join(&self.platform.base_url, path)
    }

    /// Absolute URL under the versioned API root
    pub fn api_url(&self, path: &str) -> String {
        join(&self.platform.api_url, path)
    }

    /// Absolute URL under the upload host
    pub fn upload_url(&self, path: &str) -> String {
        join(&self.platform.upload_url, path)
    }

    /// Send one logical request, applying pacing, CSRF and 429 handling
    ///
    /// `build` is invoked once per attempt so that each attempt carries the
    /// CSRF token current at that moment.
    pub async fn execute<F>(
        &self,
        endpoint: &str,
        policy: RetryPolicy,
        build: F,
    ) -> Result<RawResponse>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_retries = match policy {
            RetryPolicy::Retryable => self.config.max_retries,
            RetryPolicy::SingleShot => 0,
        };
        let base = Duration::from_millis(self.config.backoff_base_ms);
        let build = &build;

        retry_with_backoff(max_retries, base, move |attempt| async move {
            human_pause(self.config.request_delay).await;

            let mut request = build(&self.http);
            if let Some(token) = self.jar.csrf_token() {
                request = request.header("X-CSRFToken", token);
            }

            tracing::debug!("{} (attempt {})", endpoint, attempt);
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;

            if status == 429 {
                return Ok(Attempt::RetryAfter(body));
            }
            if !(200..300).contains(&status) {
                tracing::debug!("{} answered HTTP {}", endpoint, status);
            }
            Ok(Attempt::Done(RawResponse { status, body }))
        })
        .await
    }

    /// GET an absolute URL, returning whatever status the platform sent
    pub async fn get_page(&self, url: &str) -> Result<RawResponse> {
        self.execute(url, RetryPolicy::Retryable, |http| http.get(url))
            .await
    }

    /// POST a form to an absolute URL, returning whatever status the platform sent
    ///
    /// Login endpoints answer logically failed attempts with 4xx and a JSON
    /// body that still has to be inspected, so no status check happens here.
    pub async fn post_form_url(
        &self,
        url: &str,
        form: &Form,
        policy: RetryPolicy,
    ) -> Result<RawResponse> {
        self.execute(url, policy, |http| http.post(url).form(form))
            .await
    }

    /// GET on the versioned API, decoded as `T`
    pub async fn api_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.api_url(path);
        let raw = self
            .execute(path, RetryPolicy::Retryable, |http| http.get(&url).query(query))
            .await?
            .ensure_success()?;
        raw.json(path)
    }

    /// Form POST on the versioned API, decoded as `T`
    pub async fn api_post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
        policy: RetryPolicy,
    ) -> Result<T> {
        let url = self.api_url(path);
        let raw = self
            .execute(path, policy, |http| http.post(&url).form(form))
            .await?
            .ensure_success()?;
        raw.json(path)
    }

    /// Legacy web-form POST, decoded as `T`
    pub async fn web_post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
        policy: RetryPolicy,
    ) -> Result<T> {
        let url = self.web_url(path);
        let raw = self
            .execute(path, policy, |http| http.post(&url).form(form))
            .await?
            .ensure_success()?;
        raw.json(path)
    }

    /// Legacy GraphQL query by fixed query hash
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query_hash: &str,
        variables: &serde_json::Value,
    ) -> Result<GraphQlResponse<T>> {
        let url = self.web_url("graphql/query/");
        let query = [
            ("query_hash", query_hash.to_string()),
            ("variables", variables.to_string()),
        ];
        let endpoint = format!("graphql/query/{}", query_hash);
        let raw = self
            .execute(&endpoint, RetryPolicy::Retryable, |http| http.get(&url).query(&query))
            .await?
            .ensure_success()?;
        raw.json(&endpoint)
    }

    /// Binary upload request on the upload host; never retried
    pub async fn upload(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Arc<Vec<u8>>>,
    ) -> Result<RawResponse> {
        let url = self.upload_url(path);
        let timeout = self.config.upload_timeout();
        self.execute(path, RetryPolicy::SingleShot, |http| {
            let mut request = http
                .request(method.clone(), &url)
                .headers(headers.clone())
                .timeout(timeout);
            if let Some(bytes) = &body {
                request = request.body(bytes.to_vec());
            }
            request
        })
        .await
    }
}

fn default_headers(platform: &PlatformSettings) -> Result<HeaderMap> {
    let origin = platform.base_url.trim_end_matches('/').to_string();
    let pairs = [
        ("accept", "*/*".to_string()),
        ("accept-language", platform.accept_language.clone()),
        ("x-ig-app-id", platform.app_id.clone()),
        ("x-requested-with", "XMLHttpRequest".to_string()),
        ("x-instagram-ajax", "1".to_string()),
        ("origin", origin.clone()),
        ("referer", format!("{}/", origin)),
        ("sec-fetch-dest", "empty".to_string()),
        ("sec-fetch-mode", "cors".to_string()),
        ("sec-fetch-site", "same-origin".to_string()),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| Error::config(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

fn join(root: &str, path: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
