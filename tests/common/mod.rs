//! Common test utilities and helpers
//!
//! Shared wiremock scenarios and client builders for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use gramweb::config::Settings;
use gramweb::session::FixedCode;
use gramweb::upload::{MediaProbe, VideoInfo};
use gramweb::{Error, WebClient};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_ID: &str = "42";
pub const USERNAME: &str = "tester";

/// Settings pointing every base URL at `server`, with all pauses disabled
pub fn test_settings(server: &MockServer, dir: &TempDir) -> Settings {
    let mut settings = Settings::default()
        .with_base_url(&server.uri())
        .without_delays();
    settings.session.path = dir.path().join("session.json");
    settings
}

pub fn client_for(server: &MockServer, dir: &TempDir) -> WebClient {
    WebClient::new(test_settings(server, dir)).unwrap()
}

/// Mount the root page and a login endpoint that accepts any credentials
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "csrftoken=initial; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "sessionid=sess-value; Path=/")
                .append_header("set-cookie", format!("ds_user_id={USER_ID}; Path=/").as_str())
                .append_header("set-cookie", "csrftoken=after-login; Path=/")
                .set_body_json(serde_json::json!({
                    "authenticated": true,
                    "user": true,
                    "userId": USER_ID,
                    "status": "ok"
                })),
        )
        .mount(server)
        .await;
}

/// Session probe answering as a live session
pub async fn mount_valid_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/edit/web_form_data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "form_data": {"username": USERNAME},
            "status": "ok"
        })))
        .mount(server)
        .await;
}

pub async fn logged_in(client: &WebClient) {
    client
        .login(USERNAME, "secret", &FixedCode("000000".to_string()))
        .await
        .unwrap();
}

/// Client already past login against `server`
pub async fn logged_in_client(server: &MockServer, dir: &TempDir) -> WebClient {
    mount_login(server).await;
    let client = client_for(server, dir);
    logged_in(&client).await;
    client
}

/// Probe with fixed answers that writes a small JPEG for frames
pub struct StubProbe(pub VideoInfo);

#[async_trait]
impl MediaProbe for StubProbe {
    async fn probe_video(&self, _path: &Path) -> VideoInfo {
        self.0
    }

    async fn extract_frame(&self, _video: &Path, output: &Path) -> Result<(), Error> {
        tokio::fs::write(output, b"\xff\xd8\xff\xd9").await?;
        Ok(())
    }
}

pub fn stub_probe(duration_secs: f64) -> Arc<dyn MediaProbe> {
    Arc::new(StubProbe(VideoInfo {
        duration_secs,
        width: 1080,
        height: 1920,
    }))
}
