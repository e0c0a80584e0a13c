//! Cookie jar shared by the HTTP client and the session layer
//!
//! The jar holds cookies for a single platform and sends all of them with
//! every request the client makes. Cookies are keyed by name: a `Set-Cookie`
//! for a name that is already present replaces it, so when the platform
//! issues the same cookie for several domains the most recently set value is
//! the one that survives. This is what makes the CSRF header derivation
//! deterministic.

use crate::types::CookieRecord;
use crate::types::session::{CSRF_COOKIE, SESSION_COOKIE, USER_ID_COOKIE};
use chrono::{DateTime, Utc};
use reqwest::Url;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name-keyed cookie store implementing [`reqwest::cookie::CookieStore`]
#[derive(Default)]
pub struct SessionCookieJar {
    cookies: RwLock<Vec<CookieRecord>>,
}

impl SessionCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a cookie
    pub fn get(&self, name: &str) -> Option<String> {
        self.read()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.clone())
    }

    /// CSRF token derived from the most recently set `csrftoken` cookie
    pub fn csrf_token(&self) -> Option<String> {
        self.get(CSRF_COOKIE)
    }

    pub fn has_session(&self) -> bool {
        self.get(SESSION_COOKIE).is_some()
    }

    /// Numeric id of the logged-in account, when the platform set it
    pub fn user_id(&self) -> Option<String> {
        self.get(USER_ID_COOKIE)
    }

    /// Insert or replace a cookie; an empty value removes it
    pub fn set(&self, name: &str, value: &str) {
        let mut cookies = self.write();
        cookies.retain(|c| c.name != name);
        if !value.is_empty() {
            cookies.push(CookieRecord {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Apply one raw `Set-Cookie` header value
    pub fn apply_set_cookie(&self, header: &str) {
        self.apply_set_cookie_at(header, Utc::now());
    }

    fn apply_set_cookie_at(&self, header: &str, now: DateTime<Utc>) {
        let Some((name, value, expired)) = parse_set_cookie(header, now) else {
            tracing::trace!("Ignoring malformed Set-Cookie header");
            return;
        };
        if expired {
            self.set(&name, "");
        } else {
            self.set(&name, &value);
        }
    }

    /// All cookies in insertion order
    pub fn export(&self) -> Vec<CookieRecord> {
        self.read().clone()
    }

    /// Replace the jar's content with `records`
    pub fn import(&self, records: Vec<CookieRecord>) {
        let mut cookies = self.write();
        cookies.clear();
        for record in records {
            if record.value.is_empty() {
                continue;
            }
            cookies.retain(|c| c.name != record.name);
            cookies.push(record);
        }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn header_value(&self) -> Option<String> {
        let cookies = self.read();
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CookieRecord>> {
        self.cookies.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<CookieRecord>> {
        self.cookies.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl CookieStore for SessionCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        for header in cookie_headers {
            if let Ok(raw) = header.to_str() {
                self.apply_set_cookie(raw);
            }
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        self.header_value()
            .and_then(|v| HeaderValue::from_str(&v).ok())
    }
}

impl std::fmt::Debug for SessionCookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.read().iter().map(|c| c.name.clone()).collect();
        f.debug_struct("SessionCookieJar")
            .field("cookies", &names)
            .finish()
    }
}

/// Split a `Set-Cookie` value into name, value and whether it deletes the cookie
fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<(String, String, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut expired = value.is_empty();
    for attr in parts {
        let Some((key, val)) = attr.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "max-age" => {
                if val.parse::<i64>().is_ok_and(|age| age <= 0) {
                    expired = true;
                }
            }
            "expires" => {
                // Browsers accept both "01 Jan 1970" and "01-Jan-1970"
                let normalised = val.replace('-', " ");
                if let Ok(when) = DateTime::parse_from_rfc2822(&normalised)
                    && when.with_timezone(&Utc) <= now
                {
                    expired = true;
                }
            }
            _ => {}
        }
    }

    Some((name.to_string(), value.to_string(), expired))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://www.instagram.com/").unwrap()
    }

    fn feed(jar: &SessionCookieJar, headers: &[&str]) {
        let values: Vec<HeaderValue> = headers
            .iter()
            .map(|h| HeaderValue::from_str(h).unwrap())
            .collect();
        jar.set_cookies(&mut values.iter(), &url());
    }

    #[test]
    fn test_set_cookie_is_stored_and_sent() {
        let jar = SessionCookieJar::new();
        feed(
            &jar,
            &[
                "csrftoken=abc; Domain=.instagram.com; Path=/; Secure",
                "mid=xyz; Path=/",
            ],
        );

        assert_eq!(jar.csrf_token().as_deref(), Some("abc"));
        let header = jar.cookies(&url()).unwrap();
        assert_eq!(header.to_str().unwrap(), "csrftoken=abc; mid=xyz");
    }

    #[test]
    fn test_latest_duplicate_csrf_wins() {
        let jar = SessionCookieJar::new();
        feed(&jar, &["csrftoken=first; Domain=.instagram.com"]);
        feed(&jar, &["csrftoken=second; Domain=www.instagram.com"]);

        assert_eq!(jar.csrf_token().as_deref(), Some("second"));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_deletion_forms() {
        let jar = SessionCookieJar::new();
        jar.set("sessionid", "s");
        jar.set("ds_user_id", "42");
        jar.set("rur", "x");

        feed(
            &jar,
            &[
                "sessionid=\"\"; Max-Age=0; Path=/",
                "ds_user_id=42; expires=Thu, 01-Jan-1970 00:00:00 GMT",
                "rur=; Path=/",
            ],
        );

        assert!(jar.is_empty());
        assert!(!jar.has_session());
    }

    #[test]
    fn test_future_expiry_keeps_cookie() {
        let jar = SessionCookieJar::new();
        feed(
            &jar,
            &["sessionid=s; expires=Fri, 01-Jan-2100 00:00:00 GMT; Max-Age=31536000"],
        );
        assert!(jar.has_session());
    }

    #[test]
    fn test_export_import_round_trip() {
        let jar = SessionCookieJar::new();
        jar.set("sessionid", "s");
        jar.set("csrftoken", "t");

        let other = SessionCookieJar::new();
        other.set("stale", "1");
        other.import(jar.export());

        assert_eq!(other.export(), jar.export());
        assert!(other.get("stale").is_none());
    }

    #[test]
    fn test_debug_redacts_values() {
        let jar = SessionCookieJar::new();
        jar.set("sessionid", "very-secret");
        let rendered = format!("{:?}", jar);
        assert!(rendered.contains("sessionid"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_malformed_header_ignored() {
        let jar = SessionCookieJar::new();
        jar.apply_set_cookie("no-equals-sign");
        jar.apply_set_cookie("=value");
        assert!(jar.is_empty());
    }
}
