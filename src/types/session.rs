//! Session identity and the persisted snapshot record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the cookie that carries the anti-forgery token
pub const CSRF_COOKIE: &str = "csrftoken";
/// Name of the cookie that proves an authenticated browser session
pub const SESSION_COOKIE: &str = "sessionid";
/// Name of the cookie holding the numeric id of the logged-in account
pub const USER_ID_COOKIE: &str = "ds_user_id";

/// Who the session is logged in as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// One cookie as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
}

/// Durable record of an authenticated session
///
/// Serialised as `{cookies: {name: value}, user_id, username, csrf_token,
/// saved_at}`. Cookie values are secrets; the `Debug` output lists names only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub cookies: BTreeMap<String, String>,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(identity: &Identity, cookies: Vec<CookieRecord>, saved_at: DateTime<Utc>) -> Self {
        let cookies: BTreeMap<String, String> =
            cookies.into_iter().map(|c| (c.name, c.value)).collect();
        let csrf_token = cookies.get(CSRF_COOKIE).cloned();
        Self {
            cookies,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            csrf_token,
            saved_at,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.username.clone())
    }

    pub fn cookie_records(&self) -> Vec<CookieRecord> {
        self.cookies
            .iter()
            .map(|(name, value)| CookieRecord {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }

    pub fn has_session_cookie(&self) -> bool {
        self.cookies
            .get(SESSION_COOKIE)
            .is_some_and(|v| !v.is_empty())
    }

    /// Age of the snapshot relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.saved_at
    }
}

impl std::fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}
