//! Governed write actions
//!
//! Each action reserves a governor slot before anything touches the network.
//! A declined reservation returns [`ActionOutcome::NotPermitted`] without a
//! request. The platform answers logically failed actions with HTTP 200, so
//! success is read strictly from the response's status token; anything else
//! is [`ActionOutcome::Rejected`]. Only successful actions are counted and
//! followed by the kind's post-action pause.
//!
//! Marking stories as seen uses the same strict success check but has no
//! governor ceiling.

use super::read;
use crate::config::DelaySettings;
use crate::governor::{ActionKind, DelayRange, Permit, RateGovernor, human_pause};
use crate::transport::{Form, RetryPolicy, Transport};
use crate::types::StoryItem;
use crate::types::response::{ActionResponse, STATUS_OK};
use crate::Result;
use chrono::Utc;
use serde::Serialize;

const SEEN_PATH: &str = "stories/reel/seen/";

/// Result of a governed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The platform confirmed the action
    Done,
    /// The hourly or daily ceiling was reached; nothing was sent
    NotPermitted,
    /// The target account does not exist
    TargetNotFound,
    /// The platform answered without the success token
    Rejected { body: String },
}

impl ActionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, ActionOutcome::Done)
    }
}

/// Account addressed by numeric id or by username
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(u64),
    Username(String),
}

impl From<u64> for UserRef {
    fn from(id: u64) -> Self {
        UserRef::Id(id)
    }
}

impl From<&str> for UserRef {
    /// All-digit input is taken as an id, anything else as a username
    fn from(value: &str) -> Self {
        let value = value.trim().trim_start_matches('@');
        match value.parse::<u64>() {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Username(value.to_string()),
        }
    }
}

impl From<String> for UserRef {
    fn from(value: String) -> Self {
        UserRef::from(value.as_str())
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "{}", id),
            UserRef::Username(name) => write!(f, "@{}", name),
        }
    }
}

/// What counts as success for an action's response
#[derive(Debug, Clone, Copy)]
enum SuccessToken {
    StatusOk,
    /// `result == "following"` or `status == "ok"`
    Following,
}

impl SuccessToken {
    fn accepts(self, response: &ActionResponse) -> bool {
        let status_ok = response.status.as_deref() == Some(STATUS_OK);
        match self {
            SuccessToken::StatusOk => status_ok,
            SuccessToken::Following => {
                status_ok || response.result.as_deref() == Some("following")
            }
        }
    }
}

/// Borrowed view of what a write action needs
#[derive(Debug, Clone, Copy)]
pub struct Actions<'a> {
    pub transport: &'a Transport,
    pub governor: &'a RateGovernor,
    pub delays: &'a DelaySettings,
}

impl Actions<'_> {
    pub async fn follow(&self, user: &UserRef) -> Result<ActionOutcome> {
        self.on_user(
            ActionKind::Follow,
            user,
            "follow",
            SuccessToken::Following,
            self.delays.follow,
        )
        .await
    }

    pub async fn unfollow(&self, user: &UserRef) -> Result<ActionOutcome> {
        self.on_user(
            ActionKind::Unfollow,
            user,
            "unfollow",
            SuccessToken::StatusOk,
            self.delays.unfollow,
        )
        .await
    }

    pub async fn like(&self, media_id: u64) -> Result<ActionOutcome> {
        let Some(permit) = self.governor.try_acquire(ActionKind::Like) else {
            return Ok(ActionOutcome::NotPermitted);
        };
        let path = format!("web/likes/{}/like/", media_id);
        let outcome = self.send_web(&path, &Form::new(), SuccessToken::StatusOk).await?;
        self.settle(permit, outcome, self.delays.like).await
    }

    /// Removing a like is governed as a like
    pub async fn unlike(&self, media_id: u64) -> Result<ActionOutcome> {
        let Some(permit) = self.governor.try_acquire(ActionKind::Like) else {
            return Ok(ActionOutcome::NotPermitted);
        };
        let path = format!("web/likes/{}/unlike/", media_id);
        let outcome = self.send_web(&path, &Form::new(), SuccessToken::StatusOk).await?;
        self.settle(permit, outcome, self.delays.like).await
    }

    pub async fn comment(&self, media_id: u64, text: &str) -> Result<ActionOutcome> {
        let Some(permit) = self.governor.try_acquire(ActionKind::Comment) else {
            return Ok(ActionOutcome::NotPermitted);
        };
        let path = format!("web/comments/{}/add/", media_id);
        let form: Form = vec![("comment_text", text.to_string())];
        let outcome = self.send_web(&path, &form, SuccessToken::StatusOk).await?;
        self.settle(permit, outcome, self.delays.comment).await
    }

    /// Report `stories` as viewed, one call per story
    ///
    /// Stops at the first story the platform does not accept and returns
    /// that outcome. An empty slice sends nothing.
    pub async fn mark_stories_seen(&self, stories: &[StoryItem]) -> Result<ActionOutcome> {
        let url = self.transport.api_url(SEEN_PATH);
        for story in stories {
            let seen_at = Utc::now().timestamp();
            let taken_at = story.taken_at.map_or(seen_at, |t| t.timestamp());
            let form: Form = vec![
                ("reelMediaId", story.pk.to_string()),
                ("reelMediaOwnerId", story.owner_id.to_string()),
                ("reelId", story.owner_id.to_string()),
                ("reelMediaTakenAt", taken_at.to_string()),
                ("viewSeenAt", seen_at.to_string()),
            ];
            let outcome = self
                .send(SEEN_PATH, &url, &form, SuccessToken::StatusOk)
                .await?;
            if !outcome.is_done() {
                return Ok(outcome);
            }
            tracing::debug!("Story {} of {} marked seen", story.pk, story.owner_id);
        }
        Ok(ActionOutcome::Done)
    }

    async fn on_user(
        &self,
        kind: ActionKind,
        user: &UserRef,
        verb: &str,
        token: SuccessToken,
        delay: DelayRange,
    ) -> Result<ActionOutcome> {
        // The slot is reserved before the username lookup so a declined
        // action sends nothing at all
        let Some(permit) = self.governor.try_acquire(kind) else {
            return Ok(ActionOutcome::NotPermitted);
        };

        let user_id = match user {
            UserRef::Id(id) => *id,
            UserRef::Username(name) => match read::user_id_for(self.transport, name).await? {
                Some(id) => id,
                None => {
                    tracing::info!("Cannot {} {}: no such account", verb, user);
                    return Ok(ActionOutcome::TargetNotFound);
                }
            },
        };

        let path = format!("web/friendships/{}/{}/", user_id, verb);
        let outcome = self.send_web(&path, &Form::new(), token).await?;
        if outcome.is_done() {
            tracing::info!("{} {}", verb, user);
        }
        self.settle(permit, outcome, delay).await
    }

    /// POST a legacy web-form action
    async fn send_web(
        &self,
        path: &str,
        form: &Form,
        token: SuccessToken,
    ) -> Result<ActionOutcome> {
        let url = self.transport.web_url(path);
        self.send(path, &url, form, token).await
    }

    async fn send(
        &self,
        path: &str,
        url: &str,
        form: &Form,
        token: SuccessToken,
    ) -> Result<ActionOutcome> {
        let raw = self
            .transport
            .execute(path, RetryPolicy::Retryable, |http| http.post(url).form(form))
            .await?
            .ensure_success()?;

        let accepted = serde_json::from_str::<ActionResponse>(&raw.body)
            .map(|response| token.accepts(&response))
            .unwrap_or(false);
        if accepted {
            Ok(ActionOutcome::Done)
        } else {
            tracing::warn!("{} was not accepted: {}", path, raw.body);
            Ok(ActionOutcome::Rejected { body: raw.body })
        }
    }

    /// Count a successful action and pause; a failed one releases its slot
    async fn settle(
        &self,
        permit: Permit<'_>,
        outcome: ActionOutcome,
        delay: DelayRange,
    ) -> Result<ActionOutcome> {
        if outcome.is_done() {
            permit.commit();
            human_pause(delay).await;
        }
        Ok(outcome)
    }
}
