//! Read-side domain models
//!
//! Projections of the platform's wire shapes returned by read operations.
//! They carry no behaviour and are never cached by the client.

use super::response::{ApiUser, LikerNode, MediaNode, StoryNode, WebProfileUser};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Public account information
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub username: String,
    pub full_name: String,
    pub biography: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub media_count: u64,
    pub is_private: bool,
    pub is_verified: bool,
    pub profile_pic_url: String,
    pub external_url: Option<String>,
}

/// Kind of a published media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Photo,
    Video,
    Album,
}

/// Minimal reference to a media owner
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: u64,
    pub username: String,
}

/// A post as listed by timeline, hashtag or likers queries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    /// Numeric media primary key
    pub pk: u64,
    /// Opaque id string as sent by the platform
    pub id: String,
    pub shortcode: String,
    pub caption: String,
    pub like_count: u64,
    pub comment_count: u64,
    pub kind: MediaKind,
    pub taken_at: Option<DateTime<Utc>>,
    pub owner: Option<OwnerRef>,
    pub display_url: String,
}

impl MediaItem {
    /// Public permalink of the post
    pub fn permalink(&self, base_url: &str) -> String {
        format!("{}/p/{}/", base_url.trim_end_matches('/'), self.shortcode)
    }
}

/// One active story of an account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryItem {
    pub pk: u64,
    /// `{pk}_{owner}` as sent by the platform
    pub id: String,
    pub owner_id: u64,
    pub kind: MediaKind,
    pub taken_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoryItem {
    /// Project a reel item; `reel_owner` fills in items without a user
    pub fn from_node(node: StoryNode, reel_owner: u64) -> Self {
        let owner_id = node
            .user
            .map(|u| u.pk)
            .filter(|pk| *pk != 0)
            .unwrap_or(reel_owner);
        Self {
            pk: node.pk,
            id: node.id,
            owner_id,
            kind: match node.media_type {
                Some(2) => MediaKind::Video,
                Some(8) => MediaKind::Album,
                _ => MediaKind::Photo,
            },
            taken_at: node.taken_at.and_then(timestamp),
            expires_at: node.expiring_at.and_then(timestamp),
        }
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

impl From<WebProfileUser> for Profile {
    fn from(user: WebProfileUser) -> Self {
        let profile_pic_url = if user.profile_pic_url_hd.is_empty() {
            user.profile_pic_url
        } else {
            user.profile_pic_url_hd
        };
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            biography: user.biography,
            follower_count: user.edge_followed_by.map(|e| e.count).unwrap_or(0),
            following_count: user.edge_follow.map(|e| e.count).unwrap_or(0),
            media_count: user
                .edge_owner_to_timeline_media
                .map(|e| e.count)
                .unwrap_or(0),
            is_private: user.is_private,
            is_verified: user.is_verified,
            profile_pic_url,
            external_url: Some(user.external_url).filter(|u| !u.is_empty()),
        }
    }
}

impl From<ApiUser> for Profile {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.pk,
            username: user.username,
            full_name: user.full_name,
            is_private: user.is_private,
            is_verified: user.is_verified,
            profile_pic_url: user.profile_pic_url,
            ..Default::default()
        }
    }
}

impl From<LikerNode> for Profile {
    fn from(node: LikerNode) -> Self {
        Self {
            id: node.id,
            username: node.username,
            full_name: node.full_name,
            is_private: node.is_private,
            is_verified: node.is_verified,
            profile_pic_url: node.profile_pic_url,
            ..Default::default()
        }
    }
}

impl From<MediaNode> for MediaItem {
    fn from(node: MediaNode) -> Self {
        // GraphQL ids are decimal strings; anything else keeps pk at zero
        let pk = node.id.parse().unwrap_or(0);
        let kind = match node.typename.as_deref() {
            Some("GraphSidecar") => MediaKind::Album,
            _ if node.is_video => MediaKind::Video,
            _ => MediaKind::Photo,
        };
        let caption = node
            .edge_media_to_caption
            .and_then(|c| c.into_nodes().next())
            .map(|c| c.text)
            .unwrap_or_default();
        let like_count = node
            .edge_liked_by
            .or(node.edge_media_preview_like)
            .map(|e| e.count)
            .unwrap_or(0);

        Self {
            pk,
            id: node.id,
            shortcode: node.shortcode,
            caption,
            like_count,
            comment_count: node.edge_media_to_comment.map(|e| e.count).unwrap_or(0),
            kind,
            taken_at: node.taken_at_timestamp.and_then(timestamp),
            owner: node.owner.map(|o| OwnerRef {
                id: o.id,
                username: o.username,
            }),
            display_url: node.display_url,
        }
    }
}
