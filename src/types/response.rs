//! Wire response shapes
//!
//! One small structure per endpoint. Every field is optional or defaulted so
//! that the platform's habit of returning empty objects for private or
//! throttled content decodes to empty results rather than errors. Shapes
//! that are missing a field the caller cannot do without are turned into
//! `Error::ProtocolDrift` by the operation that reads them.

use super::serde_helpers::{
    deserialize_flexible_id, deserialize_null_count, deserialize_null_string,
    deserialize_opt_token,
};
use serde::Deserialize;

/// Token the platform uses to signal success on status-bearing responses
pub const STATUS_OK: &str = "ok";

/// `POST /accounts/login/ajax/` and its two-factor sibling
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    pub authenticated: Option<bool>,
    #[serde(rename = "userId", deserialize_with = "deserialize_opt_token")]
    pub user_id: Option<String>,
    pub checkpoint_url: Option<String>,
    pub two_factor_required: Option<bool>,
    pub two_factor_info: Option<TwoFactorInfo>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TwoFactorInfo {
    #[serde(deserialize_with = "deserialize_null_string")]
    pub two_factor_identifier: String,
}

/// `GET accounts/edit/web_form_data/`, used as the session probe
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebFormDataResponse {
    pub status: Option<String>,
    pub form_data: Option<serde_json::Value>,
}

impl WebFormDataResponse {
    pub fn is_valid_session(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK) || self.form_data.is_some()
    }
}

/// Legacy web-form write action result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionResponse {
    pub status: Option<String>,
    pub result: Option<String>,
    pub message: Option<String>,
}

/// Configure call result (feed, story and clip surfaces)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigureResponse {
    pub status: Option<String>,
    pub media: Option<ConfiguredMedia>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfiguredMedia {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub pk: u64,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub code: String,
}

impl ConfiguredMedia {
    pub fn is_empty(&self) -> bool {
        self.pk == 0 && self.id.is_empty() && self.code.is_empty()
    }
}

/// `GET users/web_profile_info/`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebProfileInfoResponse {
    pub data: Option<WebProfileData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebProfileData {
    pub user: Option<WebProfileUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebProfileUser {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: u64,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub username: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub full_name: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub biography: String,
    pub edge_followed_by: Option<EdgeCount>,
    pub edge_follow: Option<EdgeCount>,
    pub edge_owner_to_timeline_media: Option<EdgeCount>,
    pub is_private: bool,
    pub is_verified: bool,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub profile_pic_url: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub profile_pic_url_hd: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub external_url: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct EdgeCount {
    #[serde(deserialize_with = "deserialize_null_count")]
    pub count: u64,
}

/// `GET friendships/{id}/followers/` and `.../following/`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FriendshipsPage {
    pub users: Vec<ApiUser>,
    #[serde(deserialize_with = "deserialize_opt_token")]
    pub next_max_id: Option<String>,
}

/// User entry as returned by the versioned API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiUser {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub pk: u64,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub username: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub full_name: String,
    pub is_private: bool,
    pub is_verified: bool,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub profile_pic_url: String,
}

/// `GET web/search/topsearch/`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TopSearchResponse {
    pub users: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub user: ApiUser,
}

/// Envelope of every legacy GraphQL query
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Relay-style connection
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<N> {
    #[serde(default, deserialize_with = "deserialize_null_count")]
    pub count: u64,
    #[serde(default)]
    pub page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<N>>,
}

impl<N> Connection<N> {
    /// Continuation cursor, present only when another page exists
    pub fn next_cursor(&self) -> Option<&str> {
        self.page_info
            .as_ref()
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn into_nodes(self) -> impl Iterator<Item = N> {
        self.edges.into_iter().map(|e| e.node)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<N> {
    pub node: N,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Media node shared by timeline and hashtag queries
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaNode {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub shortcode: String,
    pub edge_media_to_caption: Option<Connection<CaptionNode>>,
    pub edge_liked_by: Option<EdgeCount>,
    pub edge_media_preview_like: Option<EdgeCount>,
    pub edge_media_to_comment: Option<EdgeCount>,
    pub is_video: bool,
    pub taken_at_timestamp: Option<i64>,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub display_url: String,
    pub owner: Option<GraphOwner>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaptionNode {
    #[serde(deserialize_with = "deserialize_null_string")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphOwner {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: u64,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub username: String,
}

/// `data` of the user timeline query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserMediaData {
    pub user: Option<TimelineOwner>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimelineOwner {
    pub edge_owner_to_timeline_media: Option<Connection<MediaNode>>,
}

/// `data` of the shortcode queries (id resolution, likers)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShortcodeMediaData {
    pub shortcode_media: Option<ShortcodeMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShortcodeMedia {
    #[serde(deserialize_with = "deserialize_null_string")]
    pub id: String,
    pub edge_liked_by: Option<Connection<LikerNode>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LikerNode {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: u64,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub username: String,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub full_name: String,
    pub is_private: bool,
    pub is_verified: bool,
    #[serde(deserialize_with = "deserialize_null_string")]
    pub profile_pic_url: String,
}

/// `data` of the hashtag query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HashtagData {
    pub hashtag: Option<HashtagNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HashtagNode {
    pub edge_hashtag_to_top_posts: Option<Connection<MediaNode>>,
    pub edge_hashtag_to_media: Option<Connection<MediaNode>>,
}

/// `GET feed/user/{id}/story/`
///
/// `reel` is `null` when the account has no active stories.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserStoryResponse {
    pub reel: Option<StoryReel>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryReel {
    #[serde(deserialize_with = "deserialize_opt_token")]
    pub id: Option<String>,
    pub items: Vec<StoryNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryNode {
    #[serde(deserialize_with = "deserialize_null_string")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub pk: u64,
    /// 1 for photos, 2 for videos
    pub media_type: Option<u8>,
    pub taken_at: Option<i64>,
    pub expiring_at: Option<i64>,
    pub user: Option<ApiUser>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_authenticated() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "user": true,
            "userId": "25025320",
            "authenticated": true,
            "oneTapPrompt": true,
            "status": "ok"
        }))
        .unwrap();

        assert_eq!(resp.authenticated, Some(true));
        assert_eq!(resp.user_id.as_deref(), Some("25025320"));
    }

    #[test]
    fn test_login_response_two_factor() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "two_factor_required": true,
            "two_factor_info": {"two_factor_identifier": "abc123", "username": "alice"},
            "status": "fail"
        }))
        .unwrap();

        assert_eq!(resp.two_factor_required, Some(true));
        assert_eq!(resp.two_factor_info.unwrap().two_factor_identifier, "abc123");
    }

    #[test]
    fn test_friendships_page_numeric_cursor() {
        let page: FriendshipsPage = serde_json::from_value(json!({
            "users": [{"pk": 1, "username": "a"}, {"pk": "2", "username": "b"}],
            "next_max_id": 24
        }))
        .unwrap();

        assert_eq!(page.users.len(), 2);
        assert_eq!(page.users[1].pk, 2);
        assert_eq!(page.next_max_id.as_deref(), Some("24"));
    }

    #[test]
    fn test_connection_cursor_requires_next_page() {
        let conn: Connection<MediaNode> = serde_json::from_value(json!({
            "count": 3,
            "page_info": {"has_next_page": false, "end_cursor": "QVFE"},
            "edges": []
        }))
        .unwrap();
        assert_eq!(conn.next_cursor(), None);

        let conn: Connection<MediaNode> = serde_json::from_value(json!({
            "page_info": {"has_next_page": true, "end_cursor": "QVFE"},
            "edges": []
        }))
        .unwrap();
        assert_eq!(conn.next_cursor(), Some("QVFE"));
    }

    #[test]
    fn test_empty_graphql_data_decodes() {
        let resp: GraphQlResponse<HashtagData> =
            serde_json::from_value(json!({"data": {}, "status": "ok"})).unwrap();
        assert!(resp.data.unwrap().hashtag.is_none());
    }

    #[test]
    fn test_configured_media_emptiness() {
        let resp: ConfigureResponse =
            serde_json::from_value(json!({"status": "ok", "media": {}})).unwrap();
        assert!(resp.media.unwrap().is_empty());

        let resp: ConfigureResponse = serde_json::from_value(json!({
            "status": "ok",
            "media": {"pk": "3210", "id": "3210_77", "code": "Cx1"}
        }))
        .unwrap();
        let media = resp.media.unwrap();
        assert!(!media.is_empty());
        assert_eq!(media.code, "Cx1");
    }

    #[test]
    fn test_story_feed_without_reel() {
        let resp: UserStoryResponse =
            serde_json::from_value(json!({"reel": null, "status": "ok"})).unwrap();
        assert!(resp.reel.is_none());

        let resp: UserStoryResponse = serde_json::from_value(json!({
            "reel": {
                "id": 42,
                "items": [{"id": "3100_42", "pk": "3100", "media_type": 2, "taken_at": 1_700_000_000}]
            },
            "status": "ok"
        }))
        .unwrap();
        let reel = resp.reel.unwrap();
        assert_eq!(reel.id.as_deref(), Some("42"));
        assert_eq!(reel.items[0].pk, 3100);
        assert_eq!(reel.items[0].media_type, Some(2));
    }
}
