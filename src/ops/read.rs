//! Read operations
//!
//! Cursor-paginated listings over the versioned API and the legacy GraphQL
//! endpoint. Reads are not governed; pages are separated by a random pause
//! drawn from `transport.page_delay`. Empty or partial data decodes to an
//! empty result because the platform answers private and throttled content
//! that way.

use crate::governor::human_pause;
use crate::transport::Transport;
use crate::types::response::{
    Connection, FriendshipsPage, HashtagData, MediaNode, ShortcodeMediaData,
    TopSearchResponse, UserMediaData, UserStoryResponse, WebProfileInfoResponse,
};
use crate::types::{MediaItem, Profile, StoryItem};
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashSet;

/// Page size ceiling accepted by the listing endpoints
pub const MAX_PAGE_SIZE: usize = 50;

/// Fixed GraphQL query identifiers
pub mod query_hash {
    pub const USER_MEDIA: &str = "58b6785bea111c67129decfb136ab174";
    pub const MEDIA_LIKERS: &str = "d5d763b1e2acf209d62d22d184f1b5f2";
    pub const HASHTAG_MEDIA: &str = "174a21c41ef669bdf70474b0a94ee3ad";
    pub const SHORTCODE_MEDIA: &str = "b3055c01b4b222b8a47dc12b090e4e64";
}

/// Public profile of `username`, or `None` when no such account exists
pub async fn get_profile(transport: &Transport, username: &str) -> Result<Option<Profile>> {
    let query = [("username", username.to_string())];
    match transport
        .api_get::<WebProfileInfoResponse>("users/web_profile_info/", &query)
        .await
    {
        Ok(response) => Ok(response
            .data
            .and_then(|d| d.user)
            .filter(|u| u.id != 0)
            .map(Profile::from)),
        Err(e) if e.http_status() == Some(404) => {
            tracing::debug!("No profile for {}", username);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Accounts following `user_id`, up to `amount`
pub async fn list_followers(
    transport: &Transport,
    user_id: u64,
    amount: usize,
) -> Result<Vec<Profile>> {
    let path = format!("friendships/{}/followers/", user_id);
    paginate_friendships(transport, &path, Some("follow_list_page"), amount).await
}

/// Accounts `user_id` follows, up to `amount`
pub async fn list_following(
    transport: &Transport,
    user_id: u64,
    amount: usize,
) -> Result<Vec<Profile>> {
    let path = format!("friendships/{}/following/", user_id);
    paginate_friendships(transport, &path, None, amount).await
}

async fn paginate_friendships(
    transport: &Transport,
    path: &str,
    search_surface: Option<&str>,
    amount: usize,
) -> Result<Vec<Profile>> {
    let mut users: Vec<Profile> = Vec::new();
    let mut cursor: Option<String> = None;

    while users.len() < amount {
        let mut query = vec![("count", amount.min(MAX_PAGE_SIZE).to_string())];
        if let Some(surface) = search_surface {
            query.push(("search_surface", surface.to_string()));
        }
        if let Some(max_id) = &cursor {
            query.push(("max_id", max_id.clone()));
        }

        let page: FriendshipsPage = transport.api_get(path, &query).await?;
        let fetched = page.users.len();
        users.extend(page.users.into_iter().map(Profile::from));
        tracing::debug!("{}: page of {} (total {})", path, fetched, users.len());

        match page.next_max_id {
            Some(next) if fetched > 0 && users.len() < amount => cursor = Some(next),
            _ => break,
        }
        human_pause(transport.settings().page_delay).await;
    }

    users.truncate(amount);
    Ok(users)
}

/// Recent posts of `user_id`, newest first
pub async fn list_user_media(
    transport: &Transport,
    user_id: u64,
    amount: usize,
) -> Result<Vec<MediaItem>> {
    let nodes = paginate_graphql(
        transport,
        query_hash::USER_MEDIA,
        json!({ "id": user_id.to_string() }),
        amount,
        |data: UserMediaData| split(data.user.and_then(|u| u.edge_owner_to_timeline_media)),
    )
    .await?;
    Ok(nodes.into_iter().map(MediaItem::from).collect())
}

/// Accounts that liked the post with `shortcode`
pub async fn list_media_likers(
    transport: &Transport,
    shortcode: &str,
    amount: usize,
) -> Result<Vec<Profile>> {
    let nodes = paginate_graphql(
        transport,
        query_hash::MEDIA_LIKERS,
        json!({ "shortcode": shortcode }),
        amount,
        |data: ShortcodeMediaData| split(data.shortcode_media.and_then(|m| m.edge_liked_by)),
    )
    .await?;
    Ok(nodes.into_iter().map(Profile::from).collect())
}

/// Top and recent posts tagged with `tag` (without the leading `#`)
///
/// Top posts come first. Every page repeats the top section, so posts are
/// deduplicated as they arrive and only distinct posts count toward `amount`.
pub async fn list_hashtag_media(
    transport: &Transport,
    tag: &str,
    amount: usize,
) -> Result<Vec<MediaItem>> {
    let tag = tag.trim_start_matches('#');
    let mut seen: HashSet<String> = HashSet::new();
    let nodes = paginate_graphql(
        transport,
        query_hash::HASHTAG_MEDIA,
        json!({ "tag_name": tag }),
        amount,
        |data: HashtagData| {
            let Some(hashtag) = data.hashtag else {
                return (Vec::new(), None);
            };
            let (top, _) = split(hashtag.edge_hashtag_to_top_posts);
            let (recent, cursor) = split(hashtag.edge_hashtag_to_media);
            let fresh = top
                .into_iter()
                .chain(recent)
                .filter(|n: &MediaNode| seen.insert(n.id.clone()))
                .collect();
            (fresh, cursor)
        },
    )
    .await?;
    Ok(nodes.into_iter().map(MediaItem::from).collect())
}

/// Active stories of `user_id`, in the order the reel plays them
///
/// An account without active stories answers with a null reel, which is an
/// empty list rather than an error.
pub async fn list_user_stories(transport: &Transport, user_id: u64) -> Result<Vec<StoryItem>> {
    let path = format!("feed/user/{}/story/", user_id);
    let response: UserStoryResponse = transport.api_get(&path, &[]).await?;
    let items = response.reel.map(|reel| reel.items).unwrap_or_default();
    tracing::debug!("{} active stories for {}", items.len(), user_id);
    Ok(items
        .into_iter()
        .map(|node| StoryItem::from_node(node, user_id))
        .collect())
}

fn split<N>(connection: Option<Connection<N>>) -> (Vec<N>, Option<String>) {
    match connection {
        Some(conn) => {
            let cursor = conn.next_cursor().map(str::to_string);
            (conn.into_nodes().collect(), cursor)
        }
        None => (Vec::new(), None),
    }
}

/// Page through a GraphQL connection until `amount` nodes or no cursor
///
/// `extract` pulls the page's nodes and the continuation cursor out of the
/// query-specific `data` object. Nodes it returns are counted as they are, so
/// any filtering has to happen inside it.
async fn paginate_graphql<D, N, F>(
    transport: &Transport,
    query_hash: &str,
    variables: Value,
    amount: usize,
    mut extract: F,
) -> Result<Vec<N>>
where
    D: DeserializeOwned,
    F: FnMut(D) -> (Vec<N>, Option<String>),
{
    let mut nodes: Vec<N> = Vec::new();
    let mut after: Option<String> = None;

    while nodes.len() < amount {
        let mut vars = variables.clone();
        if let Value::Object(map) = &mut vars {
            map.insert("first".to_string(), json!(amount.min(MAX_PAGE_SIZE)));
            if let Some(cursor) = &after {
                map.insert("after".to_string(), json!(cursor));
            }
        }

        let response = transport.graphql::<D>(query_hash, &vars).await?;
        let Some(data) = response.data else {
            tracing::debug!("Query {} returned no data", query_hash);
            break;
        };
        let (page, cursor) = extract(data);
        let fetched = page.len();
        nodes.extend(page);

        match cursor {
            Some(next) if fetched > 0 && nodes.len() < amount => after = Some(next),
            _ => break,
        }
        human_pause(transport.settings().page_delay).await;
    }

    nodes.truncate(amount);
    Ok(nodes)
}

/// Internal numeric id of the post with `shortcode`
///
/// Deleted posts, malformed shortcodes and failed lookups all yield `None`.
pub async fn resolve_shortcode_to_id(transport: &Transport, shortcode: &str) -> Option<u64> {
    if !is_valid_shortcode(shortcode) {
        tracing::debug!("Not a shortcode: {:?}", shortcode);
        return None;
    }
    let vars = json!({ "shortcode": shortcode });
    match transport
        .graphql::<ShortcodeMediaData>(query_hash::SHORTCODE_MEDIA, &vars)
        .await
    {
        Ok(response) => response
            .data
            .and_then(|d| d.shortcode_media)
            .and_then(|m| m.id.parse().ok()),
        Err(e) => {
            tracing::debug!("Could not resolve shortcode {}: {}", shortcode, e);
            None
        }
    }
}

/// Internal numeric id of the post a public URL points at
pub async fn resolve_post_url(transport: &Transport, post_url: &str) -> Option<u64> {
    let shortcode = shortcode_from_url(post_url)?;
    resolve_shortcode_to_id(transport, &shortcode).await
}

/// Shortcode of a `/p/`, `/reel/` or `/tv/` permalink
pub fn shortcode_from_url(post_url: &str) -> Option<String> {
    let parsed = url::Url::parse(post_url).ok()?;
    if !parsed.host_str()?.ends_with("instagram.com") {
        return None;
    }
    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if matches!(segment, "p" | "reel" | "tv") {
            return segments
                .next()
                .filter(|code| is_valid_shortcode(code))
                .map(str::to_string);
        }
    }
    None
}

fn is_valid_shortcode(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Accounts matching `query` in the blended search
pub async fn search_users(
    transport: &Transport,
    query: &str,
    amount: usize,
) -> Result<Vec<Profile>> {
    let params = [
        ("query", query.to_string()),
        ("context", "blended".to_string()),
    ];
    let response: TopSearchResponse = transport.api_get("web/search/topsearch/", &params).await?;
    Ok(response
        .users
        .into_iter()
        .map(|hit| Profile::from(hit.user))
        .take(amount)
        .collect())
}

/// Numeric id for `username`, `None` when the account does not exist
pub async fn user_id_for(transport: &Transport, username: &str) -> Result<Option<u64>> {
    Ok(get_profile(transport, username).await?.map(|p| p.id))
}
