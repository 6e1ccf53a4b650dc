// ABOUTME: Typed decoders for every remote page shape the client consumes
// ABOUTME: All assumptions about the site's JSON layout live here, one function per page type

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{malformed, AppError};

/// Decoded body of the login ajax response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResult {
    #[serde(default)]
    pub authenticated: bool,

    /// Everything else the server sent back (`user`, `userId`, `status`, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// One page of a profile's timeline
#[derive(Debug, Clone, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub edges: Vec<TimelineEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEdge {
    pub node: Value,
}

/// Server supplied pagination state, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// The `graphql.user` subtree of a profile page
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileData {
    pub id: String,
    pub username: String,
    pub edge_owner_to_timeline_media: TimelinePage,
}

/// How a timeline node has to be resolved into media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    /// Multi-image post; children come from the post page
    Carousel,
    /// Video post; the playable url comes from the post page
    Video,
    /// Everything else is complete as listed
    Single,
}

impl PostKind {
    pub fn of(node: &Value) -> Self {
        match node.get("__typename").and_then(Value::as_str) {
            Some("GraphSidecar") => PostKind::Carousel,
            Some("GraphVideo") => PostKind::Video,
            _ => PostKind::Single,
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Deserialize)]
struct QueryData {
    user: Option<QueryUser>,
}

#[derive(Deserialize)]
struct QueryUser {
    edge_owner_to_timeline_media: TimelinePage,
}

#[derive(Deserialize)]
struct Sidecar {
    edge_sidecar_to_children: Connection,
}

#[derive(Deserialize)]
struct Connection {
    edges: Vec<TimelineEdge>,
}

/// `config.csrf_token` from a login page's shared data
pub fn csrf_token(data: &Map<String, Value>) -> Result<String, AppError> {
    data.get("config")
        .and_then(|config| config.get("csrf_token"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AppError::CsrfToken)
}

/// The login ajax response body
pub fn auth_result(body: &str) -> Result<AuthResult, AppError> {
    serde_json::from_str(body).map_err(|e| malformed(format!("login response: {}", e)))
}

/// `entry_data.ProfilePage[0].graphql.user` from a profile page's shared data.
///
/// A missing `user` subtree means the profile is absent or hidden; a `user`
/// that does not decode means the page shape changed.
pub fn profile(mut data: Map<String, Value>, requested: &str) -> Result<ProfileData, AppError> {
    let user = data
        .get_mut("entry_data")
        .and_then(|entry_data| entry_data.get_mut("ProfilePage"))
        .and_then(|pages| pages.get_mut(0))
        .and_then(|page| page.get_mut("graphql"))
        .and_then(|graphql| graphql.get_mut("user"))
        .filter(|user| user.is_object())
        .map(Value::take)
        .ok_or_else(|| AppError::ProfileNotFound(requested.to_string()))?;

    serde_json::from_value(user).map_err(|e| malformed(format!("profile {}: {}", requested, e)))
}

/// `data.user.edge_owner_to_timeline_media` from a pagination query response
pub fn next_page(body: &str) -> Result<TimelinePage, AppError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("timeline query: {}", e)))?;

    response
        .data
        .user
        .map(|user| user.edge_owner_to_timeline_media)
        .ok_or_else(|| malformed("timeline query returned no user"))
}

/// `graphql.shortcode_media` from a post page's additional data
pub fn shortcode_media(mut data: Map<String, Value>) -> Result<Value, AppError> {
    match data
        .get_mut("graphql")
        .and_then(|graphql| graphql.get_mut("shortcode_media"))
    {
        Some(media) if media.is_object() => Ok(media.take()),
        _ => Err(malformed("post page has no graphql.shortcode_media")),
    }
}

/// Child nodes of a carousel's shortcode media, in the order given
pub fn sidecar_children(media: Value) -> Result<Vec<Value>, AppError> {
    let sidecar: Sidecar = serde_json::from_value(media)
        .map_err(|e| malformed(format!("carousel children: {}", e)))?;

    Ok(sidecar
        .edge_sidecar_to_children
        .edges
        .into_iter()
        .map(|edge| edge.node)
        .collect())
}

/// Shortcode of a timeline node, required for the post page lookup
pub fn shortcode(node: &Value) -> Result<&str, AppError> {
    node.get("shortcode")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("timeline node has no shortcode"))
}
