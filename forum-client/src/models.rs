use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub parent_post_id: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub image: Option<String>,
    pub text_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadEntry {
    #[serde(flatten)]
    pub post: Post,
    pub depth: usize,
    pub is_leaf: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub sort_by: String,
    pub order: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(rename = "token_type")]
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub parent_post_id: Option<Uuid>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total: u64,
    /// Present when the search engine failed.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SuggestResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteResponse {
    pub deleted: Vec<Uuid>,
}
