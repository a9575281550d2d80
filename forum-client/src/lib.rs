use async_trait::async_trait;
use uuid::Uuid;

mod error;
mod http_client;
pub mod models;

pub use error::ForumClientError;
pub use http_client::ForumClientHttp;
use models::{Page, Post, SearchResults, ThreadEntry, User};

/// Listing options shared by the flat and threaded post pages.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[async_trait(?Send)]
pub trait ForumClient {
    async fn register(
        &mut self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User, ForumClientError>;
    async fn login(&mut self, username: String, password: String) -> Result<User, ForumClientError>;
    async fn logout(&mut self) -> Result<(), ForumClientError>;
    async fn get_post(&mut self, id: Uuid) -> Result<Post, ForumClientError>;
    async fn list_posts(&mut self, options: ListOptions) -> Result<Page<Post>, ForumClientError>;
    async fn list_threads(
        &mut self,
        options: ListOptions,
    ) -> Result<Page<ThreadEntry>, ForumClientError>;
    async fn create_post(
        &mut self,
        text: String,
        parent_post_id: Option<Uuid>,
    ) -> Result<Post, ForumClientError>;
    async fn update_post(
        &mut self,
        id: Uuid,
        text: Option<String>,
        parent_post_id: Option<Uuid>,
    ) -> Result<Post, ForumClientError>;
    /// Returns the ids of every removed post, replies included.
    async fn delete_post(&mut self, id: Uuid) -> Result<Vec<Uuid>, ForumClientError>;
    async fn search(
        &mut self,
        query: Option<String>,
        username: Option<String>,
        size: Option<i64>,
    ) -> Result<SearchResults, ForumClientError>;
    async fn suggest(&mut self, prefix: String) -> Result<Vec<String>, ForumClientError>;
}
