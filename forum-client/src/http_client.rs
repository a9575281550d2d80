use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ForumClientError;
use crate::models::{
    AuthResponse, DeleteResponse, Page, Post, SearchResults, SuggestResponse, ThreadEntry, User,
};
use crate::{ForumClient, ListOptions};

const DEFAULT_TOKEN_FILE: &str = ".forum_token";

#[derive(Clone)]
pub struct ForumClientHttp {
    client: Arc<Client>,
    base_url: String,
    token: Option<String>,
    token_file: PathBuf,
}

impl ForumClientHttp {
    pub async fn connect(endpoint: &str) -> Result<Self, ForumClientError> {
        Ok(Self {
            client: Arc::new(Client::builder().build()?),
            base_url: endpoint.trim_end_matches('/').to_string(),
            token: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
        })
    }

    /// Keeps the session token somewhere other than `.forum_token` in the working directory.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = path.into();
        self
    }

    pub fn set_token(&mut self, token: String) -> Result<(), ForumClientError> {
        fs::write(&self.token_file, &token)?;
        self.token = Some(token);
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn clear_token(&mut self) -> Result<(), ForumClientError> {
        self.token = None;
        match fs::remove_file(&self.token_file) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn stored_token(&self) -> Result<Option<String>, ForumClientError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Some(token.clone()));
        }
        match fs::read_to_string(&self.token_file) {
            Ok(token) => {
                let token = token.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn auth_header(&self) -> Result<Option<HeaderValue>, ForumClientError> {
        let Some(token) = self.stored_token()? else {
            return Ok(None);
        };
        let header = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ForumClientError::Unauthorized)?;
        Ok(Some(header))
    }

    /// Attaches the token when one is stored; anonymous reads stay allowed.
    fn with_auth(&self, req: RequestBuilder) -> Result<RequestBuilder, ForumClientError> {
        Ok(match self.auth_header()? {
            Some(h) => req.header(AUTHORIZATION, h),
            None => req,
        })
    }

    /// Write calls fail locally when nobody is logged in.
    fn require_auth(&self, req: RequestBuilder) -> Result<RequestBuilder, ForumClientError> {
        let header = self.auth_header()?.ok_or(ForumClientError::Unauthorized)?;
        Ok(req.header(AUTHORIZATION, header))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn authenticate(&mut self, resp: Response) -> Result<User, ForumClientError> {
        let auth: AuthResponse = parse(resp).await?;
        self.set_token(auth.access_token)?;
        Ok(auth.user)
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ForumClientError> {
    if resp.status().is_success() {
        Ok(resp.json().await?)
    } else {
        Err(ForumClientError::from_http_response(resp).await)
    }
}

fn list_query(options: &ListOptions) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(sort_by) = &options.sort_by {
        query.push(("sort_by", sort_by.clone()));
    }
    if let Some(order) = &options.order {
        query.push(("order", order.clone()));
    }
    if let Some(page) = options.page {
        query.push(("page", page.to_string()));
    }
    if let Some(page_size) = options.page_size {
        query.push(("page_size", page_size.to_string()));
    }
    query
}

#[async_trait(?Send)]
impl ForumClient for ForumClientHttp {
    async fn register(
        &mut self,
        username: String,
        email: String,
        password: String,
    ) -> Result<User, ForumClientError> {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        self.authenticate(resp).await
    }

    async fn login(&mut self, username: String, password: String) -> Result<User, ForumClientError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;
        self.authenticate(resp).await
    }

    async fn logout(&mut self) -> Result<(), ForumClientError> {
        let req = self.with_auth(self.client.post(self.url("/auth/logout")))?;
        let resp = req.send().await?;
        // the local copy goes away even when the server rejects the token
        self.clear_token()?;
        if !resp.status().is_success() {
            return Err(ForumClientError::from_http_response(resp).await);
        }
        Ok(())
    }

    async fn get_post(&mut self, id: Uuid) -> Result<Post, ForumClientError> {
        let req = self.with_auth(self.client.get(self.url(&format!("/posts/{id}"))))?;
        parse(req.send().await?).await
    }

    async fn list_posts(&mut self, options: ListOptions) -> Result<Page<Post>, ForumClientError> {
        let req = self
            .client
            .get(self.url("/posts"))
            .query(&list_query(&options));
        parse(self.with_auth(req)?.send().await?).await
    }

    async fn list_threads(
        &mut self,
        options: ListOptions,
    ) -> Result<Page<ThreadEntry>, ForumClientError> {
        let req = self
            .client
            .get(self.url("/posts/threads"))
            .query(&list_query(&options));
        parse(self.with_auth(req)?.send().await?).await
    }

    async fn create_post(
        &mut self,
        text: String,
        parent_post_id: Option<Uuid>,
    ) -> Result<Post, ForumClientError> {
        let req = self.require_auth(self.client.post(self.url("/posts")))?;
        let resp = req
            .json(&serde_json::json!({
                "text": text,
                "parent_post_id": parent_post_id,
            }))
            .send()
            .await?;
        parse(resp).await
    }

    async fn update_post(
        &mut self,
        id: Uuid,
        text: Option<String>,
        parent_post_id: Option<Uuid>,
    ) -> Result<Post, ForumClientError> {
        let req = self.require_auth(self.client.put(self.url(&format!("/posts/{id}"))))?;
        let resp = req
            .json(&serde_json::json!({
                "text": text,
                "parent_post_id": parent_post_id,
            }))
            .send()
            .await?;
        parse(resp).await
    }

    async fn delete_post(&mut self, id: Uuid) -> Result<Vec<Uuid>, ForumClientError> {
        let req = self.require_auth(self.client.delete(self.url(&format!("/posts/{id}"))))?;
        let deleted: DeleteResponse = parse(req.send().await?).await?;
        Ok(deleted.deleted)
    }

    async fn search(
        &mut self,
        query: Option<String>,
        username: Option<String>,
        size: Option<i64>,
    ) -> Result<SearchResults, ForumClientError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = query {
            params.push(("q", q));
        }
        if let Some(username) = username {
            params.push(("username", username));
        }
        if let Some(size) = size {
            params.push(("size", size.to_string()));
        }
        let req = self.client.get(self.url("/search")).query(&params);
        parse(self.with_auth(req)?.send().await?).await
    }

    async fn suggest(&mut self, prefix: String) -> Result<Vec<String>, ForumClientError> {
        let req = self
            .client
            .get(self.url("/search/suggest"))
            .query(&[("q", prefix)]);
        let resp: SuggestResponse = parse(self.with_auth(req)?.send().await?).await?;
        Ok(resp.suggestions)
    }
}
