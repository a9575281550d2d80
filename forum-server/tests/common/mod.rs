#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use forum_server::application::{
    auth_service::AuthService, post_service::PostService, search_service::SearchService,
    user_service::UserService,
};
use forum_server::data::{post_repository::PostRepository, user_repository::UserRepository};
use forum_server::domain::{
    error::DomainError,
    post::{Post, PostFilter, PostSort, SortField, SortOrder},
    user::{NewUser, User},
};
use forum_server::infrastructure::{
    events::{EventError, EventNotifier, EventPublisher},
    media::MediaStore,
    search::{
        Bucket, PostDocument, SearchError, SearchHit, SearchIndex, SearchRequest, SearchResults,
        SearchStatistics,
    },
    security::JwtKeys,
};
use forum_server::server::AppState;

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: Mutex<Vec<Post>>,
}

impl InMemoryPostRepository {
    fn chain_below(posts: &[Post], roots: &[Uuid]) -> Vec<Uuid> {
        let mut found = Vec::new();
        let mut frontier: Vec<Uuid> = roots.to_vec();
        while let Some(id) = frontier.pop() {
            for post in posts.iter().filter(|p| p.parent_post_id == Some(id)) {
                if !found.contains(&post.id) {
                    found.push(post.id);
                    frontier.push(post.id);
                }
            }
        }
        found
    }

    fn check_parent(posts: &[Post], post: &Post) -> Result<(), DomainError> {
        if let Some(parent) = post.parent_post_id {
            if !posts.iter().any(|p| p.id == parent) {
                return Err(DomainError::validation("parent post does not exist"));
            }
            if posts
                .iter()
                .any(|p| p.parent_post_id == Some(parent) && p.id != post.id)
            {
                return Err(DomainError::validation("the parent post already has a reply"));
            }
        }
        Ok(())
    }

    /// Mirrors the author foreign key cascade.
    pub fn remove_by_author(&self, author_id: Uuid) {
        let mut posts = self.posts.lock().unwrap();
        let authored: Vec<Uuid> = posts
            .iter()
            .filter(|p| p.author_id == author_id)
            .map(|p| p.id)
            .collect();
        let mut removed = Self::chain_below(&posts, &authored);
        removed.extend(authored);
        posts.retain(|p| !removed.contains(&p.id));
    }

    pub fn len(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    /// Inserts as-is, skipping every check; for arranging fixtures.
    pub fn insert_raw(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    posts
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        // posts.username is VARCHAR(64)
        if post.username.chars().count() > 64 {
            return Err(DomainError::Internal("value too long for posts.username".into()));
        }
        let mut posts = self.posts.lock().unwrap();
        Self::check_parent(&posts, &post)?;
        posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn find_reply(&self, parent_id: Uuid) -> Result<Option<Post>, DomainError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.parent_post_id == Some(parent_id))
            .cloned())
    }

    async fn update(&self, post: &Post) -> Result<Post, DomainError> {
        let mut posts = self.posts.lock().unwrap();
        Self::check_parent(&posts, post)?;
        let slot = posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(DomainError::PostNotFound(post.id))?;
        *slot = post.clone();
        Ok(post.clone())
    }

    async fn delete_thread(&self, id: Uuid) -> Result<Vec<Uuid>, DomainError> {
        let mut posts = self.posts.lock().unwrap();
        if !posts.iter().any(|p| p.id == id) {
            return Err(DomainError::PostNotFound(id));
        }
        let mut removed = vec![id];
        removed.extend(Self::chain_below(&posts, &[id]));
        posts.retain(|p| !removed.contains(&p.id));
        Ok(removed)
    }

    async fn list_page(
        &self,
        sort: PostSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, DomainError> {
        let mut posts = self.posts.lock().unwrap().clone();
        posts.sort_by(|a, b| match sort.field {
            SortField::Username => a.username.cmp(&b.username),
            SortField::Email => a.email.cmp(&b.email),
            SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
        });
        if sort.order == SortOrder::Desc {
            posts.reverse();
        }
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64, DomainError> {
        Ok(self.posts.lock().unwrap().len() as i64)
    }

    async fn descendants_of(&self, ids: &[Uuid]) -> Result<Vec<Post>, DomainError> {
        let posts = self.posts.lock().unwrap();
        let below = Self::chain_below(&posts, ids);
        Ok(posts
            .iter()
            .filter(|p| below.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list_filtered(&self, filter: &PostFilter) -> Result<Vec<Post>, DomainError> {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_ref()
                .is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
        };
        let posts = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| contains(&p.text, &filter.search))
            .filter(|p| contains(&p.username, &filter.author))
            .filter(|p| {
                filter
                    .parent_post_id
                    .is_none_or(|parent| p.parent_post_id == Some(parent))
            })
            .cloned()
            .collect();
        Ok(newest_first(posts))
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        let posts = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        Ok(newest_first(posts))
    }

    async fn replies_to(&self, parent_id: Uuid) -> Result<Vec<Post>, DomainError> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.parent_post_id == Some(parent_id))
            .cloned()
            .collect();
        posts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(posts)
    }

    async fn search_text(&self, query: &str) -> Result<Vec<Post>, DomainError> {
        let query = query.to_lowercase();
        let posts = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.text.to_lowercase().contains(&query) || p.username.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        Ok(newest_first(posts))
    }

    async fn list_all(&self) -> Result<Vec<Post>, DomainError> {
        Ok(self.posts.lock().unwrap().clone())
    }
}

pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
    posts: Arc<InMemoryPostRepository>,
}

impl InMemoryUserRepository {
    pub fn new(posts: Arc<InMemoryPostRepository>) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            posts,
        }
    }

    pub fn promote(&self, id: Uuid, staff: bool, superuser: bool) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.is_staff = staff;
            user.is_superuser = superuser;
        }
    }

    fn check_unique(users: &[User], user: &User) -> Result<(), DomainError> {
        if users
            .iter()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(DomainError::UserAlreadyExists(
                "a user with this username already exists".into(),
            ));
        }
        if users
            .iter()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DomainError::UserAlreadyExists(
                "a user with this email already exists".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut users = self.users.lock().unwrap();
        Self::check_unique(&users, &user)?;
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut users = self.users.lock().unwrap();
        Self::check_unique(&users, user)?;
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| DomainError::UserNotFound(user.id.to_string()))?;
        *slot = user.clone();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        {
            let mut users = self.users.lock().unwrap();
            let before = users.len();
            users.retain(|u| u.id != id);
            if users.len() == before {
                return Err(DomainError::UserNotFound(id.to_string()));
            }
        }
        self.posts.remove_by_author(id);
        Ok(())
    }

    async fn list(
        &self,
        search: Option<&str>,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<User>, DomainError> {
        let needle = search.map(str::to_lowercase);
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| {
                needle.as_ref().is_none_or(|n| {
                    u.username.to_lowercase().contains(n)
                        || u.first_name.to_lowercase().contains(n)
                        || u.last_name.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        let users = users.into_iter().skip(offset as usize);
        Ok(match limit {
            Some(limit) => users.take(limit as usize).collect(),
            None => users.collect(),
        })
    }
}

/// Keeps documents in a map; `fail` makes every call error like an unreachable cluster.
#[derive(Default)]
pub struct RecordingIndex {
    docs: Mutex<HashMap<Uuid, PostDocument>>,
    index_calls: Mutex<usize>,
    fail: AtomicBool,
}

impl RecordingIndex {
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.docs.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn index_calls(&self) -> usize {
        *self.index_calls.lock().unwrap()
    }

    fn check(&self) -> Result<(), SearchError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(SearchError::Status {
                status: 503,
                body: "cluster unavailable".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        self.check()
    }

    async fn delete_index(&self) -> Result<(), SearchError> {
        self.check()?;
        self.docs.lock().unwrap().clear();
        Ok(())
    }

    async fn index_post(&self, doc: &PostDocument) -> Result<(), SearchError> {
        *self.index_calls.lock().unwrap() += 1;
        self.check()?;
        self.docs.lock().unwrap().insert(doc.id, doc.clone());
        Ok(())
    }

    async fn remove_post(&self, id: Uuid) -> Result<(), SearchError> {
        self.check()?;
        self.docs.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        self.check()?;
        let needle = request.query.as_deref().map(str::to_lowercase);
        let hits: Vec<SearchHit> = self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| {
                needle
                    .as_ref()
                    .is_none_or(|n| d.text.to_lowercase().contains(n))
            })
            .filter(|d| {
                request
                    .filters
                    .username
                    .as_ref()
                    .is_none_or(|u| &d.username == u)
            })
            .map(|d| SearchHit {
                document: d.clone(),
                score: Some(1.0),
            })
            .collect();
        let total = hits.len() as u64;
        let hits = hits
            .into_iter()
            .skip(request.from as usize)
            .take(request.size as usize)
            .collect();

        Ok(SearchResults {
            total,
            hits,
            query: request.query.clone(),
            filters: request.filters.clone(),
            ..SearchResults::default()
        })
    }

    async fn suggest(&self, prefix: &str, size: i64) -> Result<Vec<String>, SearchError> {
        self.check()?;
        let mut texts: Vec<String> = self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.text.starts_with(prefix))
            .map(|d| d.text.clone())
            .collect();
        texts.sort();
        texts.dedup();
        texts.truncate(size as usize);
        Ok(texts)
    }

    async fn statistics(&self) -> Result<SearchStatistics, SearchError> {
        self.check()?;
        let docs = self.docs.lock().unwrap();
        let mut users: Vec<&str> = docs.values().map(|d| d.username.as_str()).collect();
        users.sort_unstable();
        users.dedup();
        Ok(SearchStatistics {
            total_posts: docs.len() as u64,
            unique_users: users.len() as u64,
            posts_by_date: vec![Bucket {
                key: "all".into(),
                doc_count: docs.len() as u64,
            }],
        })
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Option<String>, Value)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<(Option<String>, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .map(|(_, payload)| payload)
            .filter(|p| p["event_type"] == event_type || p["type"] == event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, key: Option<&str>, payload: Value) -> Result<(), EventError> {
        if self.fail.load(Ordering::SeqCst) {
            let broken = serde_json::from_str::<Value>("{").unwrap_err();
            return Err(EventError::Serde(broken));
        }
        self.events
            .lock()
            .unwrap()
            .push((key.map(str::to_string), payload));
        Ok(())
    }
}

pub struct Harness {
    pub posts_repo: Arc<InMemoryPostRepository>,
    pub users_repo: Arc<InMemoryUserRepository>,
    pub index: Arc<RecordingIndex>,
    pub publisher: Arc<RecordingPublisher>,
    pub media_root: PathBuf,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let posts_repo = Arc::new(InMemoryPostRepository::default());
        let users_repo = Arc::new(InMemoryUserRepository::new(Arc::clone(&posts_repo)));
        let index = Arc::new(RecordingIndex::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let media_root = std::env::temp_dir().join(format!("forum-test-{}", Uuid::new_v4()));

        let post_repo_dyn: Arc<dyn PostRepository> = posts_repo.clone();
        let user_repo_dyn: Arc<dyn UserRepository> = users_repo.clone();
        let index_dyn: Arc<dyn SearchIndex> = index.clone();
        let publisher_dyn: Arc<dyn EventPublisher> = publisher.clone();

        let notifier = EventNotifier::new(publisher_dyn);
        let media = MediaStore::new(&media_root);
        let search = SearchService::new(index_dyn, notifier.clone());
        let auth = AuthService::new(
            Arc::clone(&user_repo_dyn),
            JwtKeys::new("test-secret".into()),
        );
        let users = UserService::new(
            user_repo_dyn,
            Arc::clone(&post_repo_dyn),
            search.clone(),
            media.clone(),
        );
        let posts = PostService::new(post_repo_dyn, search.clone(), notifier, media, 25);

        Self {
            posts_repo,
            users_repo,
            index,
            publisher,
            media_root,
            state: AppState::new(auth, users, posts, search),
        }
    }

    pub fn posts(&self) -> &PostService {
        &self.state.posts
    }

    pub async fn register(&self, username: &str) -> User {
        self.state
            .auth
            .register(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password: "secret-password".into(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap()
    }

    pub async fn staff(&self, username: &str) -> User {
        let user = self.register(username).await;
        self.users_repo.promote(user.id, true, false);
        self.state.users.get_user(user.id).await.unwrap()
    }

    pub fn token(&self, user: &User) -> String {
        self.state.auth.keys().generate_token(user).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}
