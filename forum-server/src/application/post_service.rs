use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::search_service::SearchService;
use crate::data::post_repository::PostRepository;
use crate::domain::{
    error::DomainError,
    post::{AttachmentKind, Post, PostChanges, PostDraft, PostFilter, PostSort},
    thread::{self, ThreadEntry},
    user::User,
    validation::{sanitize_post_text, validate_search_query},
};
use crate::infrastructure::events::EventNotifier;
use crate::infrastructure::media::MediaStore;

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    search: SearchService,
    notifier: EventNotifier,
    media: MediaStore,
    page_size: i64,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        search: SearchService,
        notifier: EventNotifier,
        media: MediaStore,
        page_size: i64,
    ) -> Self {
        Self {
            repo,
            search,
            notifier,
            media,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    fn paging(&self, page: Option<i64>, page_size: Option<i64>) -> (i64, i64) {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }

    pub async fn list_posts(
        &self,
        sort: PostSort,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Page<Post>, DomainError> {
        let (page, page_size) = self.paging(page, page_size);
        let items = self
            .repo
            .list_page(sort, page_size, (page - 1) * page_size)
            .await?;
        let total = self.repo.count().await?;

        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    /// A page of posts arranged as threads: each root of the page followed by
    /// its reply chain, wherever the replies sit in the ordering.
    pub async fn list_threads(
        &self,
        sort: PostSort,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Page<ThreadEntry>, DomainError> {
        let posts = self.list_posts(sort, page, page_size).await?;

        let roots: Vec<Uuid> = posts
            .items
            .iter()
            .filter(|p| p.is_root())
            .map(|p| p.id)
            .collect();
        let descendants = if roots.is_empty() {
            Vec::new()
        } else {
            self.repo.descendants_of(&roots).await?
        };

        Ok(Page {
            items: thread::assemble(&posts.items, &descendants),
            page: posts.page,
            page_size: posts.page_size,
            total: posts.total,
        })
    }

    pub async fn filter_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, DomainError> {
        self.repo.list_filtered(filter).await
    }

    pub async fn user_posts(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        self.repo.list_by_author(author_id).await
    }

    pub async fn post_comments(&self, post_id: Uuid) -> Result<Vec<Post>, DomainError> {
        self.get_post(post_id).await?;
        self.repo.replies_to(post_id).await
    }

    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>, DomainError> {
        let query = validate_search_query(query)?;
        self.repo.search_text(&query).await
    }

    pub async fn all_posts(&self) -> Result<Vec<Post>, DomainError> {
        self.repo.list_all().await
    }

    #[instrument(skip(self, author, draft), fields(username = %author.username))]
    pub async fn create_post(&self, author: &User, draft: PostDraft) -> Result<Post, DomainError> {
        let text = sanitize_post_text(&draft.text)?;

        if let Some(parent_id) = draft.parent_post_id {
            self.ensure_parent_accepts(parent_id, None).await?;
        }

        let post = self
            .repo
            .create(Post::new(author, text, draft.parent_post_id))
            .await?;
        info!(post_id = %post.id, parent_post_id = ?post.parent_post_id, "post created");

        self.search.index_post(&post).await;
        self.notifier.post_created(&post).await;
        Ok(post)
    }

    #[instrument(skip(self, user, changes), fields(username = %user.username))]
    pub async fn update_post(
        &self,
        user: &User,
        post_id: Uuid,
        changes: PostChanges,
    ) -> Result<Post, DomainError> {
        let mut post = self.get_post(post_id).await?;
        if !post.can_be_modified_by(user) {
            return Err(DomainError::Forbidden(
                "only the author or staff can modify this post",
            ));
        }

        if let Some(text) = changes.text {
            post.text = sanitize_post_text(&text)?;
        }

        if let Some(parent_id) = changes.parent_post_id {
            if post.parent_post_id != Some(parent_id) {
                if parent_id == post.id {
                    return Err(DomainError::validation("a post cannot reply to itself"));
                }
                self.ensure_parent_accepts(parent_id, Some(post.id)).await?;

                let below = self.repo.descendants_of(&[post.id]).await?;
                if below.iter().any(|p| p.id == parent_id) {
                    return Err(DomainError::validation(
                        "a post cannot reply to one of its own replies",
                    ));
                }
                post.parent_post_id = Some(parent_id);
            }
        }

        let post = self.repo.update(&post).await?;
        info!(post_id = %post.id, "post updated");

        self.search.index_post(&post).await;
        Ok(post)
    }

    /// Deletes the post together with its reply chain. Returns the removed ids.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn delete_post(&self, user: &User, post_id: Uuid) -> Result<Vec<Uuid>, DomainError> {
        let post = self.get_post(post_id).await?;
        if !post.can_be_modified_by(user) {
            return Err(DomainError::Forbidden(
                "only the author or staff can delete this post",
            ));
        }

        let removed = self.repo.delete_thread(post_id).await?;
        info!(post_id = %post_id, removed = removed.len(), "post deleted");

        self.search.remove_posts(&removed).await;
        for id in &removed {
            self.media.remove_post_media(*id).await;
        }
        Ok(removed)
    }

    #[instrument(skip(self, user, bytes), fields(username = %user.username))]
    pub async fn attach(
        &self,
        user: &User,
        post_id: Uuid,
        kind: AttachmentKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Post, DomainError> {
        let mut post = self.get_post(post_id).await?;
        if !post.can_be_modified_by(user) {
            return Err(DomainError::Forbidden(
                "only the author or staff can modify this post",
            ));
        }

        let previous = match kind {
            AttachmentKind::Image => {
                let stored = self.media.save_image(post_id, filename, bytes).await?;
                post.image.replace(stored)
            }
            AttachmentKind::TextFile => {
                let stored = self.media.save_text_file(post_id, filename, bytes).await?;
                post.text_file.replace(stored)
            }
        };

        let post = self.repo.update(&post).await?;

        // a replacement under another name leaves the old file behind
        let current = match kind {
            AttachmentKind::Image => post.image.as_deref(),
            AttachmentKind::TextFile => post.text_file.as_deref(),
        };
        if let Some(old) = previous.filter(|old| Some(old.as_str()) != current) {
            self.media.remove_file(&old).await;
        }
        Ok(post)
    }

    /// The parent must exist and must not already have a reply other than `replying`.
    async fn ensure_parent_accepts(
        &self,
        parent_id: Uuid,
        replying: Option<Uuid>,
    ) -> Result<(), DomainError> {
        if self.repo.find_by_id(parent_id).await?.is_none() {
            return Err(DomainError::ParentPostNotFound(parent_id));
        }
        match self.repo.find_reply(parent_id).await? {
            Some(reply) if Some(reply.id) != replying => Err(DomainError::validation(
                "the parent post already has a reply",
            )),
            _ => Ok(()),
        }
    }
}
