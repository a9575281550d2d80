use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::search_service::SearchService;
use crate::data::{post_repository::PostRepository, user_repository::UserRepository};
use crate::domain::{
    error::DomainError,
    user::{User, UserChanges},
    validation::{validate_email, validate_search_query, validate_username},
};
use crate::infrastructure::media::MediaStore;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    search: SearchService,
    media: MediaStore,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        search: SearchService,
        media: MediaStore,
    ) -> Self {
        Self {
            users,
            posts,
            search,
            media,
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }

    pub async fn user_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))
    }

    pub async fn list_users(
        &self,
        search: Option<&str>,
        first: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Vec<User>, DomainError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.users
            .list(search, first.map(|n| n.max(0)), skip.unwrap_or(0).max(0))
            .await
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<User>, DomainError> {
        let query = validate_search_query(query)?;
        self.users.list(Some(&query), None, 0).await
    }

    #[instrument(skip(self, actor, changes), fields(actor = %actor.username))]
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: Uuid,
        changes: UserChanges,
    ) -> Result<User, DomainError> {
        if actor.id != user_id && !actor.is_staff {
            return Err(DomainError::Forbidden("you can only edit your own profile"));
        }
        let mut user = self.get_user(user_id).await?;

        if let Some(username) = changes.username {
            let username = validate_username(&username)?;
            if let Some(other) = self.users.find_by_username(&username).await? {
                if other.id != user.id {
                    return Err(DomainError::UserAlreadyExists(
                        "a user with this username already exists".into(),
                    ));
                }
            }
            user.username = username;
        }
        if let Some(email) = changes.email {
            let email = validate_email(&email)?.to_lowercase();
            if let Some(other) = self.users.find_by_email(&email).await? {
                if other.id != user.id {
                    return Err(DomainError::UserAlreadyExists(
                        "a user with this email already exists".into(),
                    ));
                }
            }
            user.email = email;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name.trim().to_string();
        }

        let user = self.users.update(&user).await?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Deleting a user removes their posts, and the replies below them, from
    /// the index as well.
    #[instrument(skip(self, actor), fields(actor = %actor.username))]
    pub async fn delete_user(&self, actor: &User, user_id: Uuid) -> Result<(), DomainError> {
        if actor.id != user_id && !actor.is_staff {
            return Err(DomainError::Forbidden("you can only delete your own account"));
        }
        let user = self.get_user(user_id).await?;
        if user.is_superuser {
            return Err(DomainError::Forbidden("superusers cannot be deleted"));
        }

        let authored: Vec<Uuid> = self
            .posts
            .list_by_author(user.id)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let mut removed = authored.clone();
        if !authored.is_empty() {
            removed.extend(
                self.posts
                    .descendants_of(&authored)
                    .await?
                    .into_iter()
                    .map(|p| p.id),
            );
        }
        removed.sort_unstable();
        removed.dedup();

        self.users.delete(user.id).await?;
        info!(user_id = %user.id, posts_removed = removed.len(), "user deleted");

        self.search.remove_posts(&removed).await;
        for id in &removed {
            self.media.remove_post_media(*id).await;
        }
        Ok(())
    }
}
