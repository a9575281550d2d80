use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::{
    error::DomainError,
    user::{NewUser, User},
    validation::{validate_email, validate_password, validate_username},
};
use crate::infrastructure::security::{JwtKeys, hash_password, verify_password};

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepository>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }

    /// Resolves a bearer token to its user. Any failure is `Unauthorized`.
    pub async fn authenticate(&self, token: &str) -> Result<User, DomainError> {
        let claims = self
            .keys
            .verify_token(token)
            .map_err(|_| DomainError::Unauthorized)?;
        let id = claims.user_id().ok_or(DomainError::Unauthorized)?;
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::Unauthorized)
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn register(&self, new_user: NewUser) -> Result<User, DomainError> {
        let username = validate_username(&new_user.username)?;
        let email = validate_email(&new_user.email)?.to_lowercase();
        validate_password(&new_user.password)?;

        if self.repo.find_by_username(&username).await?.is_some() {
            return Err(DomainError::UserAlreadyExists(
                "a user with this username already exists".into(),
            ));
        }
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(DomainError::UserAlreadyExists(
                "a user with this email already exists".into(),
            ));
        }

        let hash = hash_password(&new_user.password)
            .map_err(|err| DomainError::Internal(err.to_string()))?;
        let mut user = User::new(username, email, hash);
        user.first_name = new_user.first_name.unwrap_or_default().trim().to_string();
        user.last_name = new_user.last_name.unwrap_or_default().trim().to_string();

        let user = self.repo.create(user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Returns a fresh token and the user it was issued for.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User), DomainError> {
        let user = self
            .repo
            .find_by_username(username.trim())
            .await?
            .ok_or(DomainError::Unauthorized)?;

        let valid = verify_password(password, &user.password_hash)
            .map_err(|_| DomainError::Unauthorized)?;
        if !valid {
            return Err(DomainError::Unauthorized);
        }

        let token = self
            .keys
            .generate_token(&user)
            .map_err(|err| DomainError::Internal(err.to_string()))?;
        info!(user_id = %user.id, "user logged in");
        Ok((token, user))
    }
}
