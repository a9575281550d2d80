use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::post::{PostChanges, PostDraft, PostSort};
use crate::domain::user::{NewUser, User, UserChanges};
use crate::infrastructure::search::SearchFilters;

// ======================= AUTH =======================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<RegisterRequest> for NewUser {
    fn from(req: RegisterRequest) -> Self {
        NewUser {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(rename = "token_type")]
    pub token_type: String, // "Bearer"
    pub user: User,
}

// ======================= POSTS =======================

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
    #[serde(default)]
    pub parent_post_id: Option<Uuid>,
}

impl From<CreatePostRequest> for PostDraft {
    fn from(req: CreatePostRequest) -> Self {
        PostDraft {
            text: req.text,
            parent_post_id: req.parent_post_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub text: Option<String>,
    pub parent_post_id: Option<Uuid>,
}

impl From<UpdatePostRequest> for PostChanges {
    fn from(req: UpdatePostRequest) -> Self {
        PostChanges {
            text: req.text,
            parent_post_id: req.parent_post_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListPostsQuery {
    pub fn sort(&self) -> PostSort {
        PostSort::from_query(self.sort_by.as_deref(), self.order.as_deref())
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub sort_by: &'static str,
    pub order: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeletePostResponse {
    pub deleted: Vec<Uuid>,
}

// ======================= SEARCH =======================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub username: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub parent_post_id: Option<Uuid>,
    pub size: Option<i64>,
    pub from: Option<i64>,
}

impl SearchQuery {
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            username: self
                .username
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            date_from: self.date_from,
            date_to: self.date_to,
            parent_post_id: self.parent_post_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub q: String,
    pub size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub query: String,
    pub suggestions: Vec<String>,
}

// ======================= USERS =======================

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub first: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        UserChanges {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}
