use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
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

impl Post {
    /// Username and email are copied from the author at creation time.
    pub fn new(author: &User, text: String, parent_post_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id: author.id,
            parent_post_id,
            username: author.username.clone(),
            email: author.email.clone(),
            text,
            timestamp: Utc::now(),
            image: None,
            text_file: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_post_id.is_none()
    }

    pub fn can_be_modified_by(&self, user: &User) -> bool {
        self.author_id == user.id || user.is_staff
    }
}

/// Text and parent of a post about to be created.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub text: String,
    pub parent_post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    pub parent_post_id: Option<Uuid>,
}

/// Case-insensitive substring filters used by the API listings.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub search: Option<String>,
    pub author: Option<String>,
    pub parent_post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Username,
    Email,
    #[default]
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl PostSort {
    /// Unknown fields fall back to newest first regardless of the requested order.
    pub fn from_query(sort_by: Option<&str>, order: Option<&str>) -> Self {
        let order = match order {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        match sort_by.unwrap_or("timestamp") {
            "username" => Self {
                field: SortField::Username,
                order,
            },
            "email" => Self {
                field: SortField::Email,
                order,
            },
            "timestamp" => Self {
                field: SortField::Timestamp,
                order,
            },
            _ => Self::default(),
        }
    }

    pub fn order_clause(&self) -> &'static str {
        match (self.field, self.order) {
            (SortField::Username, SortOrder::Asc) => "username ASC, timestamp DESC",
            (SortField::Username, SortOrder::Desc) => "username DESC, timestamp DESC",
            (SortField::Email, SortOrder::Asc) => "email ASC, timestamp DESC",
            (SortField::Email, SortOrder::Desc) => "email DESC, timestamp DESC",
            (SortField::Timestamp, SortOrder::Asc) => "timestamp ASC",
            (SortField::Timestamp, SortOrder::Desc) => "timestamp DESC",
        }
    }

    pub fn sort_by(&self) -> &'static str {
        match self.field {
            SortField::Username => "username",
            SortField::Email => "email",
            SortField::Timestamp => "timestamp",
        }
    }

    pub fn order(&self) -> &'static str {
        match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    TextFile,
}
