use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{post::Post, thread::ThreadEntry, user::User};
use crate::infrastructure::search::{Bucket, SearchHit, SearchResults, SearchStatistics};

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "User")]
pub struct UserType {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserType {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "Post")]
pub struct PostType {
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

impl From<Post> for PostType {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            parent_post_id: post.parent_post_id,
            username: post.username,
            email: post.email,
            text: post.text,
            timestamp: post.timestamp,
            image: post.image,
            text_file: post.text_file,
        }
    }
}

pub fn posts(posts: Vec<Post>) -> Vec<PostType> {
    posts.into_iter().map(PostType::from).collect()
}

pub fn users(users: Vec<User>) -> Vec<UserType> {
    users.into_iter().map(UserType::from).collect()
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "ThreadEntry")]
pub struct ThreadEntryType {
    pub post: PostType,
    pub depth: i32,
    /// Leaves are the only posts that can still be replied to.
    pub is_leaf: bool,
}

impl From<ThreadEntry> for ThreadEntryType {
    fn from(entry: ThreadEntry) -> Self {
        Self {
            post: entry.post.into(),
            depth: entry.depth as i32,
            is_leaf: entry.is_leaf,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "SearchHit")]
pub struct SearchHitType {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub parent_post_id: Option<Uuid>,
    pub score: Option<f64>,
}

impl From<SearchHit> for SearchHitType {
    fn from(hit: SearchHit) -> Self {
        let doc = hit.document;
        Self {
            id: doc.id,
            username: doc.username,
            email: doc.email,
            text: doc.text,
            timestamp: doc.timestamp,
            parent_post_id: doc.parent_post_id,
            score: hit.score,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "Bucket")]
pub struct BucketType {
    pub key: String,
    pub doc_count: i64,
}

impl From<Bucket> for BucketType {
    fn from(bucket: Bucket) -> Self {
        Self {
            key: bucket.key,
            doc_count: bucket.doc_count as i64,
        }
    }
}

fn buckets(buckets: Vec<Bucket>) -> Vec<BucketType> {
    buckets.into_iter().map(BucketType::from).collect()
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "SearchResult")]
pub struct SearchResultType {
    pub hits: Vec<SearchHitType>,
    pub total: i64,
    pub usernames: Vec<BucketType>,
    pub dates: Vec<BucketType>,
    pub query: Option<String>,
    pub error: Option<String>,
}

impl From<SearchResults> for SearchResultType {
    fn from(results: SearchResults) -> Self {
        Self {
            hits: results.hits.into_iter().map(SearchHitType::from).collect(),
            total: results.total as i64,
            usernames: buckets(results.aggregations.usernames),
            dates: buckets(results.aggregations.dates),
            query: results.query,
            error: results.error,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "SearchStatistics")]
pub struct StatisticsType {
    pub total_posts: i64,
    pub unique_users: i64,
    pub posts_by_date: Vec<BucketType>,
}

impl From<SearchStatistics> for StatisticsType {
    fn from(stats: SearchStatistics) -> Self {
        Self {
            total_posts: stats.total_posts as i64,
            unique_users: stats.unique_users as i64,
            posts_by_date: buckets(stats.posts_by_date),
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct PostPayload {
    pub post: PostType,
    pub success: bool,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct DeletePostPayload {
    pub deleted_ids: Vec<Uuid>,
    pub success: bool,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct UserPayload {
    pub user: UserType,
    pub success: bool,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct LoginPayload {
    pub token: String,
    pub user: UserType,
    pub success: bool,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct SuccessPayload {
    pub success: bool,
}
