use crate::data::contains_pattern;
use crate::domain::error::DomainError;
use crate::domain::post::{Post, PostFilter, PostSort};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{error, info};
use uuid::Uuid;

const POST_COLUMNS: &str =
    "id, author_id, parent_post_id, username, email, text, timestamp, image, text_file";

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError>;
    /// The single direct reply to `parent_id`, if any.
    async fn find_reply(&self, parent_id: Uuid) -> Result<Option<Post>, DomainError>;
    async fn update(&self, post: &Post) -> Result<Post, DomainError>;
    /// Deletes the post and, through the cascade, its reply chain.
    /// Returns the ids of every removed post.
    async fn delete_thread(&self, id: Uuid) -> Result<Vec<Uuid>, DomainError>;
    async fn list_page(
        &self,
        sort: PostSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, DomainError>;
    async fn count(&self) -> Result<i64, DomainError>;
    /// Every post below the given posts, at any depth.
    async fn descendants_of(&self, ids: &[Uuid]) -> Result<Vec<Post>, DomainError>;
    async fn list_filtered(&self, filter: &PostFilter) -> Result<Vec<Post>, DomainError>;
    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError>;
    async fn replies_to(&self, parent_id: Uuid) -> Result<Vec<Post>, DomainError>;
    /// Substring match on text or username, newest first.
    async fn search_text(&self, query: &str) -> Result<Vec<Post>, DomainError>;
    async fn list_all(&self) -> Result<Vec<Post>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error) -> DomainError {
    let constraint = e
        .as_database_error()
        .and_then(|db| db.constraint())
        .map(str::to_owned);

    match constraint.as_deref() {
        Some("posts_parent_post_id_key") => {
            DomainError::validation("the parent post already has a reply")
        }
        Some("posts_parent_post_id_fkey") => DomainError::validation("parent post does not exist"),
        _ => {
            error!("failed to write post: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        }
    }
}

fn map_read_error(context: &str, e: sqlx::Error) -> DomainError {
    error!("db error {}: {}", context, e);
    DomainError::Internal(e.to_string())
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, parent_post_id, username, email, text, timestamp, image, text_file)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.parent_post_id)
        .bind(&post.username)
        .bind(&post.email)
        .bind(&post.text)
        .bind(post.timestamp)
        .bind(&post.image)
        .bind(&post.text_file)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        info!(post_id = %post.id, username = %post.username, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_read_error("find_by_id", e))
    }

    async fn find_reply(&self, parent_id: Uuid) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE parent_post_id = $1"
        ))
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_read_error("find_reply", e))
    }

    async fn update(&self, post: &Post) -> Result<Post, DomainError> {
        let updated = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET text = $1, parent_post_id = $2, image = $3, text_file = $4
            WHERE id = $5
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&post.text)
        .bind(post.parent_post_id)
        .bind(&post.image)
        .bind(&post.text_file)
        .bind(post.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or(DomainError::PostNotFound(post.id))?;

        info!(post_id = %post.id, "post updated");
        Ok(updated)
    }

    async fn delete_thread(&self, id: Uuid) -> Result<Vec<Uuid>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_read_error("delete_thread", e))?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE thread AS (
                SELECT id FROM posts WHERE id = $1
                UNION ALL
                SELECT p.id FROM posts p JOIN thread t ON p.parent_post_id = t.id
            )
            SELECT id FROM thread
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_read_error("delete_thread", e))?;

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_read_error("delete_thread", e))?;

        tx.commit()
            .await
            .map_err(|e| map_read_error("delete_thread", e))?;

        info!(post_id = %id, removed = ids.len(), "post deleted");
        Ok(ids)
    }

    async fn list_page(
        &self,
        sort: PostSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY {} LIMIT $1 OFFSET $2",
            sort.order_clause()
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("list_page", e))
    }

    async fn count(&self) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error("count", e))
    }

    async fn descendants_of(&self, ids: &[Uuid]) -> Result<Vec<Post>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Post>(&format!(
            r#"
            WITH RECURSIVE thread AS (
                SELECT {POST_COLUMNS} FROM posts WHERE parent_post_id = ANY($1)
                UNION ALL
                SELECT p.id, p.author_id, p.parent_post_id, p.username, p.email, p.text,
                       p.timestamp, p.image, p.text_file
                FROM posts p JOIN thread t ON p.parent_post_id = t.id
            )
            SELECT {POST_COLUMNS} FROM thread
            "#
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("descendants_of", e))
    }

    async fn list_filtered(&self, filter: &PostFilter) -> Result<Vec<Post>, DomainError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE TRUE"));

        if let Some(search) = &filter.search {
            builder
                .push(" AND text ILIKE ")
                .push_bind(contains_pattern(search))
                .push(r" ESCAPE '\'");
        }
        if let Some(author) = &filter.author {
            builder
                .push(" AND username ILIKE ")
                .push_bind(contains_pattern(author))
                .push(r" ESCAPE '\'");
        }
        if let Some(parent_post_id) = filter.parent_post_id {
            builder
                .push(" AND parent_post_id = ")
                .push_bind(parent_post_id);
        }
        builder.push(" ORDER BY timestamp DESC");

        builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_read_error("list_filtered", e))
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY timestamp DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("list_by_author", e))
    }

    async fn replies_to(&self, parent_id: Uuid) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE parent_post_id = $1 ORDER BY timestamp ASC"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("replies_to", e))
    }

    async fn search_text(&self, query: &str) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS} FROM posts
            WHERE text ILIKE $1 ESCAPE '\' OR username ILIKE $1 ESCAPE '\'
            ORDER BY timestamp DESC
            "#
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("search_text", e))
    }

    async fn list_all(&self) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY timestamp ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("list_all", e))
    }
}
