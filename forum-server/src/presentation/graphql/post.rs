use async_graphql::{Context, Object, Result as GraphQLResult};
use uuid::Uuid;

use super::types::{self, DeletePostPayload, PostPayload, PostType, ThreadEntryType};
use super::{current_user, gql};
use crate::application::post_service::PostService;
use crate::domain::post::{PostChanges, PostDraft, PostFilter, PostSort};

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    /// Newest first; filters are case-insensitive substring matches.
    async fn all_posts(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        author: Option<String>,
        parent_post_id: Option<Uuid>,
    ) -> GraphQLResult<Vec<PostType>> {
        let posts = ctx.data::<PostService>()?;
        let filter = PostFilter {
            search,
            author,
            parent_post_id,
        };
        Ok(types::posts(posts.filter_posts(&filter).await.map_err(gql)?))
    }

    async fn post(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<PostType> {
        let posts = ctx.data::<PostService>()?;
        Ok(posts.get_post(id).await.map_err(gql)?.into())
    }

    async fn user_posts(&self, ctx: &Context<'_>, user_id: Uuid) -> GraphQLResult<Vec<PostType>> {
        let posts = ctx.data::<PostService>()?;
        Ok(types::posts(posts.user_posts(user_id).await.map_err(gql)?))
    }

    async fn post_comments(
        &self,
        ctx: &Context<'_>,
        post_id: Uuid,
    ) -> GraphQLResult<Vec<PostType>> {
        let posts = ctx.data::<PostService>()?;
        Ok(types::posts(posts.post_comments(post_id).await.map_err(gql)?))
    }

    async fn post_threads(
        &self,
        ctx: &Context<'_>,
        sort_by: Option<String>,
        order: Option<String>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> GraphQLResult<Vec<ThreadEntryType>> {
        let posts = ctx.data::<PostService>()?;
        let sort = PostSort::from_query(sort_by.as_deref(), order.as_deref());
        let threads = posts
            .list_threads(sort, page, page_size)
            .await
            .map_err(gql)?;
        Ok(threads.items.into_iter().map(ThreadEntryType::from).collect())
    }

    /// Database substring search over text and username.
    async fn search_posts(&self, ctx: &Context<'_>, query: String) -> GraphQLResult<Vec<PostType>> {
        let posts = ctx.data::<PostService>()?;
        Ok(types::posts(posts.search_posts(&query).await.map_err(gql)?))
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    async fn create_post(
        &self,
        ctx: &Context<'_>,
        text: String,
        parent_post_id: Option<Uuid>,
    ) -> GraphQLResult<PostPayload> {
        let user = current_user(ctx)?;
        let posts = ctx.data::<PostService>()?;

        let post = posts
            .create_post(
                user,
                PostDraft {
                    text,
                    parent_post_id,
                },
            )
            .await
            .map_err(gql)?;

        Ok(PostPayload {
            post: post.into(),
            success: true,
        })
    }

    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: Uuid,
        text: Option<String>,
        parent_post_id: Option<Uuid>,
    ) -> GraphQLResult<PostPayload> {
        let user = current_user(ctx)?;
        let posts = ctx.data::<PostService>()?;

        let post = posts
            .update_post(
                user,
                id,
                PostChanges {
                    text,
                    parent_post_id,
                },
            )
            .await
            .map_err(gql)?;

        Ok(PostPayload {
            post: post.into(),
            success: true,
        })
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<DeletePostPayload> {
        let user = current_user(ctx)?;
        let posts = ctx.data::<PostService>()?;
        let deleted_ids = posts.delete_post(user, id).await.map_err(gql)?;

        Ok(DeletePostPayload {
            deleted_ids,
            success: true,
        })
    }
}
