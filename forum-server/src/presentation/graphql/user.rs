use async_graphql::{Context, Object, Result as GraphQLResult};
use tracing::info;
use uuid::Uuid;

use super::types::{self, LoginPayload, SuccessPayload, UserPayload, UserType};
use super::{current_user, gql};
use crate::application::{auth_service::AuthService, user_service::UserService};
use crate::domain::user::{NewUser, UserChanges};
use crate::presentation::utils::AuthenticatedUser;

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    async fn all_users(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        first: Option<i64>,
        skip: Option<i64>,
    ) -> GraphQLResult<Vec<UserType>> {
        let users = ctx.data::<UserService>()?;
        let found = users
            .list_users(search.as_deref(), first, skip)
            .await
            .map_err(gql)?;
        Ok(types::users(found))
    }

    async fn user(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<UserType> {
        let users = ctx.data::<UserService>()?;
        Ok(users.get_user(id).await.map_err(gql)?.into())
    }

    async fn user_by_username(
        &self,
        ctx: &Context<'_>,
        username: String,
    ) -> GraphQLResult<UserType> {
        let users = ctx.data::<UserService>()?;
        Ok(users.user_by_username(&username).await.map_err(gql)?.into())
    }

    async fn search_users(&self, ctx: &Context<'_>, query: String) -> GraphQLResult<Vec<UserType>> {
        let users = ctx.data::<UserService>()?;
        Ok(types::users(users.search_users(&query).await.map_err(gql)?))
    }

    /// `null` for anonymous callers.
    async fn me(&self, ctx: &Context<'_>) -> Option<UserType> {
        ctx.data_opt::<AuthenticatedUser>()
            .map(|user| user.0.clone().into())
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        email: String,
        password: String,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> GraphQLResult<UserPayload> {
        let auth = ctx.data::<AuthService>()?;
        let user = auth
            .register(NewUser {
                username,
                email,
                password,
                first_name,
                last_name,
            })
            .await
            .map_err(gql)?;

        Ok(UserPayload {
            user: user.into(),
            success: true,
        })
    }

    /// Updates the caller's profile, or another user's when `id` is given by staff.
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: Option<Uuid>,
        username: Option<String>,
        email: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> GraphQLResult<UserPayload> {
        let actor = current_user(ctx)?;
        let users = ctx.data::<UserService>()?;

        let user = users
            .update_user(
                actor,
                id.unwrap_or(actor.id),
                UserChanges {
                    username,
                    email,
                    first_name,
                    last_name,
                },
            )
            .await
            .map_err(gql)?;

        Ok(UserPayload {
            user: user.into(),
            success: true,
        })
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<SuccessPayload> {
        let actor = current_user(ctx)?;
        let users = ctx.data::<UserService>()?;
        users.delete_user(actor, id).await.map_err(gql)?;
        Ok(SuccessPayload { success: true })
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> GraphQLResult<LoginPayload> {
        let auth = ctx.data::<AuthService>()?;
        let (token, user) = auth.login(&username, &password).await.map_err(gql)?;

        Ok(LoginPayload {
            token,
            user: user.into(),
            success: true,
        })
    }

    async fn logout(&self, ctx: &Context<'_>) -> GraphQLResult<SuccessPayload> {
        let user = current_user(ctx)?;
        info!(username = %user.username, "user logged out");
        Ok(SuccessPayload { success: true })
    }
}
