//! GraphQL surface at `/graphql`, mirroring the REST operations.

pub mod post;
pub mod search;
pub mod types;
pub mod user;

use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use async_graphql::{
    Context, EmptySubscription, ErrorExtensions, MergedObject, Result as GraphQLResult, Schema,
};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::application::{
    auth_service::AuthService, post_service::PostService, search_service::SearchService,
    user_service::UserService,
};
use crate::domain::{error::DomainError, user::User};
use crate::presentation::utils::AuthenticatedUser;

#[derive(MergedObject, Default)]
pub struct QueryRoot(user::UserQuery, post::PostQuery, search::SearchQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(user::UserMutation, post::PostMutation);

pub type ForumSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(
    auth: &AuthService,
    users: &UserService,
    posts: &PostService,
    search: &SearchService,
) -> ForumSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(auth.clone())
    .data(users.clone())
    .data(posts.clone())
    .data(search.clone())
    .finish()
}

/// Errors carry the same `code` as the REST error body.
impl ErrorExtensions for DomainError {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            DomainError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code))
    }
}

pub(crate) fn gql(err: DomainError) -> async_graphql::Error {
    err.extend()
}

pub(crate) fn current_user<'a>(ctx: &'a Context<'_>) -> GraphQLResult<&'a User> {
    ctx.data_opt::<AuthenticatedUser>()
        .map(|user| &user.0)
        .ok_or_else(|| gql(DomainError::Unauthorized))
}

pub async fn graphql_handler(
    schema: web::Data<ForumSchema>,
    http: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    let user = http.extensions().get::<AuthenticatedUser>().cloned();
    if let Some(user) = user {
        request = request.data(user);
    }
    schema.execute(request).await.into()
}

pub async fn schema_handler(schema: web::Data<ForumSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}
