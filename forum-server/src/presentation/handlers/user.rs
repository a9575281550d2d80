use actix_web::{HttpRequest, HttpResponse, Scope, delete, get, put, web};
use tracing::info;
use uuid::Uuid;

use crate::application::user_service::UserService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{ListUsersQuery, UpdateUserRequest};
use crate::presentation::utils::{AuthenticatedUser, request_id};

pub fn scope() -> Scope {
    // `/me` and `/by-username` before `/{id}`
    web::scope("/users")
        .service(me)
        .service(update_me)
        .service(user_by_username)
        .service(list_users)
        .service(get_user)
        .service(delete_user)
}

#[get("")]
async fn list_users(
    users: web::Data<UserService>,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse, DomainError> {
    let found = users
        .list_users(query.search.as_deref(), query.first, query.skip)
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

#[get("/me")]
async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user.0)
}

#[put("/me")]
async fn update_me(
    req: HttpRequest,
    user: AuthenticatedUser,
    users: web::Data<UserService>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, DomainError> {
    let updated = users
        .update_user(&user, user.id, payload.into_inner().into())
        .await?;

    info!(request_id = %request_id(&req), username = %updated.username, "profile updated");

    Ok(HttpResponse::Ok().json(updated))
}

#[get("/by-username/{username}")]
async fn user_by_username(
    users: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let user = users.user_by_username(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[get("/{id}")]
async fn get_user(
    users: web::Data<UserService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let user = users.get_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/{id}")]
async fn delete_user(
    req: HttpRequest,
    user: AuthenticatedUser,
    users: web::Data<UserService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let user_id = path.into_inner();
    users.delete_user(&user, user_id).await?;

    info!(
        request_id = %request_id(&req),
        username = %user.username,
        deleted_user_id = %user_id,
        "user deleted"
    );

    Ok(HttpResponse::NoContent().finish())
}
