use actix_web::{HttpRequest, HttpResponse, Responder, Scope, post, web};
use serde_json::json;
use tracing::info;

use crate::application::auth_service::AuthService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::presentation::utils::{AuthenticatedUser, request_id};

pub fn scope() -> Scope {
    web::scope("/auth")
        .service(register)
        .service(login)
        .service(logout)
}

#[post("/register")]
async fn register(
    req: HttpRequest,
    service: web::Data<AuthService>,
    payload: web::Json<RegisterRequest>,
) -> Result<impl Responder, DomainError> {
    let payload = payload.into_inner();
    let password = payload.password.clone();
    let user = service.register(payload.into()).await?;

    let (token, user) = service.login(&user.username, &password).await?;

    info!(request_id = %request_id(&req), username = %user.username, "user registered");

    Ok(HttpResponse::Created().json(AuthResponse {
        access_token: token,
        expires_in: service.keys().ttl_seconds(),
        token_type: "Bearer".to_string(),
        user,
    }))
}

#[post("/login")]
async fn login(
    req: HttpRequest,
    service: web::Data<AuthService>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, DomainError> {
    let (token, user) = service.login(&payload.username, &payload.password).await?;

    info!(request_id = %request_id(&req), username = %user.username, "user logged in");

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: token,
        expires_in: service.keys().ttl_seconds(),
        token_type: "Bearer".to_string(),
        user,
    }))
}

/// Tokens are stateless; the client drops its copy.
#[post("/logout")]
async fn logout(req: HttpRequest, user: AuthenticatedUser) -> impl Responder {
    info!(request_id = %request_id(&req), username = %user.username, "user logged out");
    HttpResponse::Ok().json(json!({ "success": true }))
}
