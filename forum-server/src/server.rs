use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::application::{
    auth_service::AuthService, post_service::PostService, search_service::SearchService,
    user_service::UserService,
};
use crate::domain::error::DomainError;
use crate::infrastructure::config::AppConfig;
use crate::presentation::graphql::{self, ForumSchema};
use crate::presentation::handlers;
use crate::presentation::middleware::{IdentityMiddleware, RequestIdMiddleware, TimingMiddleware};

/// Everything the HTTP surfaces need, cloned into each worker.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub users: UserService,
    pub posts: PostService,
    pub search: SearchService,
    pub schema: ForumSchema,
}

impl AppState {
    pub fn new(
        auth: AuthService,
        users: UserService,
        posts: PostService,
        search: SearchService,
    ) -> Self {
        let schema = graphql::build_schema(&auth, &users, &posts, &search);
        Self {
            auth,
            users,
            posts,
            search,
            schema,
        }
    }
}

/// Routes and shared data; used by the server and by the integration tests.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state.auth))
            .app_data(web::Data::new(state.users))
            .app_data(web::Data::new(state.posts))
            .app_data(web::Data::new(state.search))
            .app_data(web::Data::new(state.schema))
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                DomainError::validation(format!("invalid JSON body: {err}")).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                DomainError::validation(format!("invalid query string: {err}")).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _| {
                DomainError::validation(format!("invalid path: {err}")).into()
            }))
            .service(
                web::scope("/api")
                    .wrap(IdentityMiddleware)
                    .route("/health", web::get().to(health))
                    .service(handlers::auth::scope())
                    .service(handlers::post::list_threads)
                    .service(handlers::post::list_posts)
                    .service(handlers::post::post_comments)
                    .service(handlers::post::get_post)
                    .service(handlers::post::create_post)
                    .service(handlers::post::upload_attachments)
                    .service(handlers::post::update_post)
                    .service(handlers::post::delete_post)
                    .service(handlers::search::scope())
                    .service(handlers::user::scope()),
            )
            .service(
                web::scope("/graphql")
                    .wrap(IdentityMiddleware)
                    .route("", web::post().to(graphql::graphql_handler))
                    .route("/schema", web::get().to(graphql::schema_handler)),
            );
    }
}

pub async fn run_server(config: AppConfig, state: AppState) -> std::io::Result<()> {
    let bind_address = (config.host.clone(), config.port);
    info!(host = %bind_address.0, port = bind_address.1, "HTTP server starting");

    HttpServer::new(move || {
        let cors = build_cors(&config);

        App::new()
            .wrap(Logger::default())
            .wrap(RequestIdMiddleware)
            .wrap(TimingMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .configure(configure(state.clone()))
    })
    .bind(bind_address)?
    .run()
    .await
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .max_age(3600);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_any_origin();
    } else {
        cors = cors.supports_credentials();
        for origin in &config.cors_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}
