use actix_web::{HttpResponse, Scope, get, web};

use crate::application::search_service::SearchService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{SearchQuery, SuggestQuery, SuggestResponse};

pub fn scope() -> Scope {
    web::scope("/search")
        .service(search)
        .service(suggest)
        .service(stats)
}

/// Engine failures still answer 200 with an `error` field and no hits.
#[get("")]
async fn search(
    service: web::Data<SearchService>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, DomainError> {
    let results = service
        .search(query.q.as_deref(), query.filters(), query.size, query.from)
        .await?;
    Ok(HttpResponse::Ok().json(results))
}

#[get("/suggest")]
async fn suggest(
    service: web::Data<SearchService>,
    query: web::Query<SuggestQuery>,
) -> Result<HttpResponse, DomainError> {
    let suggestions = service.suggest(&query.q, query.size).await?;
    Ok(HttpResponse::Ok().json(SuggestResponse {
        query: query.q.trim().to_string(),
        suggestions,
    }))
}

#[get("/stats")]
async fn stats(service: web::Data<SearchService>) -> HttpResponse {
    HttpResponse::Ok().json(service.statistics().await)
}
