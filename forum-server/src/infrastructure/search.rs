//! Elasticsearch mirror of the post store.
//!
//! Documents carry the textual fields of a post only; attachments never reach
//! the index. Query bodies and response parsing are plain functions over
//! `serde_json::Value` so they can be checked without a running cluster.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use elasticsearch::{
    DeleteParts, Elasticsearch, IndexParts, SearchParts,
    http::response::Response,
    http::transport::{BuildError, SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::domain::post::Post;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_SUGGESTIONS: i64 = 5;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Elasticsearch returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDocument {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub parent_post_id: Option<Uuid>,
}

impl From<&Post> for PostDocument {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            username: post.username.clone(),
            email: post.email.clone(),
            text: post.text.clone(),
            timestamp: post.timestamp,
            parent_post_id: post.parent_post_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// `None` matches every document.
    pub query: Option<String>,
    pub filters: SearchFilters,
    pub size: i64,
    pub from: i64,
}

impl SearchRequest {
    pub fn new(
        query: Option<String>,
        filters: SearchFilters,
        size: Option<i64>,
        from: Option<i64>,
    ) -> Self {
        Self {
            query,
            filters,
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            from: from.unwrap_or(0).max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: PostDocument,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchAggregations {
    pub usernames: Vec<Bucket>,
    pub dates: Vec<Bucket>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total: u64,
    pub aggregations: SearchAggregations,
    pub query: Option<String>,
    pub filters: SearchFilters,
    /// Set when the search engine failed; hits are empty in that case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResults {
    pub fn failed(request: &SearchRequest, error: String) -> Self {
        Self {
            query: request.query.clone(),
            filters: request.filters.clone(),
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStatistics {
    pub total_posts: u64,
    pub unique_users: u64,
    pub posts_by_date: Vec<Bucket>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn ensure_index(&self) -> Result<(), SearchError>;
    async fn delete_index(&self) -> Result<(), SearchError>;
    /// Upsert keyed by post id; indexing the same post twice keeps one document.
    async fn index_post(&self, doc: &PostDocument) -> Result<(), SearchError>;
    async fn remove_post(&self, id: Uuid) -> Result<(), SearchError>;
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError>;
    async fn suggest(&self, prefix: &str, size: i64) -> Result<Vec<String>, SearchError>;
    async fn statistics(&self) -> Result<SearchStatistics, SearchError>;
}

#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: Elasticsearch,
    index: String,
}

impl ElasticsearchIndex {
    pub fn new(url: &str, index: &str) -> Result<Self, SearchError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            index: index.to_string(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    async fn json_or_status(response: Response) -> Result<Value, SearchError> {
        let status = response.status_code();
        if status.is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            Err(SearchError::Status {
                status: status.as_u16(),
                body: response.text().await?,
            })
        }
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(index_definition())
            .send()
            .await?;
        Self::json_or_status(response).await?;

        info!(index = %self.index, "search index created");
        Ok(())
    }

    async fn delete_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        // deleting a missing index is a no-op
        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        Self::json_or_status(response).await?;

        info!(index = %self.index, "search index deleted");
        Ok(())
    }

    async fn index_post(&self, doc: &PostDocument) -> Result<(), SearchError> {
        let id = doc.id.to_string();
        let response = self
            .client
            .index(IndexParts::IndexId(&self.index, &id))
            .body(doc)
            .send()
            .await?;
        Self::json_or_status(response).await?;

        debug!(post_id = %doc.id, "post indexed");
        Ok(())
    }

    async fn remove_post(&self, id: Uuid) -> Result<(), SearchError> {
        let doc_id = id.to_string();
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index, &doc_id))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            debug!(post_id = %id, "post was not indexed");
            return Ok(());
        }
        Self::json_or_status(response).await?;

        debug!(post_id = %id, "post removed from index");
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(build_search_body(request))
            .send()
            .await?;
        let body = Self::json_or_status(response).await?;

        let mut results = parse_search_response(body)?;
        results.query = request.query.clone();
        results.filters = request.filters.clone();
        Ok(results)
    }

    async fn suggest(&self, prefix: &str, size: i64) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(build_suggest_body(prefix, size))
            .send()
            .await?;
        let body = Self::json_or_status(response).await?;

        Ok(parse_suggestions(&body, size))
    }

    async fn statistics(&self) -> Result<SearchStatistics, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(build_statistics_body())
            .send()
            .await?;
        let body = Self::json_or_status(response).await?;

        parse_statistics(&body)
    }
}

pub fn index_definition() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "username": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "email": {
                    "type": "text",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "text": { "type": "text" },
                "timestamp": { "type": "date" },
                "parent_post_id": { "type": "keyword" }
            }
        }
    })
}

pub fn build_search_body(request: &SearchRequest) -> Value {
    let must = match request.query.as_deref() {
        Some(query) => json!([{
            "multi_match": {
                "query": query,
                "fields": ["text^3", "username^2", "email"],
                "fuzziness": "AUTO"
            }
        }]),
        None => json!([{ "match_all": {} }]),
    };

    let filters = &request.filters;
    let mut filter = Vec::new();
    if let Some(username) = &filters.username {
        filter.push(json!({ "term": { "username.keyword": username } }));
    }

    let mut range = Map::new();
    if let Some(date_from) = filters.date_from {
        range.insert("gte".into(), json!(date_from.format("%Y-%m-%d").to_string()));
    }
    if let Some(date_to) = filters.date_to {
        // round up so the whole last day is included
        range.insert(
            "lte".into(),
            json!(format!("{}||/d", date_to.format("%Y-%m-%d"))),
        );
    }
    if !range.is_empty() {
        filter.push(json!({ "range": { "timestamp": range } }));
    }

    if let Some(parent_post_id) = filters.parent_post_id {
        filter.push(json!({ "term": { "parent_post_id": parent_post_id.to_string() } }));
    }

    json!({
        "from": request.from,
        "size": request.size,
        "track_total_hits": true,
        "query": {
            "bool": {
                "must": must,
                "filter": filter
            }
        },
        "aggs": {
            "usernames": {
                "terms": { "field": "username.keyword", "size": 10 }
            },
            "dates": {
                "date_histogram": {
                    "field": "timestamp",
                    "calendar_interval": "day",
                    "format": "yyyy-MM-dd"
                }
            }
        }
    })
}

pub fn build_suggest_body(prefix: &str, size: i64) -> Value {
    // over-fetch, duplicates are dropped client side
    let fetch = (size.max(1) * 3).min(50);
    json!({
        "size": fetch,
        "_source": ["text"],
        "query": {
            "match_phrase_prefix": {
                "text": { "query": prefix }
            }
        }
    })
}

pub fn build_statistics_body() -> Value {
    json!({
        "size": 0,
        "aggs": {
            "total_posts": { "value_count": { "field": "id" } },
            "unique_users": { "cardinality": { "field": "username.keyword" } },
            "posts_by_date": {
                "date_histogram": {
                    "field": "timestamp",
                    "calendar_interval": "day",
                    "format": "yyyy-MM-dd"
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
    #[serde(default)]
    aggregations: Option<RawAggregations>,
}

#[derive(Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawTotal {
    value: u64,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: PostDocument,
}

#[derive(Deserialize)]
struct RawAggregations {
    usernames: Option<RawBuckets>,
    dates: Option<RawBuckets>,
}

#[derive(Deserialize)]
struct RawBuckets {
    buckets: Vec<RawBucket>,
}

#[derive(Deserialize)]
struct RawBucket {
    key: Value,
    key_as_string: Option<String>,
    doc_count: u64,
}

impl From<RawBucket> for Bucket {
    fn from(raw: RawBucket) -> Self {
        let key = match (raw.key_as_string, raw.key) {
            (Some(formatted), _) => formatted,
            (None, Value::String(key)) => key,
            (None, other) => other.to_string(),
        };
        Bucket {
            key,
            doc_count: raw.doc_count,
        }
    }
}

fn into_buckets(raw: Option<RawBuckets>) -> Vec<Bucket> {
    raw.map(|b| b.buckets.into_iter().map(Bucket::from).collect())
        .unwrap_or_default()
}

pub fn parse_search_response(body: Value) -> Result<SearchResults, SearchError> {
    let raw: RawSearchResponse = serde_json::from_value(body)?;

    let total = raw
        .hits
        .total
        .map(|t| t.value)
        .unwrap_or(raw.hits.hits.len() as u64);
    let hits = raw
        .hits
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            document: hit.source,
            score: hit.score,
        })
        .collect();
    let aggregations = raw
        .aggregations
        .map(|aggs| SearchAggregations {
            usernames: into_buckets(aggs.usernames),
            dates: into_buckets(aggs.dates),
        })
        .unwrap_or_default();

    Ok(SearchResults {
        hits,
        total,
        aggregations,
        ..SearchResults::default()
    })
}

pub fn parse_suggestions(body: &Value, size: i64) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();
    let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();

    for hit in hits {
        let Some(text) = hit["_source"]["text"].as_str() else {
            continue;
        };
        if !suggestions.iter().any(|s| s == text) {
            suggestions.push(text.to_string());
        }
        if suggestions.len() as i64 >= size {
            break;
        }
    }
    suggestions
}

pub fn parse_statistics(body: &Value) -> Result<SearchStatistics, SearchError> {
    let aggs = &body["aggregations"];
    let posts_by_date: Option<RawBuckets> =
        serde_json::from_value(aggs["posts_by_date"].clone()).ok();

    Ok(SearchStatistics {
        total_posts: aggs["total_posts"]["value"].as_f64().unwrap_or(0.0) as u64,
        unique_users: aggs["unique_users"]["value"].as_f64().unwrap_or(0.0) as u64,
        posts_by_date: into_buckets(posts_by_date),
    })
}
