use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{error::DomainError, post::Post, validation::validate_search_query};
use crate::infrastructure::events::{EventNotifier, SearchQueryEvent};
use crate::infrastructure::search::{
    DEFAULT_SUGGESTIONS, PostDocument, SearchError, SearchFilters, SearchIndex, SearchRequest,
    SearchResults, SearchStatistics,
};

/// Keeps the search index in step with the post store and runs queries.
/// Index failures are logged here and never reach the caller of a write.
#[derive(Clone)]
pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    notifier: EventNotifier,
}

impl SearchService {
    pub fn new(index: Arc<dyn SearchIndex>, notifier: EventNotifier) -> Self {
        Self { index, notifier }
    }

    pub async fn index_post(&self, post: &Post) {
        if let Err(err) = self.index.index_post(&PostDocument::from(post)).await {
            warn!(post_id = %post.id, error = %err, "failed to index post");
        }
    }

    pub async fn remove_posts(&self, ids: &[Uuid]) {
        for id in ids {
            if let Err(err) = self.index.remove_post(*id).await {
                warn!(post_id = %id, error = %err, "failed to remove post from index");
            }
        }
    }

    /// A blank query lists everything; a one-character query is rejected.
    /// Engine failures come back as empty results carrying `error`.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: Option<&str>,
        filters: SearchFilters,
        size: Option<i64>,
        from: Option<i64>,
    ) -> Result<SearchResults, DomainError> {
        let query = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Some(validate_search_query(q)?),
            None => None,
        };
        let request = SearchRequest::new(query, filters, size, from);

        let results = match self.index.search(&request).await {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "search failed");
                return Ok(SearchResults::failed(&request, err.to_string()));
            }
        };

        self.notifier
            .search_performed(SearchQueryEvent::new(
                request.query.clone(),
                request.filters.clone(),
                results.hits.len() as u64,
            ))
            .await;

        Ok(results)
    }

    pub async fn suggest(&self, prefix: &str, size: Option<i64>) -> Result<Vec<String>, DomainError> {
        let prefix = validate_search_query(prefix)?;
        let size = size.unwrap_or(DEFAULT_SUGGESTIONS).clamp(1, 20);

        match self.index.suggest(&prefix, size).await {
            Ok(suggestions) => Ok(suggestions),
            Err(err) => {
                warn!(error = %err, "suggest failed");
                Ok(Vec::new())
            }
        }
    }

    pub async fn statistics(&self) -> SearchStatistics {
        self.index.statistics().await.unwrap_or_else(|err| {
            warn!(error = %err, "statistics query failed");
            SearchStatistics::default()
        })
    }

    pub async fn create_index(&self) -> Result<(), SearchError> {
        self.index.ensure_index().await
    }

    pub async fn delete_index(&self) -> Result<(), SearchError> {
        self.index.delete_index().await
    }

    /// Indexes every given post, stopping at the first failure.
    pub async fn index_all(&self, posts: &[Post]) -> Result<usize, SearchError> {
        for post in posts {
            self.index.index_post(&PostDocument::from(post)).await?;
        }
        info!(count = posts.len(), "posts indexed");
        Ok(posts.len())
    }
}
