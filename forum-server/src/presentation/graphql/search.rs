use async_graphql::{Context, Object, Result as GraphQLResult};
use chrono::NaiveDate;
use uuid::Uuid;

use super::gql;
use super::types::{SearchResultType, StatisticsType};
use crate::application::search_service::SearchService;
use crate::infrastructure::search::SearchFilters;

#[derive(Default)]
pub struct SearchQuery;

#[Object]
impl SearchQuery {
    /// Full-text search over the index. When the engine is unavailable the
    /// result is empty and `error` is set.
    #[allow(clippy::too_many_arguments)]
    async fn elasticsearch_search(
        &self,
        ctx: &Context<'_>,
        query: Option<String>,
        username: Option<String>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        parent_post_id: Option<Uuid>,
        size: Option<i64>,
        from: Option<i64>,
    ) -> GraphQLResult<SearchResultType> {
        let search = ctx.data::<SearchService>()?;
        let filters = SearchFilters {
            username,
            date_from,
            date_to,
            parent_post_id,
        };
        let results = search
            .search(query.as_deref(), filters, size, from)
            .await
            .map_err(gql)?;
        Ok(results.into())
    }

    async fn search_suggestions(
        &self,
        ctx: &Context<'_>,
        query: String,
        size: Option<i64>,
    ) -> GraphQLResult<Vec<String>> {
        let search = ctx.data::<SearchService>()?;
        search.suggest(&query, size).await.map_err(gql)
    }

    async fn search_statistics(&self, ctx: &Context<'_>) -> GraphQLResult<StatisticsType> {
        let search = ctx.data::<SearchService>()?;
        Ok(search.statistics().await.into())
    }
}
