//! Query execution.
//!
//! The planner never touches the database; this module renders a
//! [`QueryPlan`] and runs it. [`QueryExecutor`] is the seam for tests
//! and alternative backends; [`MySqlExecutor`] is the real one.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::debug;

use crate::config::SearchSettings;
use crate::error::EngineResult;
use crate::query::{ListingHit, QueryAssembler, QueryPlan, SearchParameters, SearchResults};

/// Runs rendered plans against a backend.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Total rows matching the plan's filters.
    async fn count(&self, plan: &QueryPlan) -> EngineResult<u64>;

    /// One page of matching rows.
    async fn fetch(&self, plan: &QueryPlan) -> EngineResult<Vec<ListingHit>>;
}

/// Executor backed by a MySQL connection pool.
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connect using the configured database URL and pool size.
    pub async fn connect(settings: &SearchSettings) -> EngineResult<Self> {
        let url = settings
            .database_url
            .as_deref()
            .context("DATABASE_URL is not set")?;
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn count(&self, plan: &QueryPlan) -> EngineResult<u64> {
        let sql = plan.to_count_sql();
        debug!(table = %plan.table, "counting listings");
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch(&self, plan: &QueryPlan) -> EngineResult<Vec<ListingHit>> {
        let sql = plan.to_sql();
        debug!(table = %plan.table, limit = plan.limit, offset = plan.offset, "fetching listings");
        let hits = sqlx::query_as::<_, ListingHit>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(hits)
    }
}

/// End-to-end listing search: assemble, count, fetch, post-process.
pub struct ListingSearchService<E> {
    assembler: QueryAssembler,
    executor: E,
}

impl<E: QueryExecutor> ListingSearchService<E> {
    pub fn new(assembler: QueryAssembler, executor: E) -> Self {
        Self {
            assembler,
            executor,
        }
    }

    pub fn assembler(&self) -> &QueryAssembler {
        &self.assembler
    }

    /// Run one search and return a page of results. The fetch is
    /// skipped entirely when nothing matches.
    pub async fn search(
        &self,
        listing_type: &str,
        params: &SearchParameters,
    ) -> EngineResult<SearchResults> {
        let plan = self.assembler.assemble(listing_type, params)?;

        let total = self.executor.count(&plan).await?;
        let mut hits = if total == 0 {
            Vec::new()
        } else {
            self.executor.fetch(&plan).await?
        };

        let settings = self.assembler.settings();
        for hit in &mut hits {
            hit.distance_display = hit.distance.map(|d| settings.render_distance(d));
        }

        let per_page = params.per_page.max(1);
        let total_pages =
            u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX);

        debug!(
            listing_type,
            total,
            returned = hits.len(),
            "listing search complete"
        );

        Ok(SearchResults {
            hits,
            total,
            page: params.page.max(1),
            per_page,
            total_pages,
        })
    }
}
