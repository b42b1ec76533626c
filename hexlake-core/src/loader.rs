//! Dataset loader: ingestion, queries and lifecycle behind one owned handle.
//!
//! A `Loader` is constructed explicitly and passed to whatever needs it.
//! Clones share the same engine.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, instrument};

use crate::config::LoaderConfig;
use crate::engine::{EngineFactory, Lifecycle, LifecycleState, QueryResult};
use crate::error::LoaderError;
use crate::fetch::{Fetcher, SourceFetcher};
use crate::source::SourceFormat;
use crate::sql::{
    count_statement, select_all_statement, select_year_statement, validate_relation_name,
};
use crate::types::{rows_from_batches, Row};

#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    config: Arc<LoaderConfig>,
    lifecycle: Lifecycle,
    fetcher: Arc<dyn Fetcher>,
}

impl Loader {
    /// Loader fetching over HTTP(S) or from local paths.
    pub fn new(config: LoaderConfig) -> Result<Self, LoaderError> {
        let fetcher = SourceFetcher::new(config.http_timeout())?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: LoaderConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = Arc::new(config);
        let lifecycle = Lifecycle::new(EngineFactory::new(config.clone()));
        Self {
            inner: Arc::new(LoaderInner {
                config,
                lifecycle,
                fetcher,
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn default_relation(&self) -> &str {
        &self.inner.config.default_relation
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Like [`Loader::state`], but surfaces a poisoned lifecycle as `Internal`.
    pub fn try_state(&self) -> Result<LifecycleState, LoaderError> {
        self.inner.lifecycle.try_state()
    }

    /// Number of engine initializations started by this loader.
    pub fn initialization_attempts(&self) -> usize {
        self.inner.lifecycle.initialization_attempts()
    }

    /// Initialize the engine if it is not ready yet.
    pub async fn initialize(&self) -> Result<(), LoaderError> {
        self.inner.lifecycle.ensure_ready("initialize").await?;
        Ok(())
    }

    /// Materialize a Parquet buffer as `relation`, replacing it if present.
    pub async fn ingest(
        &self,
        bytes: impl Into<Bytes>,
        relation: &str,
    ) -> Result<u64, LoaderError> {
        self.ingest_with_format(bytes, relation, SourceFormat::Parquet)
            .await
    }

    /// Materialize a buffer of the given format as `relation`.
    #[instrument(skip(self, bytes), fields(relation = %relation, format = %format))]
    pub async fn ingest_with_format(
        &self,
        bytes: impl Into<Bytes>,
        relation: &str,
        format: SourceFormat,
    ) -> Result<u64, LoaderError> {
        validate_relation_name(relation)?;
        let bytes: Bytes = bytes.into();
        let handle = self.inner.lifecycle.ensure_ready("ingest").await?;
        let relation = relation.to_string();
        tokio::task::spawn_blocking(move || handle.ingest(&bytes, &relation, format))
            .await
            .map_err(|err| LoaderError::internal(format!("ingest task failed: {err}")))?
    }

    /// Fetch `url` and materialize it as `relation`, inferring the format
    /// from the URL's extension.
    pub async fn load_url(&self, url: &str, relation: &str) -> Result<u64, LoaderError> {
        self.load_url_with_format(url, relation, SourceFormat::infer(url))
            .await
    }

    /// Fetch `url` and materialize it as `relation`.
    ///
    /// The fetch happens before the engine is touched, so a fetch failure
    /// leaves the lifecycle state unchanged.
    #[instrument(skip(self), fields(url = %url, relation = %relation, format = %format))]
    pub async fn load_url_with_format(
        &self,
        url: &str,
        relation: &str,
        format: SourceFormat,
    ) -> Result<u64, LoaderError> {
        validate_relation_name(relation)?;
        let bytes = self.inner.fetcher.fetch(url).await?;
        info!(
            size_mb = %format!("{:.2}", bytes.len() as f64 / 1024.0 / 1024.0),
            "fetched source"
        );
        let rows = self.ingest_with_format(bytes, relation, format).await?;
        info!(rows, "loaded rows into relation");
        Ok(rows)
    }

    /// Run a read query. Requires a ready engine; never initializes one.
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>, LoaderError> {
        let result = self.query_batches(sql).await?;
        rows_from_batches(&result.batches)
    }

    /// Run a read query and keep the Arrow batches.
    #[instrument(skip(self), fields(sql = %sql))]
    pub async fn query_batches(&self, sql: &str) -> Result<QueryResult, LoaderError> {
        let handle = self.inner.lifecycle.ready_handle("query")?;
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || handle.execute_query(&sql))
            .await
            .map_err(|err| LoaderError::internal(format!("query task failed: {err}")))?
    }

    /// All rows of `relation` whose year column equals `year`.
    pub async fn rows_for_year(&self, year: i64, relation: &str) -> Result<Vec<Row>, LoaderError> {
        validate_relation_name(relation)?;
        let sql = select_year_statement(relation, &self.inner.config.year_column, year);
        self.query(&sql).await
    }

    /// All rows of `relation`.
    pub async fn all_rows(&self, relation: &str) -> Result<Vec<Row>, LoaderError> {
        validate_relation_name(relation)?;
        self.query(&select_all_statement(relation)).await
    }

    /// Current row count of `relation`.
    pub async fn row_count(&self, relation: &str) -> Result<u64, LoaderError> {
        validate_relation_name(relation)?;
        let rows = self.query(&count_statement(relation)).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|value| value.as_i64())
            .ok_or_else(|| LoaderError::internal("count query returned no value"))?;
        u64::try_from(count).map_err(|_| LoaderError::internal(format!("negative row count {count}")))
    }

    /// Release the engine. Idempotent; the loader is unusable afterwards.
    pub async fn close(&self) -> Result<(), LoaderError> {
        self.inner.lifecycle.close().await
    }
}
