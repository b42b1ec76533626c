//! Engine construction.
//!
//! Every engine is a fresh in-memory DuckDB database plus one working
//! connection, opened with the configured settings applied, and a private
//! scratch directory that ingested buffers are registered in.

use std::sync::Arc;

use duckdb::Connection;
use tracing::{info, instrument};

use crate::config::LoaderConfig;
use crate::engine::connection::EngineHandle;
use crate::error::LoaderError;
use crate::sql::quote_literal;

/// Builds initialized engine handles from configuration.
#[derive(Debug, Clone)]
pub struct EngineFactory {
    config: Arc<LoaderConfig>,
}

impl EngineFactory {
    pub fn new(config: Arc<LoaderConfig>) -> Self {
        Self { config }
    }

    /// Settings applied to the database before the working connection is handed out.
    pub fn init_sql(&self) -> String {
        let mut init_statements = Vec::new();
        if let Some(threads) = self.config.threads {
            init_statements.push(format!("SET threads = {threads};"));
        }
        if let Some(limit) = self.config.memory_limit.as_ref() {
            let trimmed = limit.trim();
            if !trimmed.is_empty() {
                init_statements.push(format!("SET memory_limit = {};", quote_literal(trimmed)));
            }
        }
        init_statements.join("\n")
    }

    /// Open a new engine. Blocking; run it off the async executor.
    #[instrument(skip(self))]
    pub fn open(&self) -> Result<EngineHandle, LoaderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hexlake-");
        let scratch = match self.config.scratch_dir.as_ref() {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|err| {
            LoaderError::initialization(format!("failed to create scratch directory: {err}"))
        })?;

        let instance = Connection::open_in_memory().map_err(LoaderError::initialization)?;
        let init_sql = self.init_sql();
        if !init_sql.is_empty() {
            info!("applying engine settings:\n{}", init_sql);
            instance
                .execute_batch(&init_sql)
                .map_err(LoaderError::initialization)?;
        }
        let conn = instance.try_clone().map_err(LoaderError::initialization)?;

        info!(scratch = %scratch.path().display(), "opened DuckDB engine");
        Ok(EngineHandle::new(instance, conn, scratch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_sql_is_empty_without_settings() {
        let factory = EngineFactory::new(Arc::new(LoaderConfig::default()));
        assert!(factory.init_sql().is_empty());
    }

    #[test]
    fn init_sql_applies_threads_and_memory_limit() {
        let factory = EngineFactory::new(Arc::new(LoaderConfig {
            threads: Some(2),
            memory_limit: Some(" 512MB ".to_string()),
            ..LoaderConfig::default()
        }));
        assert_eq!(
            factory.init_sql(),
            "SET threads = 2;\nSET memory_limit = '512MB';"
        );
    }

    #[test]
    fn open_fails_when_scratch_parent_is_missing() {
        let factory = EngineFactory::new(Arc::new(LoaderConfig {
            scratch_dir: Some("/nonexistent/hexlake/scratch".into()),
            ..LoaderConfig::default()
        }));
        let err = factory.open().err();
        assert!(matches!(err, Some(LoaderError::Initialization { .. })));
    }

    #[test]
    fn open_applies_settings() -> anyhow::Result<()> {
        let factory = EngineFactory::new(Arc::new(LoaderConfig {
            threads: Some(1),
            ..LoaderConfig::default()
        }));
        let handle = factory.open()?;
        let threads = handle.with_conn(|conn| {
            conn.query_row("SELECT current_setting('threads')", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(LoaderError::query)
        })?;
        assert_eq!(threads, 1);
        handle.release()?;
        Ok(())
    }
}
