//! DuckDB engine handle with query execution and ingestion.
//!
//! The handle owns the database instance, its single working connection and
//! the scratch directory buffers are registered in. All access goes through
//! one mutex, so statements on a handle never interleave.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use duckdb::arrow::datatypes::Schema;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::Connection;
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::error::LoaderError;
use crate::source::SourceFormat;
use crate::sql::{count_statement, materialize_statement};

/// Result of a query execution
pub struct QueryResult {
    pub schema: Schema,
    pub batches: Vec<RecordBatch>,
    pub total_rows: usize,
    pub total_bytes: usize,
}

struct OpenEngine {
    /// Connection that owns the database instance.
    instance: Connection,
    /// Connection statements run on.
    conn: Connection,
    scratch: TempDir,
}

/// An initialized engine. Becomes inert once [`EngineHandle::release`] runs.
pub struct EngineHandle {
    inner: Mutex<Option<OpenEngine>>,
    scratch_path: PathBuf,
}

impl EngineHandle {
    pub(crate) fn new(instance: Connection, conn: Connection, scratch: TempDir) -> Self {
        let scratch_path = scratch.path().to_path_buf();
        Self {
            inner: Mutex::new(Some(OpenEngine {
                instance,
                conn,
                scratch,
            })),
            scratch_path,
        }
    }

    pub fn scratch_path(&self) -> &Path {
        &self.scratch_path
    }

    fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut OpenEngine) -> Result<T, LoaderError>,
    ) -> Result<T, LoaderError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| LoaderError::internal("engine mutex poisoned"))?;
        match guard.as_mut() {
            Some(engine) => f(engine),
            None => Err(LoaderError::Closed),
        }
    }

    /// Run `f` against the working connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, LoaderError>,
    ) -> Result<T, LoaderError> {
        self.with_engine(|engine| f(&mut engine.conn))
    }

    /// Execute a read query and collect its Arrow batches.
    #[instrument(skip(self), fields(sql = %sql))]
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult, LoaderError> {
        if sql.contains('\0') {
            return Err(LoaderError::query("SQL contains null bytes"));
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(LoaderError::query)?;
            let arrow = stmt.query_arrow([]).map_err(LoaderError::query)?;
            let schema = arrow.get_schema();

            let mut total_rows = 0usize;
            let mut total_bytes = 0usize;
            let batches: Vec<RecordBatch> = arrow
                .inspect(|batch| {
                    total_rows += batch.num_rows();
                    total_bytes += batch.get_array_memory_size();
                })
                .collect();

            debug!(
                batch_count = batches.len(),
                total_rows, total_bytes, "executed query"
            );
            Ok(QueryResult {
                schema: schema.as_ref().clone(),
                batches,
                total_rows,
                total_bytes,
            })
        })
    }

    /// Register `bytes` under the format's fixed buffer name and replace
    /// `relation` with its contents, returning the materialized row count.
    ///
    /// Replacement and count share one transaction; on failure the previous
    /// relation (if any) is left as it was.
    #[instrument(skip(self, bytes), fields(relation = %relation, format = %format, bytes = bytes.len()))]
    pub fn ingest(
        &self,
        bytes: &[u8],
        relation: &str,
        format: SourceFormat,
    ) -> Result<u64, LoaderError> {
        self.with_engine(|engine| {
            let buffer = engine.scratch.path().join(format.buffer_name());
            fs::write(&buffer, bytes).map_err(|err| {
                LoaderError::internal(format!(
                    "failed to register buffer {}: {err}",
                    buffer.display()
                ))
            })?;
            debug!(buffer = %buffer.display(), "registered buffer");

            let format_err = |err: duckdb::Error| LoaderError::Format {
                operation: "ingest",
                format: format.as_str(),
                message: err.to_string(),
            };

            let tx = engine.conn.transaction().map_err(LoaderError::query)?;
            tx.execute_batch(&materialize_statement(relation, &buffer, format))
                .map_err(format_err)?;
            let count: i64 = tx
                .query_row(&count_statement(relation), [], |row| row.get(0))
                .map_err(LoaderError::query)?;
            tx.commit().map_err(LoaderError::query)?;

            let count = u64::try_from(count)
                .map_err(|_| LoaderError::internal(format!("negative row count {count}")))?;
            info!(rows = count, "materialized relation");
            Ok(count)
        })
    }

    /// Close the working connection, then the database instance, then remove
    /// the scratch directory. Further calls are no-ops.
    #[instrument(skip(self))]
    pub fn release(&self) -> Result<(), LoaderError> {
        let engine = {
            let mut guard = self
                .inner
                .lock()
                .map_err(|_| LoaderError::internal("engine mutex poisoned"))?;
            guard.take()
        };
        let Some(OpenEngine {
            instance,
            conn,
            scratch,
        }) = engine
        else {
            return Ok(());
        };

        conn.close()
            .map_err(|(_, err)| LoaderError::internal(format!("failed to close connection: {err}")))?;
        instance.close().map_err(|(_, err)| {
            LoaderError::internal(format!("failed to close database: {err}"))
        })?;
        scratch.close().map_err(|err| {
            LoaderError::internal(format!("failed to remove scratch directory: {err}"))
        })?;
        info!("released DuckDB engine");
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LoaderConfig;
    use crate::engine::EngineFactory;
    use crate::types::{rows_from_batches, Scalar};

    fn open() -> anyhow::Result<EngineHandle> {
        Ok(EngineFactory::new(Arc::new(LoaderConfig::default())).open()?)
    }

    const CSV: &str = "h3_id,groundheight,year_int\n8a1,1.5,2021\n8a2,-3.0,2022\n";

    #[test]
    fn ingest_csv_and_query_rows() -> anyhow::Result<()> {
        let handle = open()?;
        let count = handle.ingest(CSV.as_bytes(), "heights", SourceFormat::Csv)?;
        assert_eq!(count, 2);

        let result = handle.execute_query("SELECT * FROM heights ORDER BY h3_id")?;
        assert_eq!(result.total_rows, 2);
        let rows = rows_from_batches(&result.batches)?;
        assert_eq!(rows[0].get("h3_id"), Some(&Scalar::Text("8a1".into())));
        assert_eq!(rows[1].get("groundheight"), Some(&Scalar::Float(-3.0)));
        assert_eq!(rows[1].get("year_int"), Some(&Scalar::Int(2022)));
        Ok(())
    }

    #[test]
    fn buffer_is_registered_under_fixed_name() -> anyhow::Result<()> {
        let handle = open()?;
        handle.ingest(CSV.as_bytes(), "heights", SourceFormat::Csv)?;
        assert!(handle.scratch_path().join("data.csv").exists());
        Ok(())
    }

    #[test]
    fn malformed_parquet_is_a_format_error() -> anyhow::Result<()> {
        let handle = open()?;
        let err = handle
            .ingest(b"PAR1 definitely not parquet", "t", SourceFormat::Parquet)
            .err();
        assert!(matches!(
            err,
            Some(LoaderError::Format {
                operation: "ingest",
                format: "parquet",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn invalid_query_is_a_query_error() -> anyhow::Result<()> {
        let handle = open()?;
        let err = handle.execute_query("SELECT * FROM missing_table").err();
        assert!(matches!(err, Some(LoaderError::Query { .. })));
        Ok(())
    }

    #[test]
    fn release_is_idempotent_and_removes_scratch() -> anyhow::Result<()> {
        let handle = open()?;
        let scratch = handle.scratch_path().to_path_buf();
        assert!(scratch.exists());

        handle.release()?;
        handle.release()?;
        assert!(handle.is_released());
        assert!(!scratch.exists());

        let err = handle.execute_query("SELECT 1").err();
        assert_eq!(err, Some(LoaderError::Closed));
        Ok(())
    }
}
