use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Relation that loads and convenience queries target when none is given.
    pub default_relation: String,
    /// Column matched by `rows_for_year`.
    pub year_column: String,
    /// DuckDB worker threads. Engine default when unset.
    pub threads: Option<usize>,
    /// DuckDB memory limit, e.g. "2GB". Engine default when unset.
    pub memory_limit: Option<String>,
    /// Parent directory for the engine's scratch directory. System temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Request timeout for HTTP sources.
    pub http_timeout_seconds: u64,
    /// Log format: "compact" or "json".
    pub log_format: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_relation: "data".to_string(),
            year_column: "year_int".to_string(),
            threads: None,
            memory_limit: None,
            scratch_dir: None,
            http_timeout_seconds: 60,
            log_format: "compact".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Load defaults overlaid with `HEXLAKE_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let defaults_json = serde_json::to_string(&Self::default())
            .with_context(|| "failed to serialize defaults")?;
        let settings = config::Config::builder()
            .add_source(
                config::File::from_str(&defaults_json, config::FileFormat::Json).required(false),
            )
            .add_source(config::Environment::with_prefix("HEXLAKE"))
            .build()
            .with_context(|| "failed to load configuration")?;
        let cfg: LoaderConfig = settings
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_relation.trim().is_empty() {
            bail!("default_relation must not be empty");
        }
        if self.year_column.trim().is_empty() {
            bail!("year_column must not be empty");
        }
        if self.threads == Some(0) {
            bail!("threads must be at least 1 when set");
        }
        if self.http_timeout_seconds == 0 {
            bail!("http_timeout_seconds must be at least 1");
        }
        if !matches!(self.log_format.as_str(), "compact" | "json") {
            bail!(
                "log_format must be \"compact\" or \"json\", got {:?}",
                self.log_format
            );
        }
        Ok(())
    }
}
