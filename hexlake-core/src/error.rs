use thiserror::Error;

/// Errors surfaced by the loader.
///
/// Variants carry rendered messages instead of source errors so that one
/// initialization failure can be cloned out to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("{operation} failed: input is not valid {format}: {message}")]
    Format {
        operation: &'static str,
        format: &'static str,
        message: String,
    },
    #[error("engine not initialized for `{operation}`; call `initialize()`, `ingest()` or `load_url()` first")]
    Uninitialized { operation: &'static str },
    #[error("query failed: {message}")]
    Query { message: String },
    #[error("engine initialization failed: {message}")]
    Initialization { message: String },
    #[error("loader is closed")]
    Closed,
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoaderError {
    pub(crate) fn fetch(url: &str, message: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn query(err: impl ToString) -> Self {
        Self::Query {
            message: err.to_string(),
        }
    }

    pub(crate) fn initialization(err: impl ToString) -> Self {
        Self::Initialization {
            message: err.to_string(),
        }
    }

    pub(crate) fn internal(err: impl ToString) -> Self {
        Self::Internal(err.to_string())
    }

    /// Whether the failure happened before any bytes reached the engine.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
