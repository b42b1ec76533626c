pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod source;
pub mod sql;
pub mod types;

pub use config::LoaderConfig;
pub use engine::LifecycleState;
pub use error::LoaderError;
pub use fetch::{Fetcher, HttpFetcher, SourceFetcher};
pub use loader::Loader;
pub use source::SourceFormat;
pub use types::{Row, Scalar};
