//! Library error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not parse injector configuration: {0}")]
    Config(String),

    #[error("no valid injectors found in the configuration")]
    NoValidInjectors,

    #[error("probe task failed: {0}")]
    Probe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
