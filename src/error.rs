use std::time::Duration;

use thiserror::Error;

/// A single failed request attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),
}

/// Failure modes inside the acquisition pipeline. None of these cross the
/// pipeline boundary; each one selects a degraded result instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch of {url} failed after {attempts} attempts: {cause}")]
    FetchFailure {
        url: String,
        attempts: u32,
        #[source]
        cause: TransportError,
    },

    #[error("no candidate rows found in document from {0}")]
    ExtractionEmpty(String),

    #[error("all {0} candidate rows were rejected")]
    ValidationAllRejected(usize),

    #[error("nothing left after aggregation")]
    AggregationEmpty,

    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("could not decode upstream payload: {0}")]
    Decode(String),

    #[error("run exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Decode(e.to_string())
    }
}
