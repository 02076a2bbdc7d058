use apigraph_common::GatewayError;

/// An error raised while talking to the graph store.
///
/// The store is mandatory infrastructure: every one of these errors aborts the request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached or did not answer in time.
    #[error("The graph store is unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The store answered with a non-success status.
    #[error("The graph store rejected the operation with status {status}: {message}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The beginning of the response body.
        message: String,
    },
    /// The store answered with results that cannot be parsed.
    #[error("Invalid SPARQL results: {0}")]
    InvalidResults(#[from] sparesults::QueryResultsParseError),
    /// The operation could not be evaluated by an embedded store.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

impl From<StoreError> for GatewayError {
    fn from(error: StoreError) -> Self {
        Self::upstream_fatal(error)
    }
}
