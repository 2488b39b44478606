use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

/// Failure kinds of the simulation pipeline.
///
/// Geometric preconditions are checked before any computation; there is no
/// fallback to default values when they do not hold.
#[derive(Debug, Error)]
pub enum SimError {
    /// A parameter reserved for a future extension was supplied.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// A parameter is outside its valid range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Zero-area AOI, zero-height altitude range, or a mesh too small for the
    /// requested sample counts.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The RPC calibration did not reach the tolerance within the iteration
    /// budget.
    #[error("rpc fit did not converge: {0}")]
    FitNotConverged(String),

    /// The external renderer exited with a failure or did not produce the
    /// expected output file.
    #[error("renderer failed: {0}")]
    RenderFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
