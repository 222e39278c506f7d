//! Error taxonomy for the binding layer.
//!
//! Every failure is surfaced as a distinguishable, immediately-raised error.
//! Configuration faults are caught before any backend call is made; backend
//! failures pass through opaquely, never interpreted or retried here.

/// All errors that can occur within this crate.
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    /// A configuration field holds a malformed value (e.g. an empty or
    /// non-positive candidate pool).
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// A configuration range violates `1 <= low <= high` (or the timeout /
    /// a budget ratio is out of bounds).
    #[error("invalid range for `{field}`: {reason}")]
    InvalidRange { field: &'static str, reason: String },

    /// A placeholder has no shape observation; rerun discovery with an
    /// example input.
    #[error("no shape observed for placeholder at node {node}; provide an example input")]
    ShapeInference { node: usize },

    /// Substitution attempted without a usable discovery pass.
    #[error("placeholders not initialized: {reason}")]
    NotInitialized { reason: &'static str },

    /// Opaque passthrough from the external search engine (search-space
    /// exhaustion, timeout expiry, ...).
    #[error("search backend: {0}")]
    Backend(String),

    /// Generic message for graph-evaluation faults not covered above.
    #[error("{0}")]
    Msg(String),
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CanvasError>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::CanvasError::Msg(format!($($arg)*)))
    };
}
