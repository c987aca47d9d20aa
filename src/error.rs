//! Error taxonomy for the bridge boundary.
//!
//! Every public operation validates at the top and fails before any engine
//! call or buffer mutation. No error is silently swallowed: each variant
//! carries the offending value or expected shape so the caller can diagnose
//! without re-running.

use crate::types::LayerKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced at the bridge boundary.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The context handle is null, unknown, or stale.
    ///
    /// Not retryable until `load()` succeeds.
    #[error("engine context handle is invalid, call load() prior to any other functions")]
    InvalidHandle,

    /// The requested layer kind has no matches in the loaded network.
    #[error("no layers of kind {kind:?} found in network {network:?}")]
    LayerNotFound { kind: LayerKind, network: String },

    /// A data-type ordinal outside the supported conversion set.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(u32),

    /// Parallel descriptor arrays differ in length.
    ///
    /// Rejected before any registration side effect occurs.
    #[error("parallel array length mismatch: {field} has {actual} elements, expected {expected}")]
    ArrayLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A required engine entry point could not be resolved.
    ///
    /// Indicates an ABI/version mismatch between the bridge and the engine
    /// library; initialization fails fatally and is never retried.
    #[error("failed to resolve engine symbol {symbol:?}")]
    SymbolResolution { symbol: &'static str },

    /// The engine library itself could not be opened.
    #[error("failed to load engine library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// The engine reported a failure.
    #[error("engine error: {0}")]
    Engine(String),

    /// A host-side record is self-inconsistent.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}
