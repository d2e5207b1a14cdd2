//! Error taxonomy for the analysis engine.
//!
//! Only [`EngineError::Cancelled`] and [`EngineError::EmptySource`] ever reach
//! a caller as a failed call. The other variants describe degraded operation:
//! they route a call to a fallback tier or are recorded in
//! [`Stats`](crate::engine::Stats) while the call still succeeds.

use thiserror::Error;

/// Errors produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No capability is registered for the language id.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The parser produced no usable tree.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// A single detector pass failed or panicked.
    #[error("detector {detector} failed: {message}")]
    DetectorInternal { detector: String, message: String },

    /// Cooperative cancellation was observed.
    #[error("analysis cancelled")]
    Cancelled,

    /// The caller passed a zero-length source.
    #[error("source is empty")]
    EmptySource,
}

/// Result alias used by the public entry points.
pub type Result<T> = std::result::Result<T, EngineError>;
