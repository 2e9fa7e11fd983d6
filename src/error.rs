//! Error taxonomy for the scan pipeline.
//!
//! Source-unavailable and malformed-record failures are recovered locally
//! inside adapters (logged, record or batch dropped) and never surface as
//! an `EngineError` — this type only covers the boundaries that are allowed
//! to fail loudly: startup configuration, internal invariants, and
//! subscriber callbacks.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invariant violated: {0}")]
    ProgrammingInvariant(String),

    #[error("subscriber callback failed: {0}")]
    SubscriberFailure(String),

    #[error("invalid odds/probability input: {0}")]
    InvalidInput(String),
}
