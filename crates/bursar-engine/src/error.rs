//! # Engine Error Types
//!
//! What callers of the engine see.
//!
//! ## Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SettingsUnavailable       - no settings for school; caller applies     │
//! │                              defaults (or the engine does, by config)   │
//! │  ReservationFailed         - atomic increment never committed after     │
//! │                              bounded retries                            │
//! │  AllocationTargetNotFound  - fee/installment id didn't resolve; fatal   │
//! │                              for the request, nothing was mutated       │
//! │  InvalidRequest            - business rule violation at the edge        │
//! │  Db                        - everything else from the storage layer     │
//! │                                                                         │
//! │  NOT an error: over-allocation. The unapplied remainder is returned     │
//! │  in AllocationResult for manual handling, never silently discarded.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use bursar_core::CoreError;
use bursar_db::DbError;

/// Errors surfaced by the allocator and payment engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No settings record exists for the school and the allocator was
    /// configured to require one.
    #[error("No settings found for school: {school_id}")]
    SettingsUnavailable { school_id: String },

    /// The counter increment could not be committed after bounded retries.
    ///
    /// Callers may retry later or use `reserve_or_fallback`, which degrades
    /// to a flagged non-atomic number instead of failing.
    #[error("Receipt number reservation failed after {attempts} attempt(s): {source}")]
    ReservationFailed {
        attempts: u32,
        #[source]
        source: DbError,
    },

    /// The payment's target fee (or a referenced installment) does not
    /// resolve. Fatal for that request; no partial mutation is persisted.
    #[error("{entity} not found: {id}")]
    AllocationTargetNotFound { entity: &'static str, id: String },

    /// Business rule violation (zero amount, malformed ids, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    /// Database operation failed.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<bursar_core::ValidationError> for EngineError {
    fn from(err: bursar_core::ValidationError) -> Self {
        EngineError::InvalidRequest(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
