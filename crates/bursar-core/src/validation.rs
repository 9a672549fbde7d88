//! # Validation Module
//!
//! Input validation for the engine's public entry points.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (fee/installment screens)                              │
//! │  └── Basic format checks, immediate user feedback                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation at the engine edge     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  └── NOT NULL, CHECK, PRIMARY KEY constraints                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_PREFIX_LEN, MAX_RESERVE_BATCH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a school identifier.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 64 characters
pub fn validate_school_id(school_id: &str) -> ValidationResult<()> {
    let school_id = school_id.trim();

    if school_id.is_empty() {
        return Err(ValidationError::Required {
            field: "school_id".to_string(),
        });
    }

    if school_id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "school_id".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates an entity id (fee, installment, student).
pub fn validate_entity_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a payment amount in cents.
///
/// ## Rules
/// - Must be positive (> 0); zero and negative tenders are rejected
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a reservation batch size.
///
/// ## Rules
/// - At least 1
/// - At most [`MAX_RESERVE_BATCH`]
pub fn validate_reserve_count(count: i64) -> ValidationResult<()> {
    if count < 1 || count > MAX_RESERVE_BATCH {
        return Err(ValidationError::OutOfRange {
            field: "count".to_string(),
            min: 1,
            max: MAX_RESERVE_BATCH,
        });
    }

    Ok(())
}

/// Validates a receipt number prefix.
pub fn validate_prefix(prefix: &str) -> ValidationResult<()> {
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(ValidationError::TooLong {
            field: "prefix".to_string(),
            max: MAX_PREFIX_LEN,
        });
    }

    Ok(())
}

/// Validates a numbering year.
///
/// ## Rules
/// - Four-digit calendar year; anything else is a data entry mistake
pub fn validate_year(year: i64) -> ValidationResult<()> {
    if !(1970..=9999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1970,
            max: 9999,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
