//! # Receipt Number Formatting
//!
//! Pure rendering of reserved counter values into user-facing receipt
//! numbers. These strings are printed on receipts, so the exact formatting
//! is part of the contract.
//!
//! ## Formats
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  format              counter=10  prefix="INV-"  year=2024               │
//! │  ──────────────────  ─────────────────────────────────────              │
//! │  sequential          "10"                                               │
//! │  year                "10/2024"                                          │
//! │  short-year          "10/24"                                            │
//! │  custom              "INV-10"                                           │
//! │  student-sequential  "10"         (student id intentionally omitted)    │
//! │  auto                timestamp-derived, see fallback_number()           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Formatting and counter increments are strictly separated: this module
//! never touches counter state, and the counter store never formats.

use crate::types::{NumberFormat, NumberingDomain};
use crate::{FEE_FALLBACK_PREFIX, INSTALLMENT_FALLBACK_PREFIX};

/// Renders a reserved integer per the structured formats.
///
/// Returns `None` for [`NumberFormat::Auto`]: auto numbers are not derived
/// from the counter at all, the caller generates them with
/// [`fallback_number`] instead.
pub fn format_number(value: i64, format: NumberFormat, prefix: &str, year: i64) -> Option<String> {
    match format {
        NumberFormat::Sequential | NumberFormat::StudentSequential => Some(value.to_string()),
        NumberFormat::Year => Some(format!("{}/{}", value, year)),
        NumberFormat::ShortYear => Some(format!("{}/{:02}", value, year.rem_euclid(100))),
        NumberFormat::Custom => Some(format!("{}{}", prefix, value)),
        NumberFormat::Auto => None,
    }
}

/// Builds a collision-resistant number from a high-resolution timestamp.
///
/// ## Guarantee (and its limit)
/// This is the explicitly *non-atomic* path: two callers hitting the same
/// microsecond would collide. It is used only when structured sequencing is
/// not requested (`auto` format) or when the counter store is unreachable
/// and the caller has been warned the number may need reconciliation.
///
/// The caller supplies the timestamp so this function stays deterministic;
/// batch callers offset it per number to keep a batch internally unique.
pub fn fallback_number(prefix: &str, timestamp_micros: i64) -> String {
    format!("{}{}", prefix, timestamp_micros)
}

/// Default prefix used by the fallback generator when the school has not
/// configured one.
pub const fn default_fallback_prefix(domain: NumberingDomain) -> &'static str {
    match domain {
        NumberingDomain::Fee => FEE_FALLBACK_PREFIX,
        NumberingDomain::Installment => INSTALLMENT_FALLBACK_PREFIX,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
