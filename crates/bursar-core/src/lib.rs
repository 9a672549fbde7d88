//! # bursar-core: Pure Business Logic for the Bursar Fee Engine
//!
//! This crate is the **heart** of the receipt-numbering and payment-allocation
//! engine. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bursar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              External collaborators (out of scope)              │   │
//! │  │    Fee screens ──► Receipt PDFs ──► CSV export ──► Reports     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  bursar-engine (public API)                     │   │
//! │  │      SequenceAllocator::reserve, PaymentEngine::apply           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bursar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │   │   types   │ │   money   │ │ allocation │ │ numbering  │   │   │
//! │  │   │ Fee       │ │   Money   │ │  cascade   │ │  formats   │   │   │
//! │  │   │ Counter   │ │  (cents)  │ │  clamping  │ │  fallback  │   │   │
//! │  │   └───────────┘ └───────────┘ └────────────┘ └────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bursar-db (Database Layer)                   │   │
//! │  │             SQLite queries, migrations, repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Fee, Installment, Counter, settings)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`allocation`] - The pure payment-allocation cascade
//! - [`numbering`] - Receipt number formatting rules
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are cents (i64); balances clamp to
//!    exactly zero instead of relying on float epsilons
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod money;
pub mod numbering;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use bursar_core::Money` instead of
// `use bursar_core::money::Money`

pub use allocation::{allocate, AllocationPass, PaymentContext};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum numbers that can be reserved in one batch.
///
/// ## Business Reason
/// A single UI action never needs more than a handful of receipt numbers
/// (one per record touched by a payment). A large batch request is almost
/// certainly a caller bug, and honoring it would burn a wide gap into the
/// sequence.
pub const MAX_RESERVE_BATCH: i64 = 1_000;

/// Maximum length of a configured receipt number prefix.
pub const MAX_PREFIX_LEN: usize = 16;

/// Default fallback prefix for the fee numbering domain.
pub const FEE_FALLBACK_PREFIX: &str = "R-";

/// Default fallback prefix for the installment numbering domain (none).
pub const INSTALLMENT_FALLBACK_PREFIX: &str = "";
