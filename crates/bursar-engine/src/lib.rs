//! # Bursar Engine
//!
//! Receipt numbering and payment allocation for the school fee ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          bursar-engine                                  │
//! │                                                                         │
//! │  ┌───────────────────────┐        ┌───────────────────────────────┐    │
//! │  │   SequenceAllocator   │        │         PaymentEngine         │    │
//! │  │  ───────────────────  │◄───────│  ───────────────────────────  │    │
//! │  │  atomic counter       │        │  per-fee locks                │    │
//! │  │  retry + backoff      │        │  due-date cascade             │    │
//! │  │  flagged fallback     │        │  idempotent numbering         │    │
//! │  └──────────┬────────────┘        │  combined-fee propagation     │    │
//! │             │                     └──────────────┬────────────────┘    │
//! │             ▼                                    ▼                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐  │
//! │  │                     bursar-db (SQLite)                          │  │
//! │  │  counters / school_settings / fees / installments               │  │
//! │  └─────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure money arithmetic and the allocation cascade itself live in
//! `bursar-core`; this crate adds concurrency control, numbering and
//! persistence around them.

pub mod allocator;
pub mod engine;
pub mod error;
pub mod locks;

pub use allocator::{AllocatorConfig, Reservation, SequenceAllocator};
pub use engine::{AllocationResult, PaymentEngine};
pub use error::{EngineError, EngineResult};
pub use locks::KeyedLocks;
