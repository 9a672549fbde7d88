//! # Repository Module
//!
//! Database repository implementations for the fee ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The engine never writes SQL. It calls repositories:                    │
//! │                                                                         │
//! │  db.counters().reserve(school, domain, n, seed)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CounterRepository ── one transaction, one atomic increment             │
//! │                                                                         │
//! │  db.fees().apply_ledger_update(update)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FeeRepository ── one transaction, all-or-nothing                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`counter::CounterRepository`] - Atomic receipt number reservations
//! - [`settings::SettingsRepository`] - Per-school numbering configuration
//! - [`fee::FeeRepository`] - Fee and installment CRUD + transactional updates

pub mod counter;
pub mod fee;
pub mod settings;
