//! # bursar-db: Database Layer for the Bursar Fee Engine
//!
//! SQLite persistence for counters, settings, fees and installments, using
//! sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bursar Data Flow                                 │
//! │                                                                         │
//! │  bursar-engine (SequenceAllocator, PaymentEngine)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bursar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ counter.rs    │    │  (embedded)  │  │   │
//! │  │   │               │    │ settings.rs   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ fee.rs        │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (counter, settings, fee)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bursar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/bursar.db")).await?;
//! let fee = db.fees().get_by_id("...").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::counter::CounterRepository;
pub use repository::fee::FeeRepository;
pub use repository::settings::SettingsRepository;
