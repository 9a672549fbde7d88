//! # Counter Repository
//!
//! Atomic receipt-number reservations, one counter per (school, domain).
//!
//! ## The Correctness Hazard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two operator sessions reserve a number "at the same time":             │
//! │                                                                         │
//! │   Session A                    Session B                                │
//! │   ─────────                    ─────────                                │
//! │   read current_value = 7       read current_value = 7     ❌ lost       │
//! │   write 8, use 7               write 8, use 7             ❌ duplicate  │
//! │                                                                         │
//! │  Here the read and the increment are ONE statement inside ONE           │
//! │  transaction (UPDATE ... RETURNING). SQLite serializes the writers,     │
//! │  so two concurrent reservations always see different values and the     │
//! │  counter reflects both afterwards.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter row is committed before the numbers are handed to the caller;
//! a crash after commit burns numbers but can never duplicate them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bursar_core::{Counter, NumberingConfig, NumberingDomain};

/// Repository for counter reservations.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    /// Creates a new CounterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CounterRepository { pool }
    }

    /// Atomically reserves `count` consecutive integers.
    ///
    /// ## What This Does
    /// 1. Lazily creates the counter for `(school_id, domain)` if absent,
    ///    seeded from the school's settings (`seed`)
    /// 2. Increments `current_value` by `count` and reads the result in a
    ///    single statement - no interleaving window
    /// 3. Commits before returning, so the reservation is durable before
    ///    any number reaches a receipt
    ///
    /// ## Returns
    /// The first reserved integer plus the counter row as of this
    /// reservation. The batch is `first .. first + count`, contiguous by
    /// construction. Formatting uses the returned row's format/prefix/year
    /// (the configuration snapshotted when the counter was created).
    pub async fn reserve(
        &self,
        school_id: &str,
        domain: NumberingDomain,
        count: i64,
        seed: &NumberingConfig,
    ) -> DbResult<(i64, Counter)> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // Lazy creation; a no-op when the counter already exists.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO counters
                (school_id, domain, current_value, format, prefix, year, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(school_id)
        .bind(domain)
        .bind(seed.start)
        .bind(seed.format)
        .bind(&seed.prefix)
        .bind(seed.year)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Increment-and-read as one atomic unit.
        let counter: Counter = sqlx::query_as(
            r#"
            UPDATE counters
            SET current_value = current_value + ?3,
                updated_at = ?4
            WHERE school_id = ?1 AND domain = ?2
            RETURNING school_id, domain, current_value, format, prefix, year, updated_at
            "#,
        )
        .bind(school_id)
        .bind(domain)
        .bind(count)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Counter", format!("{}/{}", school_id, domain.as_str())))?;

        // Commit contention is the retryable case the engine backs off on.
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let first = counter.current_value - count;

        debug!(
            school_id,
            domain = domain.as_str(),
            first,
            count,
            "Reserved receipt numbers"
        );

        Ok((first, counter))
    }

    /// Reads a counter without touching it. Diagnostics and tests.
    pub async fn get(
        &self,
        school_id: &str,
        domain: NumberingDomain,
    ) -> DbResult<Option<Counter>> {
        let counter = sqlx::query_as(
            r#"
            SELECT school_id, domain, current_value, format, prefix, year, updated_at
            FROM counters
            WHERE school_id = ?1 AND domain = ?2
            "#,
        )
        .bind(school_id)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(counter)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
