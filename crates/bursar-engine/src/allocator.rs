//! # Sequence Allocator
//!
//! Hands out unique, sequential, formatted receipt numbers per
//! (school, domain) pair.
//!
//! ## One Call Path, One Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(school, domain, count)                                         │
//! │       │                                                                 │
//! │       ├── settings missing ──► defaults (or SettingsUnavailable)        │
//! │       │                                                                 │
//! │       ├── format = auto ──► timestamp numbers, flagged non-atomic       │
//! │       │                     (structured sequencing not requested)       │
//! │       │                                                                 │
//! │       └── structured ──► atomic counter increment                       │
//! │                │                                                        │
//! │                ├── ok ──────────► contiguous batch, atomic = true       │
//! │                │                                                        │
//! │                └── contention ──► bounded retries with backoff          │
//! │                         │                                               │
//! │                         └── exhausted ──► ReservationFailed             │
//! │                                                                         │
//! │  reserve_or_fallback() additionally catches ReservationFailed and       │
//! │  degrades to timestamp numbers, FLAGGED so the caller knows they may    │
//! │  collide and need reconciliation.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The legacy screens branched into direct generation at every call site;
//! centralizing retry-then-fallback here is what makes the uniqueness
//! guarantee auditable.

use std::time::Duration;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bursar_core::{
    numbering, validation, NumberingDomain, SchoolSettings,
};
use bursar_db::Database;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for the allocator.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Attempts at the atomic reservation before giving up.
    pub max_attempts: u32,

    /// Base backoff between attempts; multiplied by the attempt number.
    pub retry_delay: Duration,

    /// When true, a school without a settings record is an error instead
    /// of getting defaults.
    pub require_settings: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            max_attempts: 3,
            retry_delay: Duration::from_millis(25),
            require_settings: false,
        }
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// A batch of formatted receipt numbers handed to exactly one caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Formatted numbers, contiguous when atomic.
    pub numbers: Vec<String>,
    /// First reserved integer; `None` for timestamp-derived numbers.
    pub first: Option<i64>,
    /// `true` when the numbers came from the atomic counter. `false` means
    /// the best-effort timestamp generator produced them: they are NOT
    /// guaranteed unique and may need reconciliation later.
    pub atomic: bool,
}

// =============================================================================
// Sequence Allocator
// =============================================================================

/// Atomic receipt-number reservation with retry and flagged fallback.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    db: Database,
    config: AllocatorConfig,
}

impl SequenceAllocator {
    /// Creates an allocator with default configuration.
    pub fn new(db: Database) -> Self {
        SequenceAllocator {
            db,
            config: AllocatorConfig::default(),
        }
    }

    /// Creates an allocator with explicit configuration.
    pub fn with_config(db: Database, config: AllocatorConfig) -> Self {
        SequenceAllocator { db, config }
    }

    /// Reserves `count` formatted numbers for `(school_id, domain)`.
    ///
    /// ## Guarantees
    /// - Two concurrent callers never receive the same integer
    /// - Batches are contiguous and never interleave
    /// - The counter is persisted before the numbers are returned
    ///
    /// ## Errors
    /// - `SettingsUnavailable` when the school has no settings record and
    ///   the allocator requires one
    /// - `ReservationFailed` when the increment could not be committed
    ///   within the configured attempts (the caller receives an explicit
    ///   error, never a silently wrong number)
    pub async fn reserve(
        &self,
        school_id: &str,
        domain: NumberingDomain,
        count: i64,
    ) -> EngineResult<Reservation> {
        validation::validate_school_id(school_id)?;
        validation::validate_reserve_count(count)?;

        let settings = self.resolve_settings(school_id).await?;
        let cfg = settings.numbering(domain);
        validation::validate_prefix(&cfg.prefix)?;
        validation::validate_year(cfg.year)?;

        // Structured sequencing not requested: numbers derive from the
        // clock, not the counter, and are flagged accordingly.
        if numbering::format_number(0, cfg.format, &cfg.prefix, cfg.year).is_none() {
            let prefix = effective_fallback_prefix(&cfg.prefix, domain);
            debug!(school_id, domain = domain.as_str(), "Auto format: timestamp numbers");
            return Ok(Reservation {
                numbers: fallback_batch(prefix, count),
                first: None,
                atomic: false,
            });
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self
                .db
                .counters()
                .reserve(school_id, domain, count, &cfg)
                .await
            {
                Ok((first, counter)) => {
                    let numbers = (first..first + count)
                        .map(|value| {
                            numbering::format_number(
                                value,
                                counter.format,
                                &counter.prefix,
                                counter.year,
                            )
                            // The counter snapshot is always a structured
                            // format; auto never creates a counter row.
                            .unwrap_or_else(|| value.to_string())
                        })
                        .collect();

                    debug!(
                        school_id,
                        domain = domain.as_str(),
                        first,
                        count,
                        attempt,
                        "Reservation committed"
                    );

                    return Ok(Reservation {
                        numbers,
                        first: Some(first),
                        atomic: true,
                    });
                }

                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(
                        school_id,
                        domain = domain.as_str(),
                        attempt,
                        error = %e,
                        "Reservation contended, backing off"
                    );
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }

                Err(e) => {
                    return Err(EngineError::ReservationFailed {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Like [`reserve`](Self::reserve), but degrades to the best-effort
    /// timestamp generator when the atomic reservation fails or the store
    /// is unreachable.
    ///
    /// The degraded result is flagged (`atomic == false`): the numbers are
    /// not guaranteed unique and may later collide, requiring
    /// reconciliation. Validation and settings-policy errors pass through
    /// unchanged.
    pub async fn reserve_or_fallback(
        &self,
        school_id: &str,
        domain: NumberingDomain,
        count: i64,
    ) -> EngineResult<Reservation> {
        match self.reserve(school_id, domain, count).await {
            Ok(reservation) => Ok(reservation),

            Err(err @ (EngineError::ReservationFailed { .. } | EngineError::Db(_))) => {
                warn!(
                    school_id,
                    domain = domain.as_str(),
                    error = %err,
                    "Counter store unreachable; issuing NON-ATOMIC fallback numbers"
                );

                let prefix = match self.resolve_settings(school_id).await {
                    Ok(settings) => {
                        let cfg = settings.numbering(domain);
                        effective_fallback_prefix(&cfg.prefix, domain).to_string()
                    }
                    // Settings store is down too; domain default.
                    Err(_) => numbering::default_fallback_prefix(domain).to_string(),
                };

                Ok(Reservation {
                    numbers: fallback_batch(&prefix, count),
                    first: None,
                    atomic: false,
                })
            }

            Err(e) => Err(e),
        }
    }

    /// Loads the school's settings, applying defaults when absent (unless
    /// configured to require a record).
    async fn resolve_settings(&self, school_id: &str) -> EngineResult<SchoolSettings> {
        match self.db.settings().get(school_id).await {
            Ok(Some(settings)) => Ok(settings),
            Ok(None) if self.config.require_settings => Err(EngineError::SettingsUnavailable {
                school_id: school_id.to_string(),
            }),
            Ok(None) => {
                let now = Utc::now();
                debug!(school_id, "No settings record; applying defaults");
                Ok(SchoolSettings::defaults_for(
                    school_id,
                    i64::from(now.year()),
                    now,
                ))
            }
            Err(e) => Err(EngineError::Db(e)),
        }
    }
}

// =============================================================================
// Fallback Generation
// =============================================================================

/// The configured prefix, or the domain default when none is configured.
fn effective_fallback_prefix<'a>(configured: &'a str, domain: NumberingDomain) -> &'a str {
    if configured.is_empty() {
        numbering::default_fallback_prefix(domain)
    } else {
        configured
    }
}

/// A batch of timestamp-derived numbers, offset per entry so one batch is
/// at least internally unique.
fn fallback_batch(prefix: &str, count: i64) -> Vec<String> {
    let base = Utc::now().timestamp_micros();
    (0..count)
        .map(|i| numbering::fallback_number(prefix, base + i))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
