//! # Settings Repository
//!
//! Per-school numbering configuration. One row per school; counters are
//! seeded from these values on first reservation.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bursar_core::SchoolSettings;

/// Repository for school settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Gets settings for a school, if configured.
    pub async fn get(&self, school_id: &str) -> DbResult<Option<SchoolSettings>> {
        let settings = sqlx::query_as(
            r#"
            SELECT
                school_id,
                fee_number_format,
                fee_number_prefix,
                fee_number_counter,
                fee_number_year,
                installment_number_format,
                installment_number_prefix,
                installment_number_counter,
                installment_number_year,
                updated_at
            FROM school_settings
            WHERE school_id = ?1
            "#,
        )
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Inserts or replaces a school's settings.
    ///
    /// ## Note
    /// Changing settings does NOT rewrite an existing counter: the counter
    /// keeps the format/prefix/year snapshotted at its creation, so numbers
    /// already promised stay consistent.
    pub async fn upsert(&self, settings: &SchoolSettings) -> DbResult<()> {
        debug!(school_id = %settings.school_id, "Upserting school settings");

        sqlx::query(
            r#"
            INSERT INTO school_settings (
                school_id,
                fee_number_format, fee_number_prefix,
                fee_number_counter, fee_number_year,
                installment_number_format, installment_number_prefix,
                installment_number_counter, installment_number_year,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (school_id) DO UPDATE SET
                fee_number_format = excluded.fee_number_format,
                fee_number_prefix = excluded.fee_number_prefix,
                fee_number_counter = excluded.fee_number_counter,
                fee_number_year = excluded.fee_number_year,
                installment_number_format = excluded.installment_number_format,
                installment_number_prefix = excluded.installment_number_prefix,
                installment_number_counter = excluded.installment_number_counter,
                installment_number_year = excluded.installment_number_year,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&settings.school_id)
        .bind(settings.fee_number_format)
        .bind(&settings.fee_number_prefix)
        .bind(settings.fee_number_counter)
        .bind(settings.fee_number_year)
        .bind(settings.installment_number_format)
        .bind(&settings.installment_number_prefix)
        .bind(settings.installment_number_counter)
        .bind(settings.installment_number_year)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
