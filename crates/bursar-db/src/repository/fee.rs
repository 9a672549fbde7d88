//! # Fee Repository
//!
//! Database operations for fees and their installments.
//!
//! ## Payment Persistence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  One payment request produces one LedgerUpdate:                         │
//! │                                                                         │
//! │    fees              - target fee + settled constituent fees            │
//! │    installments      - existing rows whose payment state changed        │
//! │    new_installments  - rows synthesized for constituent fees            │
//! │                                                                         │
//! │  apply_ledger_update() writes ALL of it in ONE transaction.             │
//! │  If any statement fails, nothing from the request is persisted.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bursar_core::{Fee, FeeType, Installment, LedgerUpdate};

/// Repository for fee and installment database operations.
#[derive(Debug, Clone)]
pub struct FeeRepository {
    pool: SqlitePool,
}

const FEE_COLUMNS: &str = r#"
    id, school_id, student_id, fee_type,
    amount_cents, discount_cents, paid_cents, status,
    receipt_number, created_at, updated_at
"#;

const INSTALLMENT_COLUMNS: &str = r#"
    id, fee_id, amount_cents, paid_amount_cents, status,
    due_date, paid_date, payment_method, payment_note, check_details,
    receipt_number, created_at, updated_at
"#;

impl FeeRepository {
    /// Creates a new FeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FeeRepository { pool }
    }

    // =========================================================================
    // Fees
    // =========================================================================

    /// Gets a fee by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Fee>> {
        let fee = sqlx::query_as(&format!(
            "SELECT {FEE_COLUMNS} FROM fees WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fee)
    }

    /// Inserts a fee.
    pub async fn insert_fee(&self, fee: &Fee) -> DbResult<()> {
        debug!(id = %fee.id, student_id = %fee.student_id, "Inserting fee");

        sqlx::query(
            r#"
            INSERT INTO fees (
                id, school_id, student_id, fee_type,
                amount_cents, discount_cents, paid_cents, status,
                receipt_number, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&fee.id)
        .bind(&fee.school_id)
        .bind(&fee.student_id)
        .bind(fee.fee_type)
        .bind(fee.amount_cents)
        .bind(fee.discount_cents)
        .bind(fee.paid_cents)
        .bind(fee.status)
        .bind(&fee.receipt_number)
        .bind(fee.created_at)
        .bind(fee.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists a student's fees, oldest first.
    pub async fn list_by_student(&self, school_id: &str, student_id: &str) -> DbResult<Vec<Fee>> {
        let fees = sqlx::query_as(&format!(
            r#"
            SELECT {FEE_COLUMNS} FROM fees
            WHERE school_id = ?1 AND student_id = ?2
            ORDER BY created_at
            "#
        ))
        .bind(school_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(fees)
    }

    /// Finds a student's fee of a given type, if any.
    ///
    /// Used by combined-fee propagation to locate the mirrored tuition and
    /// transportation records. Oldest record wins if duplicates exist.
    pub async fn find_by_student_and_type(
        &self,
        school_id: &str,
        student_id: &str,
        fee_type: FeeType,
    ) -> DbResult<Option<Fee>> {
        let fee = sqlx::query_as(&format!(
            r#"
            SELECT {FEE_COLUMNS} FROM fees
            WHERE school_id = ?1 AND student_id = ?2 AND fee_type = ?3
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(school_id)
        .bind(student_id)
        .bind(fee_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fee)
    }

    // =========================================================================
    // Installments
    // =========================================================================

    /// Gets a fee's installments in due-date order.
    ///
    /// Due-date order is the allocation cascade's contract; callers never
    /// re-sort.
    pub async fn installments_for_fee(&self, fee_id: &str) -> DbResult<Vec<Installment>> {
        let installments = sqlx::query_as(&format!(
            r#"
            SELECT {INSTALLMENT_COLUMNS} FROM installments
            WHERE fee_id = ?1
            ORDER BY due_date
            "#
        ))
        .bind(fee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(installments)
    }

    /// Inserts an installment.
    pub async fn insert_installment(&self, installment: &Installment) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_installment_tx(&mut tx, installment).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    // =========================================================================
    // Transactional Payment Persistence
    // =========================================================================

    /// Persists everything one payment request changed, all-or-nothing.
    ///
    /// ## Why One Transaction
    /// A payment that settled three installments but only persisted two
    /// would break conservation (`paid + balance == amount - discount`).
    /// Any failure rolls the whole request back; the caller retries the
    /// payment as a unit.
    pub async fn apply_ledger_update(&self, update: &LedgerUpdate) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for fee in &update.fees {
            update_fee_payment_tx(&mut tx, fee).await?;
        }
        for installment in &update.installments {
            update_installment_payment_tx(&mut tx, installment).await?;
        }
        for installment in &update.new_installments {
            insert_installment_tx(&mut tx, installment).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            fees = update.fees.len(),
            installments = update.installments.len(),
            synthesized = update.new_installments.len(),
            "Ledger update committed"
        );

        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn update_fee_payment_tx(tx: &mut Transaction<'_, Sqlite>, fee: &Fee) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE fees SET
            paid_cents = ?2,
            status = ?3,
            receipt_number = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&fee.id)
    .bind(fee.paid_cents)
    .bind(fee.status)
    .bind(&fee.receipt_number)
    .bind(fee.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Fee", &fee.id));
    }

    Ok(())
}

async fn update_installment_payment_tx(
    tx: &mut Transaction<'_, Sqlite>,
    installment: &Installment,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE installments SET
            paid_amount_cents = ?2,
            status = ?3,
            paid_date = ?4,
            payment_method = ?5,
            payment_note = ?6,
            check_details = ?7,
            receipt_number = ?8,
            updated_at = ?9
        WHERE id = ?1
        "#,
    )
    .bind(&installment.id)
    .bind(installment.paid_amount_cents)
    .bind(installment.status)
    .bind(installment.paid_date)
    .bind(installment.payment_method)
    .bind(&installment.payment_note)
    .bind(&installment.check_details)
    .bind(&installment.receipt_number)
    .bind(installment.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Installment", &installment.id));
    }

    Ok(())
}

async fn insert_installment_tx(
    tx: &mut Transaction<'_, Sqlite>,
    installment: &Installment,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO installments (
            id, fee_id, amount_cents, paid_amount_cents, status,
            due_date, paid_date, payment_method, payment_note, check_details,
            receipt_number, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&installment.id)
    .bind(&installment.fee_id)
    .bind(installment.amount_cents)
    .bind(installment.paid_amount_cents)
    .bind(installment.status)
    .bind(installment.due_date)
    .bind(installment.paid_date)
    .bind(installment.payment_method)
    .bind(&installment.payment_note)
    .bind(&installment.check_details)
    .bind(&installment.receipt_number)
    .bind(installment.created_at)
    .bind(installment.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
