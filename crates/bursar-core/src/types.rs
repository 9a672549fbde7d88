//! # Domain Types
//!
//! Core domain types for the fee ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Fee        │   │   Installment   │   │    Counter      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  school_id      │       │
//! │  │  student_id     │   │  fee_id (FK)    │   │  domain         │       │
//! │  │  amount_cents   │   │  due_date       │   │  current_value  │       │
//! │  │  receipt_number │◄──┤  receipt_number │   │  format/prefix  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  A Fee owns zero or more Installments ordered by due_date.             │
//! │  One Counter exists per (school, numbering domain) pair.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: the receipt number - human-readable, assigned exactly once

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Numbering Domain
// =============================================================================

/// The numbering namespace a counter belongs to.
///
/// Each school has two independent sequences: one for fee receipts and one
/// for installment receipts, each with its own format, prefix and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum NumberingDomain {
    Fee,
    Installment,
}

impl NumberingDomain {
    /// Stable string form, used in lock keys and log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NumberingDomain::Fee => "fee",
            NumberingDomain::Installment => "installment",
        }
    }
}

// =============================================================================
// Number Format
// =============================================================================

/// How reserved integers are rendered into receipt numbers.
///
/// The rendered forms are user-facing identifiers printed on receipts, so
/// the exact formatting matters (see [`crate::numbering`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum NumberFormat {
    /// The raw integer, no padding: `42`.
    Sequential,
    /// Integer slash full year: `42/2026`.
    Year,
    /// Integer slash two-digit year: `42/26`.
    ShortYear,
    /// Verbatim prefix followed by the integer: `INV-42`.
    Custom,
    /// Same rendering as `Sequential`; the student id is intentionally not
    /// embedded in the number.
    StudentSequential,
    /// No structured sequencing requested: numbers derive from a
    /// high-resolution timestamp instead of the counter.
    Auto,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::Auto
    }
}

// =============================================================================
// Counter
// =============================================================================

/// A per-(school, domain) receipt number counter.
///
/// ## Invariants
/// - `current_value` is the next unreserved integer; it never decreases
/// - It is incremented exactly once per successfully reserved number
/// - Format, prefix and year are snapshotted from settings when the counter
///   is lazily created, so a number is always rendered with the
///   configuration that was live at reservation time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Counter {
    pub school_id: String,
    pub domain: NumberingDomain,
    pub current_value: i64,
    pub format: NumberFormat,
    pub prefix: String,
    pub year: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// School Settings
// =============================================================================

/// Per-school numbering configuration, one record per school.
///
/// Counters are seeded from these values the first time a number is reserved
/// for a school/domain pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SchoolSettings {
    pub school_id: String,
    pub fee_number_format: NumberFormat,
    pub fee_number_prefix: String,
    pub fee_number_counter: i64,
    pub fee_number_year: i64,
    pub installment_number_format: NumberFormat,
    pub installment_number_prefix: String,
    pub installment_number_counter: i64,
    pub installment_number_year: i64,
    pub updated_at: DateTime<Utc>,
}

impl SchoolSettings {
    /// Default settings for a school with no stored record.
    ///
    /// Both domains fall back to `auto` numbering starting at 1 for the
    /// given year. The fee prefix defaults to `"R-"`, the installment
    /// prefix to empty.
    pub fn defaults_for(school_id: &str, year: i64, now: DateTime<Utc>) -> Self {
        SchoolSettings {
            school_id: school_id.to_string(),
            fee_number_format: NumberFormat::Auto,
            fee_number_prefix: crate::FEE_FALLBACK_PREFIX.to_string(),
            fee_number_counter: 1,
            fee_number_year: year,
            installment_number_format: NumberFormat::Auto,
            installment_number_prefix: crate::INSTALLMENT_FALLBACK_PREFIX.to_string(),
            installment_number_counter: 1,
            installment_number_year: year,
            updated_at: now,
        }
    }

    /// The numbering configuration for one domain.
    pub fn numbering(&self, domain: NumberingDomain) -> NumberingConfig {
        match domain {
            NumberingDomain::Fee => NumberingConfig {
                format: self.fee_number_format,
                prefix: self.fee_number_prefix.clone(),
                start: self.fee_number_counter,
                year: self.fee_number_year,
            },
            NumberingDomain::Installment => NumberingConfig {
                format: self.installment_number_format,
                prefix: self.installment_number_prefix.clone(),
                start: self.installment_number_counter,
                year: self.installment_number_year,
            },
        }
    }
}

/// One domain's numbering configuration, extracted from [`SchoolSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    pub format: NumberFormat,
    pub prefix: String,
    /// First integer the counter hands out when lazily created.
    pub start: i64,
    pub year: i64,
}

// =============================================================================
// Fee Type & Status
// =============================================================================

/// The kind of obligation a fee represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Tuition,
    Transportation,
    /// Composite record covering tuition and transportation together.
    /// Paying it in full must also settle the mirrored constituent fees.
    TransportationAndTuition,
    Other,
}

impl FeeType {
    /// Whether this fee mirrors constituent fee records that must be kept
    /// in sync when it is settled.
    pub const fn is_composite(&self) -> bool {
        matches!(self, FeeType::TransportationAndTuition)
    }

    /// The constituent fee types of a composite fee.
    pub const fn constituents(&self) -> &'static [FeeType] {
        match self {
            FeeType::TransportationAndTuition => &[FeeType::Tuition, FeeType::Transportation],
            _ => &[],
        }
    }
}

/// Payment status of a fee, derived from its balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Unpaid,
    Partial,
    Paid,
}

impl Default for FeeStatus {
    fn default() -> Self {
        FeeStatus::Unpaid
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    BankTransfer,
    Card,
}

/// Details recorded alongside a check payment.
///
/// Persisted as a JSON document on the installment so the receipt layer can
/// print them without a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDetails {
    pub number: String,
    pub bank: String,
    pub date: Option<NaiveDate>,
}

// =============================================================================
// Fee
// =============================================================================

/// One fee obligation for one student.
///
/// `paid_cents` is the cumulative amount received. When the fee has
/// installments, it is the sum of their `paid_amount_cents`; otherwise it is
/// tracked directly on the fee. Balance and status are derived:
/// `balance = max(0, amount - discount - paid)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Fee {
    pub id: String,
    pub school_id: String,
    pub student_id: String,
    pub fee_type: FeeType,
    /// Gross amount in cents.
    pub amount_cents: i64,
    /// Discount in cents, applied once at the fee level before any
    /// installment distribution. Installments never carry a discount.
    pub discount_cents: i64,
    /// Cumulative amount paid in cents.
    pub paid_cents: i64,
    /// Derived from the balance; persisted denormalized for list views.
    pub status: FeeStatus,
    /// Assigned exactly once by the engine; never regenerated on view.
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fee {
    /// Net amount due after the fee-level discount.
    #[inline]
    pub fn net_due(&self) -> Money {
        Money::from_cents(self.amount_cents).clamped_sub(Money::from_cents(self.discount_cents))
    }

    /// Outstanding balance, clamped at zero.
    #[inline]
    pub fn balance(&self) -> Money {
        self.net_due().clamped_sub(Money::from_cents(self.paid_cents))
    }

    /// Status derived from the current balance and paid total.
    pub fn derived_status(&self) -> FeeStatus {
        if self.balance().is_zero() {
            FeeStatus::Paid
        } else if self.paid_cents > 0 {
            FeeStatus::Partial
        } else {
            FeeStatus::Unpaid
        }
    }

    /// Applies a payment directly to the fee (no installments).
    ///
    /// The applied amount is bounded by the outstanding balance; anything
    /// beyond it is returned as the unapplied remainder.
    pub fn apply_direct_payment(&mut self, amount: Money, now: DateTime<Utc>) -> Money {
        let applied = amount.min(self.balance());
        self.paid_cents += applied.cents();
        self.status = self.derived_status();
        self.updated_at = now;
        amount - applied
    }

    /// Recomputes the aggregate paid total and status from the fee's
    /// installments.
    pub fn recompute_from_installments(&mut self, installments: &[Installment], now: DateTime<Utc>) {
        self.paid_cents = installments.iter().map(|i| i.paid_amount_cents).sum();
        self.status = self.derived_status();
        self.updated_at = now;
    }

    /// Marks the fee fully settled (used for constituent fees of a paid
    /// composite fee).
    pub fn mark_settled(&mut self, now: DateTime<Utc>) {
        self.paid_cents = self.net_due().cents();
        self.status = FeeStatus::Paid;
        self.updated_at = now;
    }
}

// =============================================================================
// Installment
// =============================================================================

/// Payment status of an installment.
///
/// `Overdue` is a derived display state (due date passed, still unpaid).
/// The allocation cascade never writes it; a payment on an overdue
/// installment moves it through `Partial`/`Paid` the same as any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Upcoming,
    Partial,
    /// Terminal: the cascade never targets a paid installment again.
    Paid,
    Overdue,
}

impl Default for InstallmentStatus {
    fn default() -> Self {
        InstallmentStatus::Upcoming
    }
}

/// One scheduled portion of a fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Installment {
    pub id: String,
    pub fee_id: String,
    /// Amount owed for this installment, in cents.
    pub amount_cents: i64,
    /// Cumulative amount paid, never exceeding `amount_cents`.
    pub paid_amount_cents: i64,
    pub status: InstallmentStatus,
    /// Ordering key for the allocation cascade.
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_note: Option<String>,
    /// JSON document of [`CheckDetails`] when paid by check.
    pub check_details: Option<String>,
    /// Assigned exactly once; cascaded records of one payment share one
    /// reservation.
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    /// Outstanding balance, clamped at zero.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.amount_cents).clamped_sub(Money::from_cents(self.paid_amount_cents))
    }

    /// Whether this installment is fully covered.
    #[inline]
    pub fn is_paid(&self) -> bool {
        self.paid_amount_cents >= self.amount_cents
    }

    /// Payment state derived from the paid amount (never `Overdue`).
    pub fn payment_status(&self) -> InstallmentStatus {
        if self.is_paid() {
            InstallmentStatus::Paid
        } else if self.paid_amount_cents > 0 {
            InstallmentStatus::Partial
        } else {
            InstallmentStatus::Upcoming
        }
    }

    /// Display state as of `today`: an unpaid installment whose due date has
    /// passed shows as `Overdue`.
    pub fn display_status(&self, today: NaiveDate) -> InstallmentStatus {
        if self.is_paid() {
            InstallmentStatus::Paid
        } else if self.due_date < today {
            InstallmentStatus::Overdue
        } else {
            self.payment_status()
        }
    }

    /// Builds a fully paid installment mirroring a settled fee.
    ///
    /// Used when a composite fee is paid and a constituent fee has no
    /// installments of its own, so that downstream views never show the
    /// constituent as unpaid while the composite shows paid.
    pub fn synthesized_paid(
        fee: &Fee,
        ctx: &crate::allocation::PaymentContext,
        now: DateTime<Utc>,
    ) -> Installment {
        let amount = fee.net_due().cents();
        Installment {
            id: uuid::Uuid::new_v4().to_string(),
            fee_id: fee.id.clone(),
            amount_cents: amount,
            paid_amount_cents: amount,
            status: InstallmentStatus::Paid,
            due_date: ctx.date,
            paid_date: Some(ctx.date),
            payment_method: Some(ctx.method),
            payment_note: ctx.note.clone(),
            check_details: ctx.check_details.clone(),
            receipt_number: fee.receipt_number.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Payment Request
// =============================================================================

/// The unit of work submitted to the allocation engine. Transient, not
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub target_fee_id: String,
    /// Amount tendered, in cents.
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub note: Option<String>,
    pub check_details: Option<CheckDetails>,
    pub payment_date: NaiveDate,
}

// =============================================================================
// Ledger Update
// =============================================================================

/// Every mutation produced by one payment request.
///
/// Persisted all-or-nothing: either the whole update commits or none of it
/// does.
#[derive(Debug, Clone, Default)]
pub struct LedgerUpdate {
    /// The target fee with recomputed paid/balance/status.
    pub fees: Vec<Fee>,
    /// Existing installments whose payment state changed.
    pub installments: Vec<Installment>,
    /// Installments synthesized for constituent fees.
    pub new_installments: Vec<Installment>,
}

// =============================================================================
// Unit Tests
// =============================================================================
