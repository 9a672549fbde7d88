//! # Payment Allocation Cascade
//!
//! The pure heart of the payment engine: distributing a tendered amount
//! across a fee's installments in due-date order.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate(installments, 250)                                            │
//! │                                                                         │
//! │  Jan 100/100 due  ──►  apply 100  ──►  Paid    (remaining 150)          │
//! │  Feb 100/100 due  ──►  apply 100  ──►  Paid    (remaining  50)          │
//! │  Mar 100/100 due  ──►  apply  50  ──►  Partial (remaining   0)          │
//! │                                                                         │
//! │  Overflow cascades strictly by due date - never by amount or fee type.  │
//! │  Anything left after the last installment is returned as a remainder,   │
//! │  never silently dropped.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The legacy screens hand-unrolled this walk in two places with
//! near-duplicate code; here it is one function, unit-testable in isolation
//! from persistence and UI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Installment, PaymentMethod, PaymentRequest};

// =============================================================================
// Payment Context
// =============================================================================

/// How a payment was made, stamped onto every installment it touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentContext {
    pub method: PaymentMethod,
    pub note: Option<String>,
    /// Pre-serialized JSON of the check details, if any.
    pub check_details: Option<String>,
    pub date: NaiveDate,
}

impl PaymentContext {
    /// Extracts the context from a request; check details are serialized by
    /// the engine before this point.
    pub fn from_request(request: &PaymentRequest, check_details: Option<String>) -> Self {
        PaymentContext {
            method: request.method,
            note: request.note.clone(),
            check_details,
            date: request.payment_date,
        }
    }
}

// =============================================================================
// Allocation Pass
// =============================================================================

/// Result of one allocation walk.
#[derive(Debug, Clone)]
pub struct AllocationPass {
    /// All installments of the fee, in due-date order, with updated payment
    /// state.
    pub installments: Vec<Installment>,
    /// Ids of installments that received money in this pass.
    pub touched: Vec<String>,
    /// Total applied across installments.
    pub applied: Money,
    /// Unapplied overflow beyond all obligations. Zero unless the payment
    /// exceeded everything outstanding.
    pub remainder: Money,
}

/// Distributes `amount` across `installments` in due-date order.
///
/// ## Rules
/// - Already-paid installments are skipped (terminal state, never reopened)
/// - Each unpaid installment receives `min(remaining, balance)`
/// - `paid_amount` never exceeds `amount`; balances clamp to exactly zero
/// - An installment that becomes fully covered gets `status = Paid` and its
///   `paid_date` set; a partially covered one gets `status = Partial`
/// - Whatever is left after the last installment is returned, not dropped
pub fn allocate(
    mut installments: Vec<Installment>,
    amount: Money,
    ctx: &PaymentContext,
    now: DateTime<Utc>,
) -> AllocationPass {
    // Callers load installments ordered by due date already; sorting here
    // keeps the function total over arbitrary input.
    installments.sort_by(|a, b| a.due_date.cmp(&b.due_date));

    let mut remaining = amount;
    let mut touched = Vec::new();

    for installment in installments.iter_mut() {
        if remaining.is_zero() {
            break;
        }
        if installment.is_paid() {
            continue;
        }

        let slice = remaining.min(installment.balance());
        if !slice.is_positive() {
            continue;
        }

        installment.paid_amount_cents += slice.cents();
        installment.status = installment.payment_status();
        installment.payment_method = Some(ctx.method);
        if ctx.note.is_some() {
            installment.payment_note = ctx.note.clone();
        }
        if ctx.check_details.is_some() {
            installment.check_details = ctx.check_details.clone();
        }
        if installment.is_paid() {
            installment.paid_date = Some(ctx.date);
        }
        installment.updated_at = now;

        remaining -= slice;
        touched.push(installment.id.clone());
    }

    AllocationPass {
        installments,
        touched,
        applied: amount - remaining,
        remainder: remaining,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstallmentStatus;

    fn installment(id: &str, amount: i64, paid: i64, due: (i32, u32, u32)) -> Installment {
        let now = Utc::now();
        Installment {
            id: id.to_string(),
            fee_id: "fee-1".to_string(),
            amount_cents: amount,
            paid_amount_cents: paid,
            status: InstallmentStatus::Upcoming,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            paid_date: None,
            payment_method: None,
            payment_note: None,
            check_details: None,
            receipt_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx() -> PaymentContext {
        PaymentContext {
            method: PaymentMethod::Cash,
            note: None,
            check_details: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        }
    }

    fn schedule() -> Vec<Installment> {
        vec![
            installment("jan", 10_000, 0, (2026, 1, 1)),
            installment("feb", 10_000, 0, (2026, 2, 1)),
            installment("mar", 10_000, 0, (2026, 3, 1)),
        ]
    }

    /// The reference cascade: [100, 100, 100] paid with 250 ends up
    /// Paid / Paid / Partial(50).
    #[test]
    fn test_overpayment_cascades_by_due_date() {
        let pass = allocate(schedule(), Money::from_cents(25_000), &ctx(), Utc::now());

        let [jan, feb, mar] = &pass.installments[..] else {
            panic!("expected three installments");
        };
        assert_eq!(jan.paid_amount_cents, 10_000);
        assert_eq!(jan.status, InstallmentStatus::Paid);
        assert_eq!(jan.paid_date, Some(ctx().date));
        assert_eq!(feb.paid_amount_cents, 10_000);
        assert_eq!(feb.status, InstallmentStatus::Paid);
        assert_eq!(mar.paid_amount_cents, 5_000);
        assert_eq!(mar.status, InstallmentStatus::Partial);
        assert_eq!(mar.paid_date, None);

        assert_eq!(pass.applied.cents(), 25_000);
        assert!(pass.remainder.is_zero());
        assert_eq!(pass.touched, vec!["jan", "feb", "mar"]);
    }

    #[test]
    fn test_cascade_ignores_input_order() {
        let mut shuffled = schedule();
        shuffled.reverse();
        let pass = allocate(shuffled, Money::from_cents(15_000), &ctx(), Utc::now());

        // Jan fills first even though it arrived last
        assert_eq!(pass.installments[0].id, "jan");
        assert_eq!(pass.installments[0].paid_amount_cents, 10_000);
        assert_eq!(pass.installments[1].paid_amount_cents, 5_000);
        assert_eq!(pass.installments[2].paid_amount_cents, 0);
    }

    #[test]
    fn test_exact_payment_settles_to_exactly_zero() {
        let pass = allocate(
            vec![installment("jan", 10_000, 2_500, (2026, 1, 1))],
            Money::from_cents(7_500),
            &ctx(),
            Utc::now(),
        );

        let jan = &pass.installments[0];
        assert_eq!(jan.paid_amount_cents, 10_000);
        assert_eq!(jan.balance().cents(), 0);
        assert_eq!(jan.status, InstallmentStatus::Paid);
        assert!(pass.remainder.is_zero());
    }

    #[test]
    fn test_paid_installments_are_skipped() {
        let mut sched = schedule();
        sched[0].paid_amount_cents = 10_000;
        let pass = allocate(sched, Money::from_cents(5_000), &ctx(), Utc::now());

        assert_eq!(pass.installments[0].paid_amount_cents, 10_000);
        assert_eq!(pass.installments[1].paid_amount_cents, 5_000);
        assert_eq!(pass.touched, vec!["feb"]);
    }

    #[test]
    fn test_overflow_beyond_all_obligations_is_reported() {
        let pass = allocate(schedule(), Money::from_cents(35_000), &ctx(), Utc::now());

        assert!(pass.installments.iter().all(|i| i.is_paid()));
        assert!(pass.installments.iter().all(|i| i.balance().is_zero()));
        assert_eq!(pass.applied.cents(), 30_000);
        assert_eq!(pass.remainder.cents(), 5_000);
    }

    #[test]
    fn test_no_installment_ever_goes_negative() {
        let pass = allocate(schedule(), Money::from_cents(1_000_000), &ctx(), Utc::now());
        for i in &pass.installments {
            assert!(i.balance().cents() >= 0);
            assert!(i.paid_amount_cents <= i.amount_cents);
        }
    }

    #[test]
    fn test_payment_context_is_stamped_on_touched_only() {
        let mut c = ctx();
        c.note = Some("March cash payment".to_string());
        let pass = allocate(schedule(), Money::from_cents(10_000), &c, Utc::now());

        assert_eq!(pass.installments[0].payment_method, Some(PaymentMethod::Cash));
        assert_eq!(
            pass.installments[0].payment_note.as_deref(),
            Some("March cash payment")
        );
        assert_eq!(pass.installments[1].payment_method, None);
        assert_eq!(pass.installments[1].payment_note, None);
    }

    #[test]
    fn test_zero_amount_touches_nothing() {
        let pass = allocate(schedule(), Money::zero(), &ctx(), Utc::now());
        assert!(pass.touched.is_empty());
        assert!(pass.applied.is_zero());
        assert!(pass.remainder.is_zero());
    }
}
