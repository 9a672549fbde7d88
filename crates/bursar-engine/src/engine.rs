//! # Payment Engine
//!
//! Orchestrates one payment request end to end.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(PaymentRequest)                                                  │
//! │                                                                         │
//! │  1. validate the request at the edge                                    │
//! │  2. acquire the per-fee lock (same fee serializes, others run free)     │
//! │  3. load fee + installments                                             │
//! │  4. cascade the amount across installments by due date                  │
//! │     (no installments? pay the fee directly)                             │
//! │  5. recompute the fee's paid total and status                           │
//! │  6. assign receipt numbers - idempotent, check-then-set:                │
//! │       fee receipt      : one fee-domain number, only if none yet        │
//! │       installment recs : ONE installment-domain number shared by        │
//! │                          every touched, not-yet-numbered installment    │
//! │  7. composite fee fully paid? settle its constituent fees too           │
//! │  8. persist everything in ONE transaction                               │
//! │  9. report any unapplied remainder - a warning, never an error          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 2-8 are a critical section per fee id: two concurrent payments on
//! the same fee never interleave their read-modify-write cycles.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bursar_core::{
    allocation::{self, PaymentContext},
    validation, CoreError, Fee, FeeStatus, Installment, InstallmentStatus, LedgerUpdate, Money,
    NumberingDomain, PaymentRequest,
};
use bursar_db::Database;

use crate::allocator::SequenceAllocator;
use crate::error::{EngineError, EngineResult};
use crate::locks::KeyedLocks;

// =============================================================================
// Allocation Result
// =============================================================================

/// What one payment request did to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    /// The target fee's receipt number after assignment.
    pub receipt_number: Option<String>,
    /// The target fee with recomputed paid total and status.
    pub fee: Fee,
    /// All of the fee's installments in due-date order, post-cascade.
    pub installments: Vec<Installment>,
    /// Constituent fees settled by combined-fee propagation.
    pub constituent_fees: Vec<Fee>,
    /// Unapplied overflow beyond every obligation, in cents. Positive means
    /// the payer handed over more than was owed; it is reported for manual
    /// handling, never silently swallowed.
    pub remainder_cents: i64,
    /// `false` when any receipt number on this result came from the
    /// non-atomic timestamp fallback.
    pub atomic_numbering: bool,
}

// =============================================================================
// Payment Engine
// =============================================================================

/// The payment allocation engine.
///
/// Cheap to clone; clones share the database pool and the per-fee lock
/// table.
#[derive(Debug, Clone)]
pub struct PaymentEngine {
    db: Database,
    allocator: SequenceAllocator,
    locks: KeyedLocks,
}

impl PaymentEngine {
    /// Creates an engine with a default-configured allocator.
    pub fn new(db: Database) -> Self {
        let allocator = SequenceAllocator::new(db.clone());
        PaymentEngine {
            db,
            allocator,
            locks: KeyedLocks::new(),
        }
    }

    /// Creates an engine around an existing allocator.
    pub fn with_allocator(db: Database, allocator: SequenceAllocator) -> Self {
        PaymentEngine {
            db,
            allocator,
            locks: KeyedLocks::new(),
        }
    }

    /// The engine's allocator, for callers that reserve numbers directly.
    pub fn allocator(&self) -> &SequenceAllocator {
        &self.allocator
    }

    /// Applies one payment request to the ledger.
    ///
    /// ## Guarantees
    /// - All-or-nothing: every row the request changes commits in one
    ///   transaction, or none does
    /// - Per-fee serialization: concurrent requests against the same fee
    ///   run one at a time
    /// - Idempotent numbering: an entity that already has a receipt number
    ///   keeps it, always
    /// - Conservation: for every touched record,
    ///   `paid + balance == amount - discount`
    pub async fn apply(&self, request: &PaymentRequest) -> EngineResult<AllocationResult> {
        validation::validate_entity_id("target_fee_id", &request.target_fee_id)?;
        validation::validate_payment_amount(request.amount_cents)?;

        let check_details = match &request.check_details {
            Some(details) => Some(serde_json::to_string(details).map_err(|e| {
                CoreError::InvalidCheckDetails {
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };
        let ctx = PaymentContext::from_request(request, check_details);

        // Critical section: everything from the load to the commit.
        let _guard = self.locks.acquire(&request.target_fee_id).await;

        let mut fee = self
            .db
            .fees()
            .get_by_id(&request.target_fee_id)
            .await?
            .ok_or_else(|| EngineError::AllocationTargetNotFound {
                entity: "Fee",
                id: request.target_fee_id.clone(),
            })?;

        let installments = self.db.fees().installments_for_fee(&fee.id).await?;
        let now = Utc::now();
        let amount = Money::from_cents(request.amount_cents);

        debug!(
            fee_id = %fee.id,
            amount = %amount,
            installments = installments.len(),
            "Applying payment"
        );

        // ---- Cascade --------------------------------------------------------

        let (mut installments, mut changed, remainder) = if installments.is_empty() {
            // No schedule: the payment lands on the fee itself.
            let remainder = fee.apply_direct_payment(amount, now);
            (Vec::new(), HashSet::new(), remainder)
        } else {
            // The fee-level discount is applied once, before distribution:
            // the schedule may absorb at most the fee's outstanding net
            // balance, even when installments were laid out off the gross
            // amount. Anything beyond it joins the reported remainder.
            let allocatable = amount.min(fee.balance());
            let excess = amount - allocatable;
            let pass = allocation::allocate(installments, allocatable, &ctx, now);
            fee.recompute_from_installments(&pass.installments, now);
            let changed: HashSet<String> = pass.touched.iter().cloned().collect();
            (pass.installments, changed, pass.remainder + excess)
        };

        // ---- Receipt numbering (check-then-set) -----------------------------

        let mut atomic_numbering = true;

        if fee.receipt_number.is_none() {
            let reservation = self
                .allocator
                .reserve_or_fallback(&fee.school_id, NumberingDomain::Fee, 1)
                .await?;
            atomic_numbering &= reservation.atomic;
            fee.receipt_number = reservation.numbers.into_iter().next();
            fee.updated_at = now;
        }

        // Every touched installment without a number gets the SAME
        // installment-domain number: they are one payment, one receipt.
        let unnumbered: Vec<usize> = installments
            .iter()
            .enumerate()
            .filter(|(_, i)| changed.contains(&i.id) && i.receipt_number.is_none())
            .map(|(idx, _)| idx)
            .collect();

        if !unnumbered.is_empty() {
            let reservation = self
                .allocator
                .reserve_or_fallback(&fee.school_id, NumberingDomain::Installment, 1)
                .await?;
            atomic_numbering &= reservation.atomic;
            let number = reservation.numbers.into_iter().next();
            for idx in unnumbered {
                installments[idx].receipt_number = number.clone();
                installments[idx].updated_at = now;
                changed.insert(installments[idx].id.clone());
            }
        }

        // ---- Combined-fee propagation ---------------------------------------

        let mut constituent_fees = Vec::new();
        let mut constituent_installments = Vec::new();
        let mut new_installments = Vec::new();

        if fee.fee_type.is_composite() && fee.derived_status() == FeeStatus::Paid {
            self.settle_constituents(
                &fee,
                &ctx,
                now,
                &mut constituent_fees,
                &mut constituent_installments,
                &mut new_installments,
            )
            .await?;
        }

        // ---- Persist, all-or-nothing ----------------------------------------

        let mut update = LedgerUpdate {
            fees: vec![fee.clone()],
            installments: installments
                .iter()
                .filter(|i| changed.contains(&i.id))
                .cloned()
                .collect(),
            new_installments: new_installments.clone(),
        };
        update.fees.extend(constituent_fees.iter().cloned());
        update
            .installments
            .extend(constituent_installments.iter().cloned());

        self.db.fees().apply_ledger_update(&update).await?;

        if remainder.is_positive() {
            warn!(
                fee_id = %fee.id,
                remainder = %remainder,
                "Payment exceeds every outstanding obligation; remainder unapplied"
            );
        }

        info!(
            fee_id = %fee.id,
            receipt = fee.receipt_number.as_deref().unwrap_or("-"),
            applied = %(amount - remainder),
            status = ?fee.status,
            "Payment committed"
        );

        Ok(AllocationResult {
            receipt_number: fee.receipt_number.clone(),
            fee,
            installments,
            constituent_fees,
            remainder_cents: remainder.cents(),
            atomic_numbering,
        })
    }

    /// Settles the constituent fees of a fully paid composite fee.
    ///
    /// Each constituent is marked paid in full, reuses the composite fee's
    /// receipt number if it has none of its own, and ends up with at least
    /// one paid installment so list views agree with the composite. A
    /// missing constituent record is logged and skipped, never fatal: the
    /// composite payment itself already succeeded.
    async fn settle_constituents(
        &self,
        composite: &Fee,
        ctx: &PaymentContext,
        now: chrono::DateTime<Utc>,
        constituent_fees: &mut Vec<Fee>,
        constituent_installments: &mut Vec<Installment>,
        new_installments: &mut Vec<Installment>,
    ) -> EngineResult<()> {
        for fee_type in composite.fee_type.constituents() {
            let found = self
                .db
                .fees()
                .find_by_student_and_type(&composite.school_id, &composite.student_id, *fee_type)
                .await?;

            let mut constituent = match found {
                Some(f) => f,
                None => {
                    warn!(
                        student_id = %composite.student_id,
                        fee_type = ?fee_type,
                        "Composite fee paid but constituent fee record is missing; skipping"
                    );
                    continue;
                }
            };

            if constituent.status == FeeStatus::Paid {
                continue;
            }

            constituent.mark_settled(now);
            if constituent.receipt_number.is_none() {
                constituent.receipt_number = composite.receipt_number.clone();
            }

            let mut schedule = self.db.fees().installments_for_fee(&constituent.id).await?;
            if schedule.is_empty() {
                new_installments.push(Installment::synthesized_paid(&constituent, ctx, now));
            } else {
                for installment in schedule.iter_mut() {
                    if installment.is_paid() {
                        continue;
                    }
                    installment.paid_amount_cents = installment.amount_cents;
                    installment.status = InstallmentStatus::Paid;
                    installment.paid_date = Some(ctx.date);
                    installment.payment_method = Some(ctx.method);
                    if installment.receipt_number.is_none() {
                        installment.receipt_number = constituent.receipt_number.clone();
                    }
                    installment.updated_at = now;
                    constituent_installments.push(installment.clone());
                }
            }

            debug!(
                constituent_id = %constituent.id,
                fee_type = ?fee_type,
                "Constituent fee settled via composite payment"
            );
            constituent_fees.push(constituent);
        }

        Ok(())
    }
}
