//! Integration tests for the payment engine: cascade, numbering,
//! combined-fee propagation and all-or-nothing persistence.

use bursar_core::{
    CheckDetails, Fee, FeeStatus, FeeType, Installment, InstallmentStatus, NumberFormat,
    PaymentMethod, PaymentRequest, SchoolSettings,
};
use bursar_db::{Database, DbConfig};
use bursar_engine::{EngineError, PaymentEngine};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Structured numbering for both domains, so receipt assertions are
/// deterministic: fee receipts `1/2026, 2/2026, ...`, installment receipts
/// `1, 2, ...`.
async fn configure_numbering(db: &Database, school_id: &str) {
    let mut settings = SchoolSettings::defaults_for(school_id, 2026, Utc::now());
    settings.fee_number_format = NumberFormat::Year;
    settings.fee_number_prefix = String::new();
    settings.installment_number_format = NumberFormat::Sequential;
    db.settings().upsert(&settings).await.unwrap();
}

fn fee(school: &str, student: &str, fee_type: FeeType, amount: i64, discount: i64) -> Fee {
    let now = Utc::now();
    Fee {
        id: Uuid::new_v4().to_string(),
        school_id: school.to_string(),
        student_id: student.to_string(),
        fee_type,
        amount_cents: amount,
        discount_cents: discount,
        paid_cents: 0,
        status: FeeStatus::Unpaid,
        receipt_number: None,
        created_at: now,
        updated_at: now,
    }
}

fn installment(fee_id: &str, amount: i64, due: (i32, u32, u32)) -> Installment {
    let now = Utc::now();
    Installment {
        id: Uuid::new_v4().to_string(),
        fee_id: fee_id.to_string(),
        amount_cents: amount,
        paid_amount_cents: 0,
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

fn cash_payment(fee_id: &str, amount: i64) -> PaymentRequest {
    PaymentRequest {
        target_fee_id: fee_id.to_string(),
        amount_cents: amount,
        method: PaymentMethod::Cash,
        note: None,
        check_details: None,
        payment_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
    }
}

/// Inserts a fee with three monthly 100.00 installments.
async fn three_installment_fee(db: &Database, school: &str, student: &str) -> Fee {
    let f = fee(school, student, FeeType::Tuition, 30_000, 0);
    db.fees().insert_fee(&f).await.unwrap();
    for (m, amount) in [(1, 10_000), (2, 10_000), (3, 10_000)] {
        db.fees()
            .insert_installment(&installment(&f.id, amount, (2026, m, 1)))
            .await
            .unwrap();
    }
    f
}

/// `paid + balance == amount - discount` on every record a payment touched.
fn assert_conservation(fee: &Fee, installments: &[Installment]) {
    assert_eq!(
        fee.paid_cents + fee.balance().cents(),
        fee.amount_cents - fee.discount_cents
    );
    for i in installments {
        assert_eq!(i.paid_amount_cents + i.balance().cents(), i.amount_cents);
        assert!(i.paid_amount_cents >= 0);
        assert!(i.paid_amount_cents <= i.amount_cents);
    }
}

// =============================================================================
// Cascade
// =============================================================================

#[tokio::test]
async fn test_overpayment_cascades_across_installments() {
    init_tracing();
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 25_000)).await.unwrap();

    // Paid / Paid / Partial(50.00), strictly by due date
    let statuses: Vec<_> = result.installments.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            InstallmentStatus::Paid,
            InstallmentStatus::Paid,
            InstallmentStatus::Partial
        ]
    );
    assert_eq!(result.installments[2].paid_amount_cents, 5_000);
    assert_eq!(result.installments[2].balance().cents(), 5_000);

    assert_eq!(result.fee.paid_cents, 25_000);
    assert_eq!(result.fee.status, FeeStatus::Partial);
    assert_eq!(result.remainder_cents, 0);
    assert!(result.atomic_numbering);
    assert_conservation(&result.fee, &result.installments);

    // And all of it actually committed
    let reloaded = db.fees().get_by_id(&f.id).await.unwrap().unwrap();
    assert_eq!(reloaded.paid_cents, 25_000);
    assert_eq!(reloaded.status, FeeStatus::Partial);
    let persisted = db.fees().installments_for_fee(&f.id).await.unwrap();
    assert_eq!(persisted[0].status, InstallmentStatus::Paid);
    assert_eq!(persisted[2].paid_amount_cents, 5_000);
}

#[tokio::test]
async fn test_remainder_beyond_all_obligations_is_reported_not_lost() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 40_000)).await.unwrap();

    assert!(result.installments.iter().all(|i| i.is_paid()));
    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_eq!(result.fee.paid_cents, 30_000);
    assert_eq!(result.remainder_cents, 10_000);
    assert_conservation(&result.fee, &result.installments);
}

#[tokio::test]
async fn test_exact_payment_settles_to_zero_balance() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 30_000)).await.unwrap();

    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_eq!(result.fee.balance().cents(), 0);
    assert_eq!(result.remainder_cents, 0);
}

#[tokio::test]
async fn test_discounted_fee_schedule_absorbs_only_net_due() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;

    // Installments laid out off the 300.00 gross amount, but a 50.00
    // fee-level discount means only 250.00 is actually owed
    let f = fee("school-1", "student-1", FeeType::Tuition, 30_000, 5_000);
    db.fees().insert_fee(&f).await.unwrap();
    for m in 1..=3u32 {
        db.fees()
            .insert_installment(&installment(&f.id, 10_000, (2026, m, 1)))
            .await
            .unwrap();
    }

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 30_000)).await.unwrap();

    // The schedule absorbed net due and nothing more; the overage is
    // reported, never swallowed
    let installment_paid: i64 = result
        .installments
        .iter()
        .map(|i| i.paid_amount_cents)
        .sum();
    assert_eq!(installment_paid, 25_000);
    assert_eq!(result.remainder_cents, 5_000);
    assert_eq!(result.fee.paid_cents, 25_000);
    assert_eq!(result.fee.balance().cents(), 0);
    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_conservation(&result.fee, &result.installments);

    // Cascade still walked by due date: Paid / Paid / Partial(50.00)
    let statuses: Vec<_> = result.installments.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            InstallmentStatus::Paid,
            InstallmentStatus::Paid,
            InstallmentStatus::Partial
        ]
    );

    let reloaded = db.fees().get_by_id(&f.id).await.unwrap().unwrap();
    assert_eq!(reloaded.paid_cents, 25_000);
    assert_eq!(reloaded.status, FeeStatus::Paid);
}

#[tokio::test]
async fn test_direct_payment_when_fee_has_no_installments() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    // 100.00 gross with a 20.00 discount: 80.00 is owed
    let f = fee("school-1", "student-1", FeeType::Other, 10_000, 2_000);
    db.fees().insert_fee(&f).await.unwrap();

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 6_000)).await.unwrap();

    assert!(result.installments.is_empty());
    assert_eq!(result.fee.paid_cents, 6_000);
    assert_eq!(result.fee.status, FeeStatus::Partial);
    assert_eq!(result.fee.balance().cents(), 2_000);

    // Settling the rest
    let result = engine.apply(&cash_payment(&f.id, 2_000)).await.unwrap();
    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_eq!(result.remainder_cents, 0);
}

// =============================================================================
// Receipt Numbering
// =============================================================================

#[tokio::test]
async fn test_receipt_numbers_are_assigned_once_and_shared() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());
    let first = engine.apply(&cash_payment(&f.id, 25_000)).await.unwrap();

    let fee_receipt = first.receipt_number.clone().unwrap();
    assert_eq!(fee_receipt, "1/2026");

    // One payment, one installment receipt, shared by every touched row
    let inst_receipts: Vec<_> = first
        .installments
        .iter()
        .map(|i| i.receipt_number.clone().unwrap())
        .collect();
    assert_eq!(inst_receipts, vec!["1", "1", "1"]);

    // A second payment must not renumber anything already numbered
    let second = engine.apply(&cash_payment(&f.id, 5_000)).await.unwrap();
    assert_eq!(second.receipt_number.as_deref(), Some("1/2026"));
    assert!(second
        .installments
        .iter()
        .all(|i| i.receipt_number.as_deref() == Some("1")));

    // The counters moved exactly once per domain
    let persisted = db.fees().get_by_id(&f.id).await.unwrap().unwrap();
    assert_eq!(persisted.receipt_number.as_deref(), Some("1/2026"));
}

#[tokio::test]
async fn test_numbering_falls_back_flagged_under_auto_settings() {
    let db = test_db().await;
    // No settings record: both domains default to auto numbering
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&cash_payment(&f.id, 10_000)).await.unwrap();

    assert!(!result.atomic_numbering);
    assert!(result.receipt_number.as_deref().unwrap().starts_with("R-"));
    assert!(result.installments[0].receipt_number.is_some());
}

// =============================================================================
// Combined-Fee Propagation
// =============================================================================

#[tokio::test]
async fn test_paying_composite_fee_settles_constituents() {
    init_tracing();
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;

    let composite = fee(
        "school-1",
        "student-1",
        FeeType::TransportationAndTuition,
        30_000,
        0,
    );
    let tuition = fee("school-1", "student-1", FeeType::Tuition, 20_000, 0);
    let transport = fee("school-1", "student-1", FeeType::Transportation, 10_000, 0);
    db.fees().insert_fee(&composite).await.unwrap();
    db.fees().insert_fee(&tuition).await.unwrap();
    db.fees().insert_fee(&transport).await.unwrap();

    // Tuition has a schedule of its own; transportation has none
    db.fees()
        .insert_installment(&installment(&tuition.id, 10_000, (2026, 1, 1)))
        .await
        .unwrap();
    db.fees()
        .insert_installment(&installment(&tuition.id, 10_000, (2026, 2, 1)))
        .await
        .unwrap();

    let engine = PaymentEngine::new(db.clone());
    let result = engine
        .apply(&cash_payment(&composite.id, 30_000))
        .await
        .unwrap();

    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_eq!(result.constituent_fees.len(), 2);

    // Both constituents settled and carrying the composite's receipt
    let receipt = result.receipt_number.clone().unwrap();
    for constituent in &result.constituent_fees {
        assert_eq!(constituent.status, FeeStatus::Paid);
        assert_eq!(constituent.balance().cents(), 0);
        assert_eq!(constituent.receipt_number.as_deref(), Some(&*receipt));
    }

    // Tuition's existing installments were marked paid
    let tuition_insts = db.fees().installments_for_fee(&tuition.id).await.unwrap();
    assert_eq!(tuition_insts.len(), 2);
    assert!(tuition_insts.iter().all(|i| i.is_paid()));
    assert!(tuition_insts
        .iter()
        .all(|i| i.status == InstallmentStatus::Paid));

    // Transportation got a synthesized paid installment so no view can show
    // it unpaid while the composite shows paid
    let transport_insts = db.fees().installments_for_fee(&transport.id).await.unwrap();
    assert_eq!(transport_insts.len(), 1);
    assert_eq!(transport_insts[0].amount_cents, 10_000);
    assert!(transport_insts[0].is_paid());
    assert_eq!(transport_insts[0].receipt_number.as_deref(), Some(&*receipt));

    // Persisted constituent state matches
    let tuition_reloaded = db.fees().get_by_id(&tuition.id).await.unwrap().unwrap();
    assert_eq!(tuition_reloaded.status, FeeStatus::Paid);
    assert_eq!(tuition_reloaded.paid_cents, 20_000);
}

#[tokio::test]
async fn test_partial_composite_payment_does_not_touch_constituents() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;

    let composite = fee(
        "school-1",
        "student-1",
        FeeType::TransportationAndTuition,
        30_000,
        0,
    );
    let tuition = fee("school-1", "student-1", FeeType::Tuition, 20_000, 0);
    db.fees().insert_fee(&composite).await.unwrap();
    db.fees().insert_fee(&tuition).await.unwrap();

    let engine = PaymentEngine::new(db.clone());
    let result = engine
        .apply(&cash_payment(&composite.id, 15_000))
        .await
        .unwrap();

    assert_eq!(result.fee.status, FeeStatus::Partial);
    assert!(result.constituent_fees.is_empty());

    let tuition_reloaded = db.fees().get_by_id(&tuition.id).await.unwrap().unwrap();
    assert_eq!(tuition_reloaded.status, FeeStatus::Unpaid);
    assert_eq!(tuition_reloaded.paid_cents, 0);
}

#[tokio::test]
async fn test_missing_constituent_is_skipped_not_fatal() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;

    let composite = fee(
        "school-1",
        "student-1",
        FeeType::TransportationAndTuition,
        30_000,
        0,
    );
    let tuition = fee("school-1", "student-1", FeeType::Tuition, 20_000, 0);
    // No transportation fee record exists
    db.fees().insert_fee(&composite).await.unwrap();
    db.fees().insert_fee(&tuition).await.unwrap();

    let engine = PaymentEngine::new(db.clone());
    let result = engine
        .apply(&cash_payment(&composite.id, 30_000))
        .await
        .unwrap();

    assert_eq!(result.fee.status, FeeStatus::Paid);
    assert_eq!(result.constituent_fees.len(), 1);
    assert_eq!(result.constituent_fees[0].fee_type, FeeType::Tuition);
}

// =============================================================================
// Check Payments
// =============================================================================

#[tokio::test]
async fn test_check_details_stamped_on_touched_installments() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let mut request = cash_payment(&f.id, 10_000);
    request.method = PaymentMethod::Check;
    request.note = Some("January check".to_string());
    request.check_details = Some(CheckDetails {
        number: "000123".to_string(),
        bank: "First National".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 3, 8),
    });

    let engine = PaymentEngine::new(db.clone());
    let result = engine.apply(&request).await.unwrap();

    let jan = &result.installments[0];
    assert_eq!(jan.payment_method, Some(PaymentMethod::Check));
    assert_eq!(jan.payment_note.as_deref(), Some("January check"));
    let details: CheckDetails =
        serde_json::from_str(jan.check_details.as_deref().unwrap()).unwrap();
    assert_eq!(details.number, "000123");
    assert_eq!(details.bank, "First National");

    // Untouched installments carry nothing
    assert!(result.installments[1].check_details.is_none());
    assert!(result.installments[1].payment_method.is_none());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_payments_on_same_fee_serialize() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = engine.clone();
        let fee_id = f.id.clone();
        handles.push(tokio::spawn(async move {
            engine.apply(&cash_payment(&fee_id, 15_000)).await.unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    // Both payments landed in full: a lost update would leave 150.00
    let reloaded = db.fees().get_by_id(&f.id).await.unwrap().unwrap();
    assert_eq!(reloaded.paid_cents, 30_000);
    assert_eq!(reloaded.status, FeeStatus::Paid);

    let installments = db.fees().installments_for_fee(&f.id).await.unwrap();
    assert!(installments.iter().all(|i| i.is_paid()));
    assert_conservation(&reloaded, &installments);
}

// =============================================================================
// Error Taxonomy
// =============================================================================

#[tokio::test]
async fn test_missing_fee_is_allocation_target_not_found() {
    let db = test_db().await;
    let engine = PaymentEngine::new(db);

    let err = engine
        .apply(&cash_payment("no-such-fee", 10_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::AllocationTargetNotFound { entity: "Fee", .. }
    ));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let db = test_db().await;
    configure_numbering(&db, "school-1").await;
    let f = three_installment_fee(&db, "school-1", "student-1").await;

    let engine = PaymentEngine::new(db.clone());

    for amount in [0, -5_000] {
        let err = engine.apply(&cash_payment(&f.id, amount)).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }

    // Nothing was touched
    let reloaded = db.fees().get_by_id(&f.id).await.unwrap().unwrap();
    assert_eq!(reloaded.paid_cents, 0);
    assert!(reloaded.receipt_number.is_none());
}
