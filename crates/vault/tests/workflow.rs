use chrono::NaiveDate;
use envelope::local::LocalKeyHolder;
use envelope::DecryptError;
use inv_vault_core::{Bytes32, InvoiceDraft, RawTx};
use ledger::mock::{MockHistory, MockLedger};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use vault::{BalanceState, Session, Vault, VaultError};

const SENDER: &str = "0x1111111111111111111111111111111111111111";
const RECEIVER: &str = "0x2222222222222222222222222222222222222222";

fn issued_on() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn draft() -> InvoiceDraft {
    InvoiceDraft::new("Consulting October", "8.1")
        .with_item("Design review", "60")
        .with_item("Implementation", "40")
        .due_on(NaiveDate::from_ymd_opt(2026, 11, 17).unwrap())
}

struct Fixture {
    _dir: TempDir,
    vault: Vault,
    ledger: Arc<MockLedger>,
    receiver: LocalKeyHolder,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let ledger = MockLedger::new(SENDER);
    let vault = Vault::open(&dir.path().join("db"), dir.path().join("audit.jsonl"), ledger.clone())
        .unwrap()
        .with_paging(2, 3);
    Fixture {
        _dir: dir,
        vault,
        ledger,
        receiver: LocalKeyHolder::generate(RECEIVER),
    }
}

#[tokio::test]
async fn issuing_records_a_local_entry() {
    let f = fixture();
    let issued = f
        .vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();

    assert_eq!(f.ledger.submission_count(), 1);
    assert_eq!(issued.invoice.total_amount_with_vat, Decimal::from_str("108.1").unwrap());

    let stored = f.vault.log().get(&issued.invoice.invoice_reference).unwrap().unwrap();
    assert_eq!(stored, issued.entry);
    assert_eq!(stored.receiver_key, f.receiver.public_key().receiver_key_id());
    assert_eq!(stored.tx_hash, issued.receipt.tx_hash);

    let events = f.vault.audit().read_all().unwrap();
    assert_eq!(events.last().unwrap().event_type, "invoice_submitted");
}

#[tokio::test]
async fn rejected_submission_leaves_no_entry() {
    let f = fixture();
    f.ledger.set_rejecting(true);

    let err = f
        .vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Ledger(_)));
    assert_eq!(f.ledger.submission_count(), 1);
    assert!(f.vault.log().list().unwrap().is_empty());
    let events = f.vault.audit().read_all().unwrap();
    assert_eq!(events.last().unwrap().event_type, "submission_failed");
}

#[tokio::test]
async fn anchored_invoice_survives_a_failed_local_write() {
    let f = fixture();
    let first = f
        .vault
        .issue_invoice_with(&draft(), &f.receiver.public_key(), issued_on(), &mut StdRng::seed_from_u64(7))
        .await
        .unwrap();

    // Same seed, same reference: the ledger accepts it, the local log cannot.
    let err = f
        .vault
        .issue_invoice_with(&draft(), &f.receiver.public_key(), issued_on(), &mut StdRng::seed_from_u64(7))
        .await
        .unwrap_err();

    let (entry, invoice_id) = match err {
        VaultError::AnchoredButUnrecorded { entry, invoice_id, .. } => (entry, invoice_id),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(entry.invoice_reference, first.invoice.invoice_reference);
    assert_ne!(entry.tx_hash, first.receipt.tx_hash);
    assert_eq!(f.ledger.submission_count(), 2);
    assert!(f.ledger.records().iter().any(|r| r.id == invoice_id));
    assert_eq!(f.vault.log().list().unwrap().len(), 1);

    let events = f.vault.audit().read_all().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.event_type, "invoice_anchored_unrecorded");
    assert_eq!(last.invoice_reference.as_deref(), Some(entry.invoice_reference.as_str()));
    assert_eq!(last.tx_hash.as_deref(), Some(entry.tx_hash.as_str()));
    assert_eq!(last.invoice_id, Some(invoice_id.to_hex()));
    let amount_due = Decimal::from_str(last.amount_due.as_deref().unwrap()).unwrap();
    assert_eq!(amount_due, Decimal::from_str("108.1").unwrap());
    assert_eq!(last.due_date.as_deref(), Some("2026-11-17"));
    assert!(last.error.is_some());
}

#[tokio::test]
async fn prepared_invoice_touches_nothing() {
    let f = fixture();
    let prepared = vault::prepare_invoice(&draft(), &f.receiver.public_key(), issued_on()).unwrap();

    assert_eq!(prepared.invoice.total_amount_with_vat, Decimal::from_str("108.1").unwrap());
    assert_eq!(prepared.envelope.receiver_key_id, f.receiver.public_key().receiver_key_id());
    assert_eq!(f.ledger.submission_count(), 0);
    assert!(f.vault.log().list().unwrap().is_empty());
    assert!(f.vault.audit().read_all().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_draft_never_reaches_the_ledger() {
    let f = fixture();
    let bad = InvoiceDraft::new("Bad", "abc")
        .with_item("x", "1")
        .due_on(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());

    let err = f
        .vault
        .issue_invoice(&bad, &f.receiver.public_key(), issued_on())
        .await
        .unwrap_err();

    match err {
        VaultError::InvalidDraft(errs) => assert_eq!(errs.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(f.ledger.submission_count(), 0);
}

#[tokio::test]
async fn receiver_opens_what_the_sender_issued() {
    let f = fixture();
    let issued = f
        .vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();

    let session = Session::connect(RECEIVER);
    let key = f.vault.receiver_key(&session, &f.receiver).await.unwrap();
    let inbox = f.vault.received_invoices(&key.receiver_key_id()).await.unwrap();
    assert_eq!(inbox.len(), 1);

    let opened = f.vault.open_invoice(&session, &f.receiver, &inbox[0]).await.unwrap();
    assert_eq!(opened, issued.invoice);

    let request = f.vault.payment_request(&session, &inbox[0], &opened).unwrap();
    assert_eq!(request.to, SENDER);
    assert_eq!(request.value, 108_100_000_000_000_000_000);
    assert_eq!(request.data, issued.invoice.invoice_reference);
}

#[tokio::test]
async fn tampered_anchor_is_detected() {
    let f = fixture();
    f.vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();

    let mut record = f.ledger.records().remove(0);
    record.integrity_hash = Bytes32([0xee; 32]);

    let session = Session::connect(RECEIVER);
    let err = f.vault.open_invoice(&session, &f.receiver, &record).await.unwrap_err();
    assert!(matches!(err, VaultError::IntegrityMismatch { .. }));
}

#[tokio::test]
async fn concurrent_opens_prompt_once() {
    let f = fixture();
    f.vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();
    let record = f.ledger.records().remove(0);

    let session = Session::connect(RECEIVER);
    let (a, b) = tokio::join!(
        f.vault.open_invoice(&session, &f.receiver, &record),
        f.vault.open_invoice(&session, &f.receiver, &record),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(f.receiver.prompt_count(), 1);
    assert!(session.cached(&record.id).is_some());

    // A fresh session starts with an empty cache.
    session.disconnect();
    let session = Session::connect(RECEIVER);
    assert!(session.cached(&record.id).is_none());
    f.vault.open_invoice(&session, &f.receiver, &record).await.unwrap();
    assert_eq!(f.receiver.prompt_count(), 2);
}

#[tokio::test]
async fn refusal_and_foreign_ciphertext_are_distinct() {
    let f = fixture();
    f.vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();
    let record = f.ledger.records().remove(0);
    let session = Session::connect(RECEIVER);

    f.receiver.set_refusing(true);
    let err = f.vault.open_invoice(&session, &f.receiver, &record).await.unwrap_err();
    assert!(matches!(err, VaultError::Decrypt(DecryptError::Denied(_))));
    assert!(session.cached(&record.id).is_none());

    let stranger = LocalKeyHolder::generate(RECEIVER);
    let err = f.vault.open_invoice(&session, &stranger, &record).await.unwrap_err();
    assert!(matches!(err, VaultError::Decrypt(DecryptError::Failed(_))));

    f.receiver.set_refusing(false);
    assert!(f.vault.open_invoice(&session, &f.receiver, &record).await.is_ok());
}

#[tokio::test]
async fn payments_settle_issued_invoices() {
    let f = fixture();
    let first = f
        .vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();
    let second = f
        .vault
        .issue_invoice(
            &InvoiceDraft::new("Hosting", "0").with_item("Server", "3"),
            &f.receiver.public_key(),
            issued_on(),
        )
        .await
        .unwrap();

    let session = Session::connect(RECEIVER);
    let record = f
        .ledger
        .records()
        .into_iter()
        .find(|r| r.id == first.receipt.invoice_id)
        .unwrap();
    let opened = f.vault.open_invoice(&session, &f.receiver, &record).await.unwrap();
    let request = f.vault.payment_request(&session, &record, &opened).unwrap();

    let history = MockHistory::new();
    history.push(RawTx {
        hash: "0xabc1".into(),
        from: request.from.clone(),
        to: Some(request.to.clone()),
        value: request.value,
        input: request.data.clone(),
        timestamp: 1_800_000_000,
        is_error: false,
    });
    history.push(RawTx {
        hash: "0xabc2".into(),
        from: RECEIVER.into(),
        to: Some(SENDER.into()),
        value: 1_000_000_000_000_000_000,
        input: second.invoice.invoice_reference.to_uppercase(),
        timestamp: 1_800_000_100,
        is_error: false,
    });
    // Reverted.
    history.push(RawTx {
        hash: "0xabc3".into(),
        from: RECEIVER.into(),
        to: Some(SENDER.into()),
        value: 5_000_000_000_000_000_000,
        input: second.invoice.invoice_reference.clone(),
        timestamp: 1_800_000_200,
        is_error: true,
    });

    let report = f.vault.reconcile(SENDER, &*history, issued_on()).await.unwrap();
    assert_eq!(report.balances.len(), 2);

    let paid = report.balance(&first.invoice.invoice_reference).unwrap();
    assert_eq!(paid.state, BalanceState::Paid);
    assert_eq!(paid.outstanding, Decimal::ZERO);

    let partial = report.balance(&second.invoice.invoice_reference).unwrap();
    assert_eq!(partial.state, BalanceState::PartiallyPaid);
    assert_eq!(partial.paid, Decimal::ONE);
    assert_eq!(partial.outstanding, Decimal::from(2));
    assert_eq!(report.summary.payments.len(), 2);

    let again = f.vault.reconcile(SENDER, &*history, issued_on()).await.unwrap();
    assert_eq!(again, report);
}

#[tokio::test]
async fn unavailable_history_is_an_error() {
    let f = fixture();
    f.vault
        .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
        .await
        .unwrap();
    let history = MockHistory::new();
    history.set_available(false);

    let err = f.vault.reconcile(SENDER, &*history, issued_on()).await.unwrap_err();
    assert!(matches!(err, VaultError::History(_)));
    let events = f.vault.audit().read_all().unwrap();
    assert_eq!(events.last().unwrap().event_type, "reconciliation_failed");
}

#[tokio::test]
async fn listings_walk_every_page() {
    let f = fixture();
    for _ in 0..5 {
        f.vault
            .issue_invoice(&draft(), &f.receiver.public_key(), issued_on())
            .await
            .unwrap();
    }
    f.ledger.fail_next_reads(1);

    let sender = Session::connect(SENDER);
    assert_eq!(f.vault.sent_invoices(&sender).await.unwrap().len(), 5);
    let received = f
        .vault
        .received_invoices(&f.receiver.public_key().receiver_key_id())
        .await
        .unwrap();
    assert_eq!(received.len(), 5);

    let other = Session::connect("0x3333333333333333333333333333333333333333");
    assert!(f.vault.sent_invoices(&other).await.unwrap().is_empty());
}
