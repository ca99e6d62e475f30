//! Integration tests for dispute resolution.
//!
//! These tests exercise the full dispute lifecycle: initiation by either
//! party, evidence submission, operator adjudication, and the atomicity of
//! the paired payout when the ledger refuses one leg.

use std::sync::Arc;

use holdfast_contracts::lifecycle::{CreateRequest, EscrowEngine};
use holdfast_contracts::{ContainerRef, ContainerStatus, EscrowError, MemoryContainerStore, OperationKind};
use holdfast_protocol::crypto::blake3_hex;
use holdfast_protocol::height::ManualHeight;
use holdfast_protocol::ledger::InMemoryLedger;
use holdfast_protocol::{EngineConfig, Identity, ValueLedger};

type Engine = EscrowEngine<MemoryContainerStore, InMemoryLedger, ManualHeight>;

fn id(s: &str) -> Identity {
    Identity::new(s)
}

/// Helper: a funded engine with one pending container of 1000 from alice
/// to bob.
fn disputed_setup() -> (Engine, Arc<InMemoryLedger>, Arc<ManualHeight>, ContainerRef) {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.deposit(&id("alice"), 10_000).unwrap();
    let height = Arc::new(ManualHeight::new(50));
    let engine = EscrowEngine::new(
        EngineConfig::with_identities("operator", "custodian"),
        MemoryContainerStore::new(),
        ledger.clone(),
        height.clone(),
    );
    let r = engine
        .create(&id("alice"), CreateRequest::new("bob", 1_000))
        .unwrap()
        .reference;
    (engine, ledger, height, r)
}

// ---------------------------------------------------------------------------
// Initiation
// ---------------------------------------------------------------------------

#[test]
fn either_party_can_open_a_dispute() {
    for who in ["alice", "bob"] {
        let (engine, _, _, r) = disputed_setup();
        let c = engine.initiate_dispute(&id(who), r, "goods not delivered").unwrap();
        assert_eq!(c.status, ContainerStatus::Disputed);

        let case = c.dispute.unwrap();
        assert_eq!(case.initiated_by, id(who));
        assert_eq!(case.reason, "goods not delivered");
        assert_eq!(case.opened_at_height, 50);
        assert!(case.evidence.is_empty());
    }
}

#[test]
fn operator_and_strangers_cannot_open_disputes() {
    let (engine, _, _, r) = disputed_setup();
    for who in ["operator", "mallory"] {
        assert!(matches!(
            engine.initiate_dispute(&id(who), r, "x"),
            Err(EscrowError::AccessDenied {
                operation: OperationKind::InitiateDispute,
                ..
            })
        ));
    }
}

#[test]
fn dispute_requires_open_window() {
    let (engine, _, height, r) = disputed_setup();
    let termination = engine.container(r).unwrap().termination_height;
    height.set(termination + 1);
    assert!(matches!(
        engine.initiate_dispute(&id("alice"), r, "late"),
        Err(EscrowError::TimeframeExceeded { .. })
    ));
}

#[test]
fn disputed_container_blocks_normal_release() {
    let (engine, _, _, r) = disputed_setup();
    engine.initiate_dispute(&id("bob"), r, "x").unwrap();
    assert!(matches!(
        engine.distribute(&id("alice"), r),
        Err(EscrowError::StatusConflict {
            current: ContainerStatus::Disputed,
            ..
        })
    ));
    assert!(engine.initiate_dispute(&id("alice"), r, "again").is_err());
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[test]
fn both_parties_submit_evidence() {
    let (engine, _, height, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "late delivery").unwrap();

    let invoice = blake3_hex(b"invoice #42");
    let receipt = blake3_hex(b"courier receipt");
    engine.submit_evidence(&id("alice"), r, "invoice", &invoice).unwrap();
    height.advance(3);
    let c = engine.submit_evidence(&id("bob"), r, "delivery receipt", &receipt).unwrap();

    let evidence = c.dispute.unwrap().evidence;
    assert_eq!(evidence.len(), 2);
    assert_eq!(evidence[0].submitted_by, id("alice"));
    assert_eq!(evidence[0].data_hash, invoice);
    assert_eq!(evidence[1].height, 53);
}

#[test]
fn evidence_needs_a_real_digest() {
    let (engine, _, _, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "x").unwrap();
    let not_hex = "g".repeat(64);
    for bad in ["", "deadbeef", not_hex.as_str()] {
        assert!(matches!(
            engine.submit_evidence(&id("alice"), r, "bogus", bad),
            Err(EscrowError::InvalidQuantity(_))
        ));
    }
}

#[test]
fn evidence_outside_a_dispute_conflicts() {
    let (engine, _, _, r) = disputed_setup();
    let hash = blake3_hex(b"anything");
    assert!(matches!(
        engine.submit_evidence(&id("alice"), r, "early", &hash),
        Err(EscrowError::StatusConflict { .. })
    ));
    engine.initiate_dispute(&id("alice"), r, "x").unwrap();
    assert!(matches!(
        engine.submit_evidence(&id("carol"), r, "outsider", &hash),
        Err(EscrowError::AccessDenied { .. })
    ));
}

// ---------------------------------------------------------------------------
// Adjudication
// ---------------------------------------------------------------------------

#[test]
fn adjudication_splits_thirty_three_sixty_seven() {
    let (engine, ledger, _, r) = disputed_setup();
    engine.initiate_dispute(&id("bob"), r, "partial delivery").unwrap();

    let c = engine.adjudicate(&id("operator"), r, 33).unwrap();
    assert_eq!(c.status, ContainerStatus::Resolved);
    assert_eq!(c.quantity, 0);
    assert!(c.dispute.is_some());

    assert_eq!(ledger.balance_of(&id("alice")), 9_000 + 330);
    assert_eq!(ledger.balance_of(&id("bob")), 670);
    assert_eq!(ledger.balance_of(&id("custodian")), 0);
}

#[test]
fn only_the_operator_adjudicates() {
    let (engine, _, _, r) = disputed_setup();
    engine.initiate_dispute(&id("bob"), r, "x").unwrap();
    for who in ["alice", "bob"] {
        assert!(matches!(
            engine.adjudicate(&id(who), r, 50),
            Err(EscrowError::AccessDenied { .. })
        ));
    }
}

#[test]
fn allocation_above_one_hundred_is_rejected() {
    let (engine, _, _, r) = disputed_setup();
    engine.initiate_dispute(&id("bob"), r, "x").unwrap();
    assert!(matches!(
        engine.adjudicate(&id("operator"), r, 101),
        Err(EscrowError::InvalidQuantity(_))
    ));
    assert_eq!(engine.container(r).unwrap().status, ContainerStatus::Disputed);
}

#[test]
fn adjudicating_an_undisputed_container_conflicts() {
    let (engine, _, _, r) = disputed_setup();
    assert!(matches!(
        engine.adjudicate(&id("operator"), r, 50),
        Err(EscrowError::StatusConflict {
            current: ContainerStatus::Pending,
            ..
        })
    ));
}

#[test]
fn failed_leg_means_no_payout_at_all() {
    let (engine, ledger, _, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "x").unwrap();
    ledger.freeze_account(&id("bob"));

    assert!(matches!(
        engine.adjudicate(&id("operator"), r, 40),
        Err(EscrowError::DistributionFailed(_))
    ));
    // Neither leg landed; the container is still disputed and whole.
    assert_eq!(ledger.balance_of(&id("alice")), 9_000);
    assert_eq!(ledger.balance_of(&id("bob")), 0);
    assert_eq!(ledger.balance_of(&id("custodian")), 1_000);
    let c = engine.container(r).unwrap();
    assert_eq!(c.status, ContainerStatus::Disputed);
    assert_eq!(c.quantity, 1_000);

    ledger.unfreeze_account(&id("bob"));
    engine.adjudicate(&id("operator"), r, 40).unwrap();
    assert_eq!(ledger.balance_of(&id("bob")), 600);
}

#[test]
fn full_allocation_to_one_side_skips_the_empty_leg() {
    let (engine, ledger, _, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "x").unwrap();
    // A frozen recipient of a zero leg does not block the payout.
    ledger.freeze_account(&id("bob"));
    engine.adjudicate(&id("operator"), r, 100).unwrap();
    assert_eq!(ledger.balance_of(&id("alice")), 10_000);
}

#[test]
fn frozen_dispute_can_still_be_retrieved_by_operator() {
    let (engine, ledger, _, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "x").unwrap();
    engine.freeze(&id("operator"), r).unwrap();
    assert!(engine.adjudicate(&id("operator"), r, 50).is_err());
    engine.retrieve(&id("operator"), r).unwrap();
    assert_eq!(ledger.balance_of(&id("alice")), 10_000);
}

#[test]
fn released_lockdown_closes_the_old_dispute_case() {
    let (engine, _, height, r) = disputed_setup();
    engine.initiate_dispute(&id("alice"), r, "wrong item").unwrap();
    engine
        .submit_evidence(&id("alice"), r, "photo", &blake3_hex(b"photo"))
        .unwrap();

    engine.lockdown(&id("bob"), r).unwrap();
    height.advance(engine.config().lockdown_cooldown_blocks);
    let c = engine.release_lockdown(&id("operator"), r).unwrap();
    assert_eq!(c.status, ContainerStatus::Pending);
    assert!(c.dispute.is_none());

    // A fresh dispute starts without the earlier evidence.
    let c = engine.initiate_dispute(&id("bob"), r, "never arrived").unwrap();
    let case = c.dispute.unwrap();
    assert_eq!(case.initiated_by, id("bob"));
    assert!(case.evidence.is_empty());
}
