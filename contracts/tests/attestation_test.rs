//! Signed command submission end to end: keys, nonces, and execution as the
//! recovered identity.

use std::sync::Arc;

use holdfast_contracts::attestation::{AttestationError, AttestedExecutor, SignedCommand};
use holdfast_contracts::lifecycle::{CreateRequest, EscrowEngine};
use holdfast_contracts::{Command, ContainerRef, ContainerStatus, EscrowError, MemoryContainerStore};
use holdfast_protocol::crypto::Keypair;
use holdfast_protocol::height::ManualHeight;
use holdfast_protocol::ledger::InMemoryLedger;
use holdfast_protocol::{EngineConfig, Identity, ValueLedger};

type Executor = AttestedExecutor<MemoryContainerStore, InMemoryLedger, ManualHeight>;

fn setup(originator: &Keypair) -> (Executor, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger
        .deposit(&Identity::from_public_key(&originator.public_key()), 5_000)
        .unwrap();
    let engine = EscrowEngine::new(
        EngineConfig::with_identities("operator", "custodian"),
        MemoryContainerStore::new(),
        ledger.clone(),
        Arc::new(ManualHeight::new(1)),
    );
    (AttestedExecutor::new(Arc::new(engine)), ledger)
}

fn create_cmd() -> Command {
    Command::Create(CreateRequest::new("bob", 1_200))
}

#[test]
fn signed_create_then_distribute() {
    let kp = Keypair::from_seed(&[3u8; 32]);
    let me = Identity::from_public_key(&kp.public_key());
    let (exec, ledger) = setup(&kp);

    let c = exec.submit(&SignedCommand::sign(&kp, create_cmd(), 1).unwrap()).unwrap();
    assert_eq!(c.originator, me);

    let distribute = Command::Distribute {
        reference: c.reference,
    };
    let c = exec.submit(&SignedCommand::sign(&kp, distribute, 2).unwrap()).unwrap();
    assert_eq!(c.status, ContainerStatus::Completed);
    assert_eq!(ledger.balance_of(&Identity::new("bob")), 1_200);
    assert_eq!(exec.last_nonce(&me), Some(2));
}

#[test]
fn replayed_nonce_is_rejected() {
    let kp = Keypair::from_seed(&[3u8; 32]);
    let (exec, _) = setup(&kp);

    let signed = SignedCommand::sign(&kp, create_cmd(), 5).unwrap();
    exec.submit(&signed).unwrap();
    assert!(matches!(
        exec.submit(&signed),
        Err(AttestationError::Replay { nonce: 5, last: 5, .. })
    ));

    let older = SignedCommand::sign(&kp, create_cmd(), 4).unwrap();
    assert!(matches!(exec.submit(&older), Err(AttestationError::Replay { .. })));
    assert_eq!(exec.engine().latest_reference().unwrap(), ContainerRef(1));
}

#[test]
fn nonces_are_per_identity() {
    let alice = Keypair::from_seed(&[3u8; 32]);
    let mallory = Keypair::from_seed(&[9u8; 32]);
    let (exec, _) = setup(&alice);

    exec.submit(&SignedCommand::sign(&alice, create_cmd(), 1).unwrap()).unwrap();

    // Same nonce, different signer: not a replay. The engine rejects it on
    // its own terms.
    let steal = Command::Distribute {
        reference: ContainerRef(1),
    };
    let err = exec
        .submit(&SignedCommand::sign(&mallory, steal, 1).unwrap())
        .unwrap_err();
    assert!(matches!(err, AttestationError::Escrow(EscrowError::AccessDenied { .. })));
}

#[test]
fn rejected_command_still_consumes_its_nonce() {
    let kp = Keypair::from_seed(&[3u8; 32]);
    let (exec, _) = setup(&kp);

    let premature = Command::Accept {
        reference: ContainerRef(1),
    };
    let signed = SignedCommand::sign(&kp, premature, 1).unwrap();
    assert!(matches!(
        exec.submit(&signed),
        Err(AttestationError::Escrow(EscrowError::InvalidReference { .. }))
    ));
    assert!(matches!(exec.submit(&signed), Err(AttestationError::Replay { .. })));
}

#[test]
fn forged_signature_never_reaches_the_engine() {
    let kp = Keypair::from_seed(&[3u8; 32]);
    let other = Keypair::from_seed(&[4u8; 32]);
    let (exec, _) = setup(&kp);

    let mut signed = SignedCommand::sign(&other, create_cmd(), 1).unwrap();
    signed.public_key = kp.public_key().to_hex();
    assert!(matches!(exec.submit(&signed), Err(AttestationError::Signature(_))));
    assert_eq!(exec.last_nonce(&Identity::from_public_key(&kp.public_key())), None);
}

#[test]
fn signed_command_json_round_trip() {
    let kp = Keypair::from_seed(&[3u8; 32]);
    let signed = SignedCommand::sign(&kp, create_cmd(), 7).unwrap();
    let json = serde_json::to_string(&signed).unwrap();
    let back: SignedCommand = serde_json::from_str(&json).unwrap();
    assert_eq!(back, signed);
    assert!(back.signer(&holdfast_protocol::crypto::Ed25519Verifier).is_ok());
}
