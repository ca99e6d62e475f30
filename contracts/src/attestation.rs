//! # Signed Command Submission
//!
//! A validation layer on top of the engine. A caller proves who they are by
//! signing a [`Command`] and a nonce with Ed25519; the executor recovers
//! their identity from the public key and runs the command as them.
//!
//! ## Digest
//!
//! ```text
//! BLAKE3( "holdfast/command/v1" || serde_json((command, nonce)) )
//! ```
//!
//! The domain tag keeps these signatures from being valid for anything
//! else the same key might sign.
//!
//! ## Replay
//!
//! Nonces are strictly increasing per identity. A nonce is consumed as soon
//! as its signature verifies, even if the command itself then fails: a
//! rejected command cannot be resubmitted later against a changed state.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use holdfast_protocol::crypto::hash::blake3_hash_parts;
use holdfast_protocol::crypto::signatures::{sign_digest, verify_hex};
use holdfast_protocol::crypto::{Digest, Ed25519Verifier, Keypair, SignatureError, SignatureVerifier};
use holdfast_protocol::{HeightOracle, Identity, ValueLedger};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::Command;
use crate::container::Container;
use crate::error::EscrowError;
use crate::lifecycle::EscrowEngine;
use crate::store::ContainerStore;

const COMMAND_DOMAIN: &[u8] = b"holdfast/command/v1";

/// Failures of the signed submission path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttestationError {
    /// The command could not be serialized for hashing.
    #[error("command encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The nonce is not above the last one seen for this identity.
    #[error("replayed nonce {nonce} for {identity} (last accepted {last})")]
    Replay {
        identity: Identity,
        nonce: u64,
        last: u64,
    },

    /// The signature was fine; the engine refused the command.
    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

/// A command plus the proof of who issued it. Keys and signatures travel
/// hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommand {
    pub command: Command,
    pub nonce: u64,
    pub public_key: String,
    pub signature: String,
}

impl SignedCommand {
    /// The digest a signer commits to.
    pub fn digest(command: &Command, nonce: u64) -> Result<Digest, AttestationError> {
        let payload =
            serde_json::to_vec(&(command, nonce)).map_err(|e| AttestationError::Encoding(e.to_string()))?;
        Ok(blake3_hash_parts(&[COMMAND_DOMAIN, &payload]))
    }

    pub fn sign(keypair: &Keypair, command: Command, nonce: u64) -> Result<Self, AttestationError> {
        let digest = Self::digest(&command, nonce)?;
        let signature = sign_digest(keypair, &digest);
        Ok(Self {
            command,
            nonce,
            public_key: keypair.public_key().to_hex(),
            signature: signature.to_hex(),
        })
    }

    /// Recover the signer, without touching nonces or the engine.
    pub fn signer(&self, verifier: &dyn SignatureVerifier) -> Result<Identity, AttestationError> {
        let digest = Self::digest(&self.command, self.nonce)?;
        Ok(verify_hex(verifier, &digest, &self.public_key, &self.signature)?)
    }
}

/// Verifies [`SignedCommand`]s and runs them on an engine.
pub struct AttestedExecutor<S, L, H> {
    engine: Arc<EscrowEngine<S, L, H>>,
    verifier: Box<dyn SignatureVerifier>,
    nonces: DashMap<Identity, u64>,
}

impl<S, L, H> AttestedExecutor<S, L, H>
where
    S: ContainerStore,
    L: ValueLedger,
    H: HeightOracle,
{
    /// Executor with the stock [`Ed25519Verifier`].
    pub fn new(engine: Arc<EscrowEngine<S, L, H>>) -> Self {
        Self::with_verifier(engine, Box::new(Ed25519Verifier))
    }

    pub fn with_verifier(engine: Arc<EscrowEngine<S, L, H>>, verifier: Box<dyn SignatureVerifier>) -> Self {
        Self {
            engine,
            verifier,
            nonces: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &EscrowEngine<S, L, H> {
        &self.engine
    }

    /// Last nonce accepted for `identity`, if any.
    pub fn last_nonce(&self, identity: &Identity) -> Option<u64> {
        self.nonces.get(identity).map(|n| *n)
    }

    /// Verify, consume the nonce, then execute as the recovered identity.
    pub fn submit(&self, signed: &SignedCommand) -> Result<Container, AttestationError> {
        let caller = signed.signer(self.verifier.as_ref()).map_err(|err| {
            warn!(operation = %signed.command.kind(), error = %err, "rejected signed command");
            err
        })?;

        match self.nonces.entry(caller.clone()) {
            Entry::Occupied(mut last) => {
                if signed.nonce <= *last.get() {
                    debug!(%caller, nonce = signed.nonce, last = *last.get(), "nonce replay");
                    return Err(AttestationError::Replay {
                        identity: caller,
                        nonce: signed.nonce,
                        last: *last.get(),
                    });
                }
                last.insert(signed.nonce);
            }
            Entry::Vacant(slot) => {
                slot.insert(signed.nonce);
            }
        }

        Ok(self.engine.execute(&caller, &signed.command)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerRef;

    fn cmd() -> Command {
        Command::Distribute {
            reference: ContainerRef(1),
        }
    }

    #[test]
    fn signer_is_recovered() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let signed = SignedCommand::sign(&kp, cmd(), 1).unwrap();
        let who = signed.signer(&Ed25519Verifier).unwrap();
        assert_eq!(who, Identity::from_public_key(&kp.public_key()));
    }

    #[test]
    fn tampering_breaks_the_signature() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let mut signed = SignedCommand::sign(&kp, cmd(), 1).unwrap();
        signed.nonce = 2;
        assert_eq!(
            signed.signer(&Ed25519Verifier).unwrap_err(),
            AttestationError::Signature(SignatureError::VerificationFailed)
        );

        let mut signed = SignedCommand::sign(&kp, cmd(), 1).unwrap();
        signed.command = Command::Cancel {
            reference: ContainerRef(1),
        };
        assert!(signed.signer(&Ed25519Verifier).is_err());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let mut signed = SignedCommand::sign(&kp, cmd(), 1).unwrap();
        signed.public_key = "zz".into();
        assert!(matches!(
            signed.signer(&Ed25519Verifier),
            Err(AttestationError::Signature(SignatureError::Malformed(_)))
        ));
    }
}
