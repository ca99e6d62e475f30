//! # Signature Verification
//!
//! The verification collaborator: given a message digest, a public key and
//! a signature, return the [`Identity`] that produced it, or fail.
//!
//! The escrow core does not depend on this. It exists for validation flows
//! layered on top of the core (signed command submission), which is why
//! it sits behind a trait: hosts with their own attestation scheme plug in
//! their own verifier.

use thiserror::Error;

use super::hash::Digest;
use super::keys::{KeyError, Keypair, PublicKey, Signature};
use crate::identity::Identity;

/// Errors during signature verification.
///
/// Deliberately coarse: callers learn that verification failed, not why.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Malformed(#[from] KeyError),
}

/// Recovers the signer identity from a signed digest.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        digest: &Digest,
        public_key: &PublicKey,
        signature: &Signature,
    ) -> Result<Identity, SignatureError>;
}

/// Strict Ed25519 verification; the identity is the hex public key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        digest: &Digest,
        public_key: &PublicKey,
        signature: &Signature,
    ) -> Result<Identity, SignatureError> {
        if public_key.verify(digest, signature) {
            Ok(Identity::from_public_key(public_key))
        } else {
            Err(SignatureError::VerificationFailed)
        }
    }
}

/// Sign a digest. The counterpart of [`Ed25519Verifier`].
pub fn sign_digest(keypair: &Keypair, digest: &Digest) -> Signature {
    keypair.sign(digest)
}

/// Verify hex-encoded wire components in one go.
pub fn verify_hex(
    verifier: &dyn SignatureVerifier,
    digest: &Digest,
    public_key_hex: &str,
    signature_hex: &str,
) -> Result<Identity, SignatureError> {
    let public_key = PublicKey::from_hex(public_key_hex)?;
    let signature = Signature::from_hex(signature_hex)?;
    verifier.verify(digest, &public_key, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::blake3_hash;

    #[test]
    fn verifier_returns_signer_identity() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let digest = blake3_hash(b"distribute 3");
        let sig = sign_digest(&kp, &digest);

        let who = Ed25519Verifier.verify(&digest, &kp.public_key(), &sig).unwrap();
        assert_eq!(who, Identity::from_public_key(&kp.public_key()));
    }

    #[test]
    fn wrong_key_fails() {
        let signer = Keypair::from_seed(&[1u8; 32]);
        let other = Keypair::from_seed(&[2u8; 32]);
        let digest = blake3_hash(b"distribute 3");
        let sig = sign_digest(&signer, &digest);

        let err = Ed25519Verifier
            .verify(&digest, &other.public_key(), &sig)
            .unwrap_err();
        assert_eq!(err, SignatureError::VerificationFailed);
    }

    #[test]
    fn hex_components_parse_and_verify() {
        let kp = Keypair::generate();
        let digest = blake3_hash(b"cancel 9");
        let sig = sign_digest(&kp, &digest);

        let who = verify_hex(
            &Ed25519Verifier,
            &digest,
            &kp.public_key().to_hex(),
            &sig.to_hex(),
        )
        .unwrap();
        assert_eq!(who.as_str(), kp.public_key().to_hex());

        let err = verify_hex(&Ed25519Verifier, &digest, "nothex", &sig.to_hex()).unwrap_err();
        assert!(matches!(err, SignatureError::Malformed(KeyError::InvalidPublicKey)));
    }
}
