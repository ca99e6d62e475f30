//! # Identities
//!
//! Every party the engine deals with (originators, beneficiaries, the
//! protocol operator, the custodial account itself) is an [`Identity`]: an
//! opaque, equality-comparable string. The engine never interprets it.
//!
//! Identities derived from Ed25519 keys are the hex-encoded 32-byte public
//! key, which keeps them stable across the attestation layer and the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::PublicKey;

/// An opaque party identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity that owns an Ed25519 public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(key.to_hex())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the empty identifier, which is never a valid party.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;

    #[test]
    fn public_key_identity_is_hex() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        let id = Identity::from_public_key(&kp.public_key());
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id.as_str(), kp.public_key().to_hex());
    }

    #[test]
    fn blank_identity_is_empty() {
        assert!(Identity::new("  ").is_empty());
        assert!(!Identity::new("alice").is_empty());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Identity::new("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
    }
}
