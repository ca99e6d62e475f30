//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for command signatures.
//! - **BLAKE3** for digests and evidence anchors.
//!
//! Nothing in the escrow core calls into this module directly. It backs the
//! attestation layer and the evidence helpers.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, blake3_hex, Digest};
pub use keys::{Keypair, PublicKey, Signature};
pub use signatures::{Ed25519Verifier, SignatureError, SignatureVerifier};
