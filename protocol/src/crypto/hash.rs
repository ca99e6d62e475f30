//! # Hashing
//!
//! BLAKE3 is the only hash used here: for command digests signed by the
//! attestation layer and for dispute evidence anchors. The evidence payload
//! itself lives off-ledger; only its digest is recorded.

/// 32-byte BLAKE3 digest.
pub type Digest = [u8; 32];

/// Compute the BLAKE3 hash of `data`.
pub fn blake3_hash(data: &[u8]) -> Digest {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over the concatenation of several byte slices, without
/// allocating the concatenation.
pub fn blake3_hash_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Hex-encoded BLAKE3 digest. This is the form stored on evidence records.
pub fn blake3_hex(data: &[u8]) -> String {
    hex::encode(blake3_hash(data))
}

/// `true` if `s` looks like a hex-encoded 32-byte digest.
pub fn is_digest_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_hash_matches_concatenation() {
        let whole = blake3_hash(b"container-42:release");
        let parts = blake3_hash_parts(&[b"container-42", b":", b"release"]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn hex_digest_shape() {
        let h = blake3_hex(b"receipt.pdf");
        assert!(is_digest_hex(&h));
        assert!(!is_digest_hex("not-a-digest"));
        assert!(!is_digest_hex(&h[..63]));
    }
}
