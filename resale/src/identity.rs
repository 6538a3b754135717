//! Comparison of claimed and bound identity tokens.
//!
//! Both values are hashed with SHA-256 and the digests compared in constant time,
//! so the comparison cost does not depend on where the tokens first differ.

use crate::types::VerifiedIdentity;
use sha2::{Digest, Sha256};

/// SHA-256 digest of an identity token
#[must_use]
pub fn identity_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Whether `claimed` is byte-for-byte the identity bound to a ticket
///
/// An unbound ticket only matches an empty claim.
#[must_use]
pub fn identity_matches(bound: &VerifiedIdentity, claimed: &str) -> bool {
    constant_time_eq::constant_time_eq_32(
        &identity_digest(bound.as_str()),
        &identity_digest(claimed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(identity_matches(&VerifiedIdentity::new("did:1"), "did:1"));
    }

    #[test]
    fn test_comparison_is_byte_exact() {
        let bound = VerifiedIdentity::new("did:1");
        assert!(!identity_matches(&bound, "did:2"));
        assert!(!identity_matches(&bound, "DID:1"));
        assert!(!identity_matches(&bound, "did:1 "));
        assert!(!identity_matches(&bound, ""));
    }

    #[test]
    fn test_unbound_matches_only_empty_claim() {
        let bound = VerifiedIdentity::unbound();
        assert!(identity_matches(&bound, ""));
        assert!(!identity_matches(&bound, "did:1"));
    }

    #[test]
    fn test_digest_is_sha256() {
        // SHA-256("") = e3b0c442...
        assert_eq!(identity_digest("")[..4], [0xe3, 0xb0, 0xc4, 0x42]);
    }
}
