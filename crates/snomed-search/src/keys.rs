//! Composite-key encoding for the inverted index's posting table.
//!
//! A token's postings are every `(token, descriptionId)` key sharing that
//! token as a byte prefix, so `token_prefix` plus `redb`'s range scan gives
//! both an exact-token lookup and a last-token prefix lookup for free.

use snomed_types::SctId;

const SEPARATOR: u8 = 0;

/// The byte prefix identifying every posting for exactly `token`, regardless
/// of which description it points at.
pub fn token_prefix(token: &str) -> Vec<u8> {
    let mut out = token.as_bytes().to_vec();
    out.push(SEPARATOR);
    out
}

/// The byte prefix identifying every posting for a token that *starts with*
/// `stem` (used for last-token type-ahead matching). Narrower than
/// [`token_prefix`]: it has no trailing separator, so it also matches
/// postings for longer tokens sharing the stem.
pub fn token_stem_prefix(stem: &str) -> Vec<u8> {
    stem.as_bytes().to_vec()
}

/// Encodes a posting key: `token`'s bytes, a separator, then the
/// description id big-endian. The separator guarantees a short token is
/// never itself a byte-prefix of a longer token (`"cat\0"` does not prefix
/// `"cats\0"`).
pub fn posting_key(token: &str, description_id: SctId) -> Vec<u8> {
    let mut out = token_prefix(token);
    out.extend_from_slice(&description_id.to_be_bytes());
    out
}

/// Recovers the description id from a posting key, given the token's byte
/// length (the caller already knows the token it scanned for).
pub fn decode_posting_key(bytes: &[u8]) -> SctId {
    let tail = &bytes[bytes.len() - 8..];
    SctId::from_be_bytes(tail.try_into().unwrap())
}

/// Encodes a `(concept_id, description_id) -> ()` key for the per-concept
/// document index, mirroring `snomed-store`'s `conceptDescriptions` table.
pub fn concept_document_key(concept_id: SctId, description_id: SctId) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&concept_id.to_be_bytes());
    out.extend_from_slice(&description_id.to_be_bytes());
    out
}

/// Decodes a `concept_document_key` back into its two components.
pub fn decode_concept_document_key(bytes: &[u8]) -> (SctId, SctId) {
    let a = SctId::from_be_bytes(bytes[0..8].try_into().unwrap());
    let b = SctId::from_be_bytes(bytes[8..16].try_into().unwrap());
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_key_roundtrips_description_id() {
        let key = posting_key("infec", 42);
        assert_eq!(decode_posting_key(&key), 42);
        assert!(key.starts_with(&token_prefix("infec")));
    }

    #[test]
    fn test_token_prefix_does_not_match_longer_token() {
        let cat_prefix = token_prefix("cat");
        let cats_key = posting_key("cats", 1);
        assert!(!cats_key.starts_with(&cat_prefix));
    }

    #[test]
    fn test_token_prefix_scan_matches_same_token_only() {
        let infec_key = posting_key("infec", 1);
        let infection_key = posting_key("infection", 2);
        let prefix = token_prefix("infec");
        assert!(infec_key.starts_with(&prefix));
        // prefix matching ("infec" as a stem of "infection") is done by the
        // caller scanning `token.as_bytes()` without the separator, not by
        // this exact-token prefix.
        assert!(!infection_key.starts_with(&prefix));
    }

    #[test]
    fn test_concept_document_key_roundtrip() {
        let key = concept_document_key(100, 7);
        assert_eq!(decode_concept_document_key(&key), (100, 7));
    }
}
