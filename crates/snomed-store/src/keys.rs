//! Composite-key encoding.
//!
//! Every secondary table in the store is keyed by a tuple of `u64`/`u32`
//! fields. Keys are packed big-endian into a single byte string so that
//! lexicographic byte order matches the tuple's natural order, which lets
//! `redb`'s native range scan serve as a prefix scan directly.

/// Encodes a single `u64` as an 8-byte big-endian key.
pub fn u64_key(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

/// Encodes two `u64`s as a 16-byte big-endian key.
pub fn pair_key(a: u64, b: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&a.to_be_bytes());
    out.extend_from_slice(&b.to_be_bytes());
    out
}

/// Encodes a `(component_id, refset_id, item_id)` triple as a 24-byte key.
pub fn triple_key(a: u64, b: u64, c: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&a.to_be_bytes());
    out.extend_from_slice(&b.to_be_bytes());
    out.extend_from_slice(&c.to_be_bytes());
    out
}

/// Encodes a relationship edge key:
/// `(anchor_id, type_id, group, other_id, relationship_id)`, 36 bytes.
///
/// Used for both `conceptParentRelationships` (anchor = source, other =
/// destination) and `conceptChildRelationships` (anchor = destination,
/// other = source).
pub fn edge_key(anchor_id: u64, type_id: u64, group: u32, other_id: u64, relationship_id: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(36);
    out.extend_from_slice(&anchor_id.to_be_bytes());
    out.extend_from_slice(&type_id.to_be_bytes());
    out.extend_from_slice(&group.to_be_bytes());
    out.extend_from_slice(&other_id.to_be_bytes());
    out.extend_from_slice(&relationship_id.to_be_bytes());
    out
}

/// Decodes an `edge_key` back into its components.
pub fn decode_edge_key(bytes: &[u8]) -> (u64, u64, u32, u64, u64) {
    let anchor_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let type_id = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    let group = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
    let other_id = u64::from_be_bytes(bytes[20..28].try_into().unwrap());
    let relationship_id = u64::from_be_bytes(bytes[28..36].try_into().unwrap());
    (anchor_id, type_id, group, other_id, relationship_id)
}

/// Decodes a `pair_key` back into its two components.
pub fn decode_pair_key(bytes: &[u8]) -> (u64, u64) {
    let a = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let b = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    (a, b)
}

/// Decodes a `triple_key` back into its three components.
pub fn decode_triple_key(bytes: &[u8]) -> (u64, u64, u64) {
    let a = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
    let b = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
    let c = u64::from_be_bytes(bytes[16..24].try_into().unwrap());
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_key_roundtrip_order() {
        let mut keys: Vec<Vec<u8>> = vec![u64_key(300), u64_key(1), u64_key(200)];
        keys.sort();
        assert_eq!(keys, vec![u64_key(1), u64_key(200), u64_key(300)]);
    }

    #[test]
    fn test_edge_key_roundtrip() {
        let k = edge_key(100, 116680003, 0, 200, 55);
        assert_eq!(decode_edge_key(&k), (100, 116680003, 0, 200, 55));
    }

    #[test]
    fn test_edge_key_prefix_sorts_together() {
        let k1 = edge_key(100, 1, 0, 10, 1);
        let k2 = edge_key(100, 1, 0, 20, 2);
        let k3 = edge_key(200, 1, 0, 10, 3);
        let prefix = u64_key(100);
        assert!(k1.starts_with(&prefix));
        assert!(k2.starts_with(&prefix));
        assert!(!k3.starts_with(&prefix));
    }

    #[test]
    fn test_pair_key_roundtrip() {
        let k = pair_key(1, 2);
        assert_eq!(decode_pair_key(&k), (1, 2));
    }

    #[test]
    fn test_triple_key_roundtrip() {
        let k = triple_key(1, 2, 3);
        assert_eq!(decode_triple_key(&k), (1, 2, 3));
    }
}
