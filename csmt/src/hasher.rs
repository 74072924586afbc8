//! The hash primitive: SHA-256, hex-encoded.
//!
//! The engines treat the hash as an opaque oracle. Node hashes are stored and
//! exchanged as lowercase hex strings; an internal node's hash is the digest
//! of the concatenation of its children's hex strings, and a leaf's hash is
//! the digest of the raw value bytes.

use sha2::{Digest, Sha256};

/// A lowercase hex-encoded SHA-256 digest, [`DIGEST_HEX_LEN`] characters.
pub type NodeHash = String;

/// Length of a hex-encoded digest: two characters per digest byte.
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash arbitrary bytes. The empty input is well-defined; its digest is the
/// default hash of an unwritten leaf.
pub fn hash_bytes(data: &[u8]) -> NodeHash {
    hex::encode(Sha256::digest(data))
}

/// Hash the concatenation of two child hashes, left first.
pub fn hash_children(left: &NodeHash, right: &NodeHash) -> NodeHash {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// The hash carried by every leaf that has never been written.
pub fn empty_leaf_hash() -> NodeHash {
    hash_bytes(&[])
}
