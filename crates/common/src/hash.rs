// Content hashing: SHA-256 rendered as multibase base32.
//
// The text form is `b` + RFC 4648 lowercase base32 (no padding) of the
// 32-byte digest, so hashes are URL-safe and case-stable across peers.

use base32::Alphabet;
use sha2::{Digest, Sha256};

const BASE32: Alphabet = Alphabet::Rfc4648Lower { padding: false };

/// Compute the multibase base32 SHA-256 of the given bytes.
pub fn sha256_base32(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(53);
    out.push('b');
    out.push_str(&base32::encode(BASE32, &digest));
    out
}

/// Hash document content for the `content_hash` field.
pub fn content_hash(content: &str) -> String {
    sha256_base32(content.as_bytes())
}
