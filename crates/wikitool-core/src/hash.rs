//! Content hashing for change detection.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest. 64 bits is plenty
/// for change detection at single-wiki scale.
const HASH_LEN: usize = 16;

/// Returns the first 16 hex characters of `sha256(bytes)`.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = hex::encode(digest);
    out.truncate(HASH_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::content_hash;

    #[test]
    fn known_vectors() {
        // sha256("") = e3b0c44298fc1c14...
        assert_eq!(content_hash(""), "e3b0c44298fc1c14");
        // sha256("Hello") = 185f8db32271fe25...
        assert_eq!(content_hash("Hello"), "185f8db32271fe25");
    }

    #[test]
    fn deterministic() {
        let a = content_hash("{{Infobox person|name=X}}");
        let b = content_hash("{{Infobox person|name=X}}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_inputs_differ() {
        assert_ne!(content_hash("Hello"), content_hash("Hello World"));
    }
}
