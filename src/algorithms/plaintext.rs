use anyhow::Result;

use super::{Family, HashScheme};

/// Digest width reported for the passthrough, matching the 256-bit KDF outputs.
const DIGEST_LEN: usize = 32;

/// Identity "hash": the zero-cost baseline for harness overhead.
pub struct Plaintext {
    name: String,
}

impl Plaintext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HashScheme for Plaintext {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Plaintext
    }

    fn encode(&self, password: &[u8]) -> Result<String> {
        Ok(escape(password))
    }

    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
        Ok(escape(password) == encoded)
    }

    /// The encoded bytes, zero-padded or cut to 32 bytes.
    fn raw_digest(&self, encoded: &str) -> Result<Vec<u8>> {
        Ok(fixed_width(encoded.as_bytes()))
    }

    /// Skips the text encoding so the digest holds the input bytes as given.
    fn hash_raw(&self, password: &[u8]) -> Result<Vec<u8>> {
        Ok(fixed_width(password))
    }
}

/// UTF-8 text without backslashes passes through unchanged. Anything else is
/// ASCII-escaped in full, which always yields at least one backslash, so the
/// two forms never collide and distinct inputs get distinct encodings.
fn escape(password: &[u8]) -> String {
    match std::str::from_utf8(password) {
        Ok(text) if !text.contains('\\') => text.to_string(),
        _ => password.escape_ascii().to_string(),
    }
}

fn fixed_width(bytes: &[u8]) -> Vec<u8> {
    let mut digest = bytes.to_vec();
    digest.resize(DIGEST_LEN, 0);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{brute_force_scan, Corpus};

    #[test]
    fn encode_is_identity() {
        let scheme = Plaintext::new("Plaintext");
        assert_eq!(scheme.encode(b"p2").unwrap(), "p2");
        assert!(scheme.verify("p2", b"p2").unwrap());
        assert!(!scheme.verify("p2", b"p3").unwrap());
        assert!(!scheme.verify("", b"anything").unwrap());
        assert!(scheme.verify("", b"").unwrap());
    }

    #[test]
    fn distinct_non_utf8_passwords_stay_distinct() {
        let scheme = Plaintext::new("Plaintext");
        let latin1 = scheme.encode(b"caf\xe9").unwrap();
        assert_eq!(latin1, "caf\\xe9");
        assert!(scheme.verify(&latin1, b"caf\xe9").unwrap());
        assert!(!scheme.verify(&latin1, b"caf\xfc").unwrap());
        // The escaped text typed literally is a different password.
        assert!(!scheme.verify(&latin1, b"caf\\xe9").unwrap());
        assert_ne!(scheme.encode(b"caf\\xe9").unwrap(), latin1);
        assert_eq!(scheme.encode("café".as_bytes()).unwrap(), "café");
    }

    #[test]
    fn brute_force_finds_the_right_latin1_entry() {
        let corpus = Corpus::new(vec![b"caf\xfc".to_vec(), b"x".to_vec(), b"caf\xe9".to_vec()]);
        let scheme = Plaintext::new("Plaintext");
        assert_eq!(brute_force_scan(&scheme, &corpus).unwrap(), 2);
    }

    #[test]
    fn raw_digest_is_fixed_width() {
        let scheme = Plaintext::new("Plaintext");
        assert_eq!(scheme.raw_digest("ab").unwrap()[..3], [b'a', b'b', 0]);
        assert_eq!(scheme.raw_digest(&"x".repeat(40)).unwrap().len(), 32);
    }

    #[test]
    fn hash_raw_keeps_non_utf8_bytes() {
        let scheme = Plaintext::new("Plaintext");
        let digest = scheme.hash_raw(&[0xff, 0x00, 0x80]).unwrap();
        assert_eq!(digest[..4], [0xff, 0x00, 0x80, 0x00]);
        assert_eq!(digest.len(), 32);
    }
}
