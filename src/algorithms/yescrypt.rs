use anyhow::{bail, Result};

use super::crypt::{
    crypt_verify, crypt_with_own_setting, decode_digest, has_crypt_shape, itoa64_char,
    itoa64_value, power_of_two_log2, random_crypt_salt,
};
use super::{hash_segment, Family, HashScheme};

const PREFIX: &str = "$y$";
/// Flavor `j` is YESCRYPT_DEFAULTS; `T` encodes r=32 with p=1, as passwd(1) uses.
const FLAVOR: char = 'j';
const BLOCK_PARAMS: char = 'T';
/// Largest N exponent that still fits the one-character field.
const MAX_LOG2_N: u32 = 48;

pub const DEFAULT_N: u64 = 4096;

/// yescrypt through libxcrypt's `$y$` method.
pub struct Yescrypt {
    name: String,
    log2_n: u32,
}

impl Yescrypt {
    pub fn new(name: impl Into<String>, n: u64) -> Result<Self> {
        let Some(log2_n) = power_of_two_log2(n) else {
            bail!("yescrypt N must be a power of two >= 2, got {n}");
        };
        if log2_n > MAX_LOG2_N {
            bail!("yescrypt N=2^{log2_n} exceeds 2^{MAX_LOG2_N}");
        }
        Ok(Self {
            name: name.into(),
            log2_n,
        })
    }

    pub fn log2_n(&self) -> u32 {
        self.log2_n
    }

    pub fn n(&self) -> u64 {
        1u64 << self.log2_n
    }

    fn setting(&self, salt: &str) -> String {
        format!(
            "{PREFIX}{FLAVOR}{}{BLOCK_PARAMS}${salt}$",
            itoa64_char(self.log2_n - 1)
        )
    }
}

/// Recovers log2 N from a `$y$j?T$...` encoding.
pub fn parse_log2_n(encoded: &str) -> Option<u32> {
    let params = encoded.strip_prefix(PREFIX)?.as_bytes();
    if params.first() != Some(&(FLAVOR as u8)) {
        return None;
    }
    params.get(1).and_then(|ch| itoa64_value(*ch)).map(|value| value + 1)
}

impl HashScheme for Yescrypt {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Yescrypt
    }

    fn encode(&self, password: &[u8]) -> Result<String> {
        let salt = random_crypt_salt()?;
        crypt_with_own_setting(&self.name, password, &self.setting(&salt))
    }

    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
        if !has_crypt_shape(encoded, "y") {
            return Ok(false);
        }
        crypt_verify(&self.name, encoded, password)
    }

    fn raw_digest(&self, encoded: &str) -> Result<Vec<u8>> {
        decode_digest(hash_segment(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tests::{assert_contract, assert_fresh_salts};

    fn cheap() -> Yescrypt {
        Yescrypt::new("yescrypt-test", DEFAULT_N).unwrap()
    }

    #[test]
    fn satisfies_hash_contract() {
        assert_contract(&cheap());
        assert_fresh_salts(&cheap());
    }

    #[test]
    fn default_setting_matches_passwd() {
        let scheme = Yescrypt::new("yescrypt", DEFAULT_N).unwrap();
        assert_eq!(scheme.setting("SALT"), "$y$j9T$SALT$");
    }

    #[test]
    fn n_round_trips_through_the_encoding() {
        let scheme = Yescrypt::new("yescrypt", 4096).unwrap();
        assert_eq!(scheme.log2_n(), 12);
        let encoded = scheme.encode(b"pw").unwrap();
        assert!(encoded.starts_with("$y$j9T$"));
        let log2_n = parse_log2_n(&encoded).expect("N should parse");
        assert_eq!(log2_n, 12);
        assert_eq!(1u64 << log2_n, 4096);
        assert_eq!(scheme.raw_digest(&encoded).unwrap().len(), 32);
    }

    #[test]
    fn rejects_invalid_n() {
        assert!(Yescrypt::new("bad", 4000).is_err());
        assert!(Yescrypt::new("bad", 1).is_err());
        assert!(Yescrypt::new("bad", 1 << 50).is_err());
    }

    #[test]
    fn foreign_encodings_are_a_mismatch() {
        let scheme = cheap();
        assert!(!scheme.verify("$7$F6..../....$salt$hash", b"pw").unwrap());
        assert!(!scheme.verify("$y$j9T$salt", b"pw").unwrap());
    }
}
