use anyhow::{bail, Result};

use super::crypt::{
    crypt_verify, crypt_with_own_setting, decode_digest, has_crypt_shape, itoa64_char,
    itoa64_value, parse_uint30, power_of_two_log2, push_uint30, random_crypt_salt,
};
use super::{hash_segment, Family, HashScheme};

const PREFIX: &str = "$7$";
const MAX_FACTOR: u32 = 1 << 30;

/// scrypt through libxcrypt's `$7$` method.
///
/// Setting layout: `$7$` + log2(N) + r (5 chars) + p (5 chars) + `$` + salt + `$`.
pub struct Scrypt {
    name: String,
    log2_n: u32,
    r: u32,
    p: u32,
}

impl Scrypt {
    pub fn new(name: impl Into<String>, n: u64, r: u32, p: u32) -> Result<Self> {
        let Some(log2_n) = power_of_two_log2(n) else {
            bail!("scrypt N must be a power of two >= 2, got {n}");
        };
        if log2_n > 63 {
            bail!("scrypt N=2^{log2_n} is out of range");
        }
        if r == 0 || p == 0 || r >= MAX_FACTOR || p >= MAX_FACTOR {
            bail!("scrypt r and p must be in 1..2^30, got r={r} p={p}");
        }
        if u64::from(r) * u64::from(p) >= u64::from(MAX_FACTOR) {
            bail!("scrypt r*p must stay below 2^30, got r={r} p={p}");
        }
        Ok(Self {
            name: name.into(),
            log2_n,
            r,
            p,
        })
    }

    pub fn log2_n(&self) -> u32 {
        self.log2_n
    }

    pub fn n(&self) -> u64 {
        1u64 << self.log2_n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    fn setting(&self, salt: &str) -> String {
        let mut setting = String::with_capacity(PREFIX.len() + 12 + salt.len() + 1);
        setting.push_str(PREFIX);
        setting.push(itoa64_char(self.log2_n));
        push_uint30(&mut setting, self.r);
        push_uint30(&mut setting, self.p);
        setting.push('$');
        setting.push_str(salt);
        setting.push('$');
        setting
    }
}

/// Recovers `(log2 N, r, p)` from a `$7$` encoding.
pub fn parse_params(encoded: &str) -> Option<(u32, u32, u32)> {
    let params = encoded.strip_prefix(PREFIX)?.as_bytes();
    if params.len() < 11 {
        return None;
    }
    let log2_n = itoa64_value(params[0])?;
    let r = parse_uint30(&params[1..6])?;
    let p = parse_uint30(&params[6..11])?;
    Some((log2_n, r, p))
}

impl HashScheme for Scrypt {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Scrypt
    }

    fn encode(&self, password: &[u8]) -> Result<String> {
        let salt = random_crypt_salt()?;
        crypt_with_own_setting(&self.name, password, &self.setting(&salt))
    }

    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
        if !has_crypt_shape(encoded, "7") {
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

    fn cheap() -> Scrypt {
        Scrypt::new("Scrypt-test", 1 << 10, 8, 1).unwrap()
    }

    #[test]
    fn satisfies_hash_contract() {
        assert_contract(&cheap());
        assert_fresh_salts(&cheap());
    }

    #[test]
    fn setting_layout_matches_crypt_method() {
        let scheme = Scrypt::new("Scrypt-Mem", 1 << 17, 8, 1).unwrap();
        assert_eq!(scheme.setting("SALT"), "$7$F6..../....$SALT$");
        let balanced = Scrypt::new("Scrypt-Balanced", 1 << 15, 8, 3).unwrap();
        assert_eq!(balanced.setting("s"), "$7$D6....1....$s$");
    }

    #[test]
    fn n_round_trips_through_the_encoding() {
        let scheme = Scrypt::new("Scrypt-test", 4096, 8, 1).unwrap();
        assert_eq!(scheme.log2_n(), 12);
        let encoded = scheme.encode(b"pw").unwrap();
        assert!(encoded.starts_with("$7$"));
        let (log2_n, r, p) = parse_params(&encoded).expect("params should parse");
        assert_eq!((log2_n, r, p), (12, 8, 1));
        assert_eq!(1u64 << log2_n, 4096);
        assert!(scheme.verify(&encoded, b"pw").unwrap());
        assert!(!scheme.raw_digest(&encoded).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(Scrypt::new("bad", 1000, 8, 1).is_err());
        assert!(Scrypt::new("bad", 1, 8, 1).is_err());
        assert!(Scrypt::new("bad", 1024, 0, 1).is_err());
        assert!(Scrypt::new("bad", 1024, 8, 0).is_err());
        assert!(Scrypt::new("bad", 1024, 1 << 16, 1 << 15).is_err());
    }

    #[test]
    fn garbled_parameters_are_a_mismatch() {
        let scheme = cheap();
        assert!(!scheme.verify("$7$!!!!!!!!!!!$salt$hash", b"pw").unwrap());
    }
}
