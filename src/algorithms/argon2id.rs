use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, Version};

use super::{
    encode_salted_hex, parse_salted_hex, random_salt, salted_hex_matches, Family, HashScheme,
    HEX_HASH_LEN, HEX_SALT_LEN,
};

pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_KIB: u32 = 65_536;
pub const PARALLELISM: u32 = 4;

/// Argon2id v0x13 with 4 lanes and a 32-byte tag.
pub struct Argon2id {
    name: String,
    time_cost: u32,
    memory_kib: u32,
    context: Argon2<'static>,
}

impl Argon2id {
    pub fn new(name: impl Into<String>, time_cost: u32, memory_kib: u32) -> Result<Self> {
        let params = Params::new(memory_kib, time_cost, PARALLELISM, Some(HEX_HASH_LEN))
            .map_err(|err| {
                anyhow!("invalid argon2 parameters t={time_cost} m={memory_kib}KiB: {err}")
            })?;
        Ok(Self {
            name: name.into(),
            time_cost,
            memory_kib,
            context: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    fn derive(&self, password: &[u8], salt: &[u8; HEX_SALT_LEN]) -> Result<[u8; HEX_HASH_LEN]> {
        let mut out = [0u8; HEX_HASH_LEN];
        self.context
            .hash_password_into(password, salt, &mut out)
            .map_err(|err| anyhow!("{}: argon2 derivation failed: {err}", self.name))?;
        Ok(out)
    }
}

impl HashScheme for Argon2id {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Argon2
    }

    fn encode(&self, password: &[u8]) -> Result<String> {
        let salt = random_salt::<HEX_SALT_LEN>()?;
        let hash = self.derive(password, &salt)?;
        Ok(encode_salted_hex(&salt, &hash))
    }

    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
        let Some(salt) = parse_salted_hex(encoded) else {
            return Ok(false);
        };
        let hash = self.derive(password, &salt)?;
        Ok(salted_hex_matches(encoded, &hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tests::{assert_contract, assert_fresh_salts};

    fn cheap() -> Argon2id {
        Argon2id::new("Argon2-test", 1, 64).expect("cheap parameters are valid")
    }

    #[test]
    fn satisfies_hash_contract() {
        assert_contract(&cheap());
        assert_fresh_salts(&cheap());
    }

    #[test]
    fn encoding_is_hex_salt_then_hex_hash() {
        let encoded = cheap().encode(b"abc").unwrap();
        assert_eq!(encoded.len(), 97);
        assert_eq!(&encoded[32..33], "$");
        assert!(encoded
            .chars()
            .enumerate()
            .all(|(idx, ch)| idx == 32 || ch.is_ascii_hexdigit()));
        assert_eq!(cheap().raw_digest(&encoded).unwrap().len(), 32);
    }

    #[test]
    fn rejects_memory_below_lane_minimum() {
        assert!(Argon2id::new("bad", 1, 8).is_err());
        assert!(Argon2id::new("bad", 0, 64).is_err());
    }

    #[test]
    fn cost_parameters_change_the_hash() {
        let light = cheap();
        let heavier = Argon2id::new("Argon2-test", 2, 64).unwrap();
        let encoded = light.encode(b"pw").unwrap();
        assert!(!heavier.verify(&encoded, b"pw").unwrap());
    }
}
