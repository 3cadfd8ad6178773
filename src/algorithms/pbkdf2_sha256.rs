use anyhow::{anyhow, bail, Result};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;

use super::{
    encode_salted_hex, parse_salted_hex, random_salt, salted_hex_matches, Family, HashScheme,
    HEX_HASH_LEN, HEX_SALT_LEN,
};

/// PBKDF2-HMAC-SHA256 with a 32-byte output.
pub struct Pbkdf2Sha256 {
    name: String,
    iterations: u32,
}

impl Pbkdf2Sha256 {
    pub fn new(name: impl Into<String>, iterations: u32) -> Result<Self> {
        if iterations == 0 {
            bail!("pbkdf2 iteration count must be >= 1");
        }
        Ok(Self {
            name: name.into(),
            iterations,
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn derive(&self, password: &[u8], salt: &[u8; HEX_SALT_LEN]) -> Result<[u8; HEX_HASH_LEN]> {
        let mut out = [0u8; HEX_HASH_LEN];
        pbkdf2::<Hmac<Sha256>>(password, salt, self.iterations, &mut out)
            .map_err(|err| anyhow!("{}: pbkdf2 derivation failed: {err}", self.name))?;
        Ok(out)
    }
}

impl HashScheme for Pbkdf2Sha256 {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Pbkdf2
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
