use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{Family, HashScheme};

/// Unsalted SHA-256, hex encoded.
pub struct Sha256Digest {
    name: String,
}

impl Sha256Digest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HashScheme for Sha256Digest {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> Family {
        Family::Sha256
    }

    fn encode(&self, password: &[u8]) -> Result<String> {
        Ok(hex::encode(Sha256::digest(password)))
    }

    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
        Ok(self.encode(password)? == encoded)
    }
}
