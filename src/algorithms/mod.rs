//! Password-hashing adapters.
//!
//! Every adapter turns a password into a self-describing encoded string and
//! can later check a password against such a string without any side-channel
//! state. The benchmark harness only ever talks to [`HashScheme`].

use anyhow::{anyhow, Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;

mod argon2id;
mod crypt;
mod pbkdf2_sha256;
mod plaintext;
pub mod registry;
mod scrypt;
mod sha256;
mod yescrypt;

pub use argon2id::Argon2id;
pub use pbkdf2_sha256::Pbkdf2Sha256;
pub use plaintext::Plaintext;
pub use registry::{AlgorithmParams, AlgorithmSpec, Registry};
pub use scrypt::Scrypt;
pub use sha256::Sha256Digest;
pub use yescrypt::Yescrypt;

/// Salt length for the hex-framed adapters (Argon2id, PBKDF2).
pub const HEX_SALT_LEN: usize = 16;
/// Derived key length for the hex-framed adapters.
pub const HEX_HASH_LEN: usize = 32;
/// Encoded length of `hex(salt) '$' hex(hash)`.
pub const HEX_ENCODED_LEN: usize = 2 * HEX_SALT_LEN + 1 + 2 * HEX_HASH_LEN;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Family {
    Argon2,
    Pbkdf2,
    Scrypt,
    Yescrypt,
    Sha256,
    Plaintext,
}

impl Family {
    pub fn label(self) -> &'static str {
        match self {
            Self::Argon2 => "argon2id",
            Self::Pbkdf2 => "pbkdf2-sha256",
            Self::Scrypt => "scrypt",
            Self::Yescrypt => "yescrypt",
            Self::Sha256 => "sha256",
            Self::Plaintext => "plaintext",
        }
    }

    /// libxcrypt may back these with huge pages, which `ru_maxrss` does not see.
    pub fn may_use_hugepages(self) -> bool {
        matches!(self, Self::Scrypt | Self::Yescrypt)
    }
}

pub trait HashScheme {
    fn name(&self) -> &str;

    fn family(&self) -> Family;

    /// Hashes `password` under a fresh salt and returns the full encoding.
    fn encode(&self, password: &[u8]) -> Result<String>;

    /// Checks `password` against a previous [`HashScheme::encode`] output.
    ///
    /// Malformed encodings yield `Ok(false)`. `Err` is reserved for failures
    /// of the underlying KDF, which must never be mistaken for a mismatch.
    fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool>;

    /// Raw hash bytes with salt, framing and cost prefix stripped.
    fn raw_digest(&self, encoded: &str) -> Result<Vec<u8>> {
        hex::decode(hash_segment(encoded))
            .with_context(|| format!("{} hash segment is not hex", self.name()))
    }

    /// Raw digest of a fresh encoding of `password`.
    fn hash_raw(&self, password: &[u8]) -> Result<Vec<u8>> {
        self.raw_digest(&self.encode(password)?)
    }
}

/// Everything after the last `$`, or the whole string when there is none.
pub fn hash_segment(encoded: &str) -> &str {
    match encoded.rfind('$') {
        Some(idx) => &encoded[idx + 1..],
        None => encoded,
    }
}

pub(crate) fn random_salt<const N: usize>() -> Result<[u8; N]> {
    let mut salt = [0u8; N];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|err| anyhow!("OS entropy source failed: {err}"))?;
    Ok(salt)
}

pub(crate) fn encode_salted_hex(salt: &[u8; HEX_SALT_LEN], hash: &[u8; HEX_HASH_LEN]) -> String {
    let mut out = String::with_capacity(HEX_ENCODED_LEN);
    out.push_str(&hex::encode(salt));
    out.push('$');
    out.push_str(&hex::encode(hash));
    out
}

/// Pulls the salt out of `hex(salt) '$' hex(hash)`; `None` when malformed.
pub(crate) fn parse_salted_hex(encoded: &str) -> Option<[u8; HEX_SALT_LEN]> {
    let bytes = encoded.as_bytes();
    if bytes.len() != HEX_ENCODED_LEN || bytes[2 * HEX_SALT_LEN] != b'$' {
        return None;
    }
    let mut salt = [0u8; HEX_SALT_LEN];
    hex::decode_to_slice(&bytes[..2 * HEX_SALT_LEN], &mut salt).ok()?;
    Some(salt)
}

pub(crate) fn salted_hex_matches(encoded: &str, hash: &[u8; HEX_HASH_LEN]) -> bool {
    let stored = &encoded.as_bytes()[2 * HEX_SALT_LEN + 1..];
    stored == hex::encode(hash).as_bytes()
}
