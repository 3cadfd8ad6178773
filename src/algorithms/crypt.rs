//! Bindings to libxcrypt's `crypt_rn`, the KDF behind the `$7$` (scrypt) and
//! `$y$` (yescrypt) adapters, plus the crypt-style text helpers they share.

use std::ffi::{CStr, CString};
use std::io;

use anyhow::{anyhow, bail, Context, Result};
use base64::alphabet;
use base64::engine::general_purpose::NO_PAD;
use base64::engine::GeneralPurpose;
use base64::Engine;
use libc::{c_char, c_int, c_void};

use super::random_salt;

/// `sizeof(struct crypt_data)` in libxcrypt.
const CRYPT_DATA_SIZE: usize = 32_768;

/// Raw salt bytes before base64 (24 characters once encoded).
pub(crate) const CRYPT_SALT_LEN: usize = 18;

pub(crate) const ITOA64: &[u8; 64] =
    b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const SALT_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::CRYPT, NO_PAD);

#[link(name = "crypt")]
extern "C" {
    fn crypt_rn(
        phrase: *const c_char,
        setting: *const c_char,
        data: *mut c_void,
        size: c_int,
    ) -> *mut c_char;
}

/// Outcome of one `crypt_rn` call.
pub(crate) enum CryptOutput {
    Hashed(String),
    /// libxcrypt refused the setting string itself (`EINVAL`).
    RejectedSetting,
}

/// The password reaches crypt(3) as a C string, so it ends at the first NUL.
pub(crate) fn crypt(phrase: &[u8], setting: &str) -> Result<CryptOutput> {
    let phrase = phrase.split(|byte| *byte == 0).next().unwrap_or(&[]);
    let phrase = CString::new(phrase).context("password is not a valid C string")?;
    let Ok(setting_c) = CString::new(setting) else {
        return Ok(CryptOutput::RejectedSetting);
    };
    let mut data = vec![0u8; CRYPT_DATA_SIZE];

    // SAFETY: both strings are NUL-terminated and outlive the call; `data` is
    // a writable buffer of exactly the size we report.
    let out = unsafe {
        crypt_rn(
            phrase.as_ptr(),
            setting_c.as_ptr(),
            data.as_mut_ptr().cast::<c_void>(),
            CRYPT_DATA_SIZE as c_int,
        )
    };
    if out.is_null() {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINVAL) {
            return Ok(CryptOutput::RejectedSetting);
        }
        bail!("crypt_rn failed: {err}");
    }

    // SAFETY: on success `out` points at a NUL-terminated string inside `data`.
    let hashed = unsafe { CStr::from_ptr(out) }
        .to_str()
        .context("crypt_rn returned non-UTF-8 output")?
        .to_owned();
    Ok(CryptOutput::Hashed(hashed))
}

/// Hashes under a setting we built ourselves; a rejection is a parameter bug.
pub(crate) fn crypt_with_own_setting(name: &str, phrase: &[u8], setting: &str) -> Result<String> {
    match crypt(phrase, setting).with_context(|| format!("{name}: crypt failed"))? {
        CryptOutput::Hashed(hashed) => Ok(hashed),
        CryptOutput::RejectedSetting => Err(anyhow!(
            "{name}: libxcrypt rejected generated setting {setting:?} (unsupported parameters?)"
        )),
    }
}

/// Re-derives with the full prior encoding as the setting and compares.
pub(crate) fn crypt_verify(name: &str, encoded: &str, phrase: &[u8]) -> Result<bool> {
    match crypt(phrase, encoded).with_context(|| format!("{name}: crypt failed"))? {
        CryptOutput::Hashed(hashed) => Ok(hashed == encoded),
        CryptOutput::RejectedSetting => Ok(false),
    }
}

/// `$<id>$<params>$<salt>$<hash>` with every field non-empty.
pub(crate) fn has_crypt_shape(encoded: &str, id: &str) -> bool {
    let mut fields = encoded.split('$');
    if fields.next() != Some("") || fields.next() != Some(id) {
        return false;
    }
    let rest: Vec<&str> = fields.collect();
    rest.len() == 3 && rest.iter().all(|field| !field.is_empty())
}

pub(crate) fn random_crypt_salt() -> Result<String> {
    let salt = random_salt::<CRYPT_SALT_LEN>()?;
    Ok(SALT_ENGINE.encode(salt))
}

/// Inverse of libxcrypt's `encode64`: every group of up to four characters is
/// one little-endian value, least significant 6 bits first, carrying up to
/// three bytes. This is not the bit order of RFC 4648 base64.
pub(crate) fn decode_digest(segment: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(segment.len() * 3 / 4);
    for group in segment.as_bytes().chunks(4) {
        if group.len() < 2 {
            bail!("hash segment {segment:?} ends with a dangling character");
        }
        let value = group
            .iter()
            .enumerate()
            .try_fold(0u32, |acc, (idx, ch)| {
                itoa64_value(*ch).map(|bits| acc | (bits << (6 * idx)))
            })
            .with_context(|| format!("hash segment {segment:?} is not crypt base64"))?;
        let len = group.len() * 6 / 8;
        out.extend_from_slice(&value.to_le_bytes()[..len]);
    }
    Ok(out)
}

pub(crate) fn itoa64_char(value: u32) -> char {
    ITOA64[(value & 0x3f) as usize] as char
}

pub(crate) fn itoa64_value(ch: u8) -> Option<u32> {
    ITOA64.iter().position(|c| *c == ch).map(|pos| pos as u32)
}

/// Five characters, least significant 6 bits first.
pub(crate) fn push_uint30(out: &mut String, value: u32) {
    for shift in (0..30).step_by(6) {
        out.push(itoa64_char(value >> shift));
    }
}

pub(crate) fn parse_uint30(text: &[u8]) -> Option<u32> {
    if text.len() != 5 {
        return None;
    }
    text.iter().enumerate().try_fold(0u32, |acc, (idx, ch)| {
        itoa64_value(*ch).map(|value| acc | (value << (6 * idx)))
    })
}

/// log2 of a power of two `n >= 2`.
pub(crate) fn power_of_two_log2(n: u64) -> Option<u32> {
    if n < 2 || !n.is_power_of_two() {
        return None;
    }
    Some(n.trailing_zeros())
}
