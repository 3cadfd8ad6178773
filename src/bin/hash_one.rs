//! `hash_one <algorithm> <bitstring>`: prints the raw digest of one input as hex.

use std::process::ExitCode;

use anyhow::{Context, Result};

use kdfbench::algorithms::Registry;
use kdfbench::analysis::parse_bitstring;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [algorithm, bitstring] = args.as_slice() else {
        let registry = Registry::standard();
        eprintln!("usage: hash_one <algorithm> <plaintext-as-bitstring>");
        eprintln!(
            "algorithms: {}",
            registry.cli_names().collect::<Vec<_>>().join(", ")
        );
        return ExitCode::FAILURE;
    };

    match hash_one(algorithm, bitstring) {
        Ok(digest) => {
            println!("{digest}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn hash_one(algorithm: &str, bitstring: &str) -> Result<String> {
    let registry = Registry::standard();
    let spec = registry
        .lookup(algorithm)
        .with_context(|| format!("unknown algorithm {algorithm:?}"))?;
    let password = parse_bitstring(bitstring)?;
    let scheme = spec.build()?;
    let digest = scheme.hash_raw(&password)?;
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_abc() {
        assert_eq!(
            hash_one("sha256", "011000010110001001100011").unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn plaintext_is_zero_padded_to_32_bytes() {
        let digest = hash_one("plaintext", "01100001").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.starts_with("61"));
        assert!(digest[2..].chars().all(|ch| ch == '0'));
    }

    #[test]
    fn rejects_unknown_names_and_bad_bitstrings() {
        assert!(hash_one("md5", "01100001").is_err());
        assert!(hash_one("sha256", "0110").is_err());
        assert!(hash_one("sha256", "0110000x").is_err());
    }
}
