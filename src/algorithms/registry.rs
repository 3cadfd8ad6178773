//! Named algorithm instances.
//!
//! The registry is an ordinary value built once at startup and handed to
//! whatever needs it: the sweeps, the single-hash utility, the analyses.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{
    argon2id, yescrypt, Argon2id, HashScheme, Pbkdf2Sha256, Plaintext, Scrypt, Sha256Digest,
    Yescrypt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum AlgorithmParams {
    Argon2 { time_cost: u32, memory_kib: u32 },
    Pbkdf2 { iterations: u32 },
    Scrypt { n: u64, r: u32, p: u32 },
    Yescrypt { n: u64 },
    Sha256,
    Plaintext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    pub name: String,
    pub params: AlgorithmParams,
}

impl AlgorithmSpec {
    pub fn new(name: impl Into<String>, params: AlgorithmParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn argon2(name: impl Into<String>, time_cost: u32, memory_kib: u32) -> Self {
        Self::new(
            name,
            AlgorithmParams::Argon2 {
                time_cost,
                memory_kib,
            },
        )
    }

    pub fn pbkdf2(name: impl Into<String>, iterations: u32) -> Self {
        Self::new(name, AlgorithmParams::Pbkdf2 { iterations })
    }

    pub fn scrypt(name: impl Into<String>, n: u64, r: u32, p: u32) -> Self {
        Self::new(name, AlgorithmParams::Scrypt { n, r, p })
    }

    pub fn yescrypt(name: impl Into<String>, n: u64) -> Self {
        Self::new(name, AlgorithmParams::Yescrypt { n })
    }

    /// Validates the parameters and constructs a fresh adapter.
    pub fn build(&self) -> Result<Box<dyn HashScheme>> {
        let name = self.name.clone();
        Ok(match self.params {
            AlgorithmParams::Argon2 {
                time_cost,
                memory_kib,
            } => Box::new(Argon2id::new(name, time_cost, memory_kib)?),
            AlgorithmParams::Pbkdf2 { iterations } => {
                Box::new(Pbkdf2Sha256::new(name, iterations)?)
            }
            AlgorithmParams::Scrypt { n, r, p } => Box::new(Scrypt::new(name, n, r, p)?),
            AlgorithmParams::Yescrypt { n } => Box::new(Yescrypt::new(name, n)?),
            AlgorithmParams::Sha256 => Box::new(Sha256Digest::new(name)),
            AlgorithmParams::Plaintext => Box::new(Plaintext::new(name)),
        })
    }

    /// Short parameter summary for logs, e.g. `t=3 m=65536KiB`.
    pub fn describe_params(&self) -> String {
        match self.params {
            AlgorithmParams::Argon2 {
                time_cost,
                memory_kib,
            } => format!("t={time_cost} m={memory_kib}KiB p={}", argon2id::PARALLELISM),
            AlgorithmParams::Pbkdf2 { iterations } => format!("iters={iterations}"),
            AlgorithmParams::Scrypt { n, r, p } => format!("N={n} r={r} p={p}"),
            AlgorithmParams::Yescrypt { n } => format!("N={n} r=32 p=1"),
            AlgorithmParams::Sha256 | AlgorithmParams::Plaintext => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    defaults: Vec<AlgorithmSpec>,
    cli_names: Vec<(&'static str, AlgorithmSpec)>,
}

impl Registry {
    pub fn standard() -> Self {
        let defaults = vec![
            AlgorithmSpec::argon2(
                "Argon2",
                argon2id::DEFAULT_TIME_COST,
                argon2id::DEFAULT_MEMORY_KIB,
            ),
            AlgorithmSpec::pbkdf2("PBKDF2-100k", 100_000),
            AlgorithmSpec::pbkdf2("PBKDF2-600k", 600_000),
            AlgorithmSpec::pbkdf2("PBKDF2-1m", 1_000_000),
            AlgorithmSpec::scrypt("Scrypt-Mem", 1 << 17, 8, 1),
            AlgorithmSpec::scrypt("Scrypt-Balanced", 1 << 15, 8, 3),
            AlgorithmSpec::scrypt("Scrypt-CPU", 1 << 13, 8, 10),
            AlgorithmSpec::yescrypt("yescrypt", yescrypt::DEFAULT_N),
            AlgorithmSpec::new("sha256", AlgorithmParams::Sha256),
            AlgorithmSpec::new("Plaintext", AlgorithmParams::Plaintext),
        ];

        let cli_names = vec![
            ("argon2", defaults[0].clone()),
            ("sha256", defaults[8].clone()),
            ("pbkdf2-100k", defaults[1].clone()),
            ("pbkdf2-600k", defaults[2].clone()),
            ("pbkdf2-1m", defaults[3].clone()),
            ("yescrypt", defaults[7].clone()),
            ("scrypt-mem", defaults[4].clone()),
            ("scrypt-bal", defaults[5].clone()),
            ("scrypt-cpu", defaults[6].clone()),
            ("plaintext", defaults[9].clone()),
        ];

        Self {
            defaults,
            cli_names,
        }
    }

    /// Default instances, in report order.
    pub fn defaults(&self) -> &[AlgorithmSpec] {
        &self.defaults
    }

    /// The cheap tail of the defaults (SHA-256 and Plaintext).
    pub fn fast(&self) -> &[AlgorithmSpec] {
        let len = self.defaults.len();
        &self.defaults[len.saturating_sub(2)..]
    }

    pub fn lookup(&self, cli_name: &str) -> Option<&AlgorithmSpec> {
        self.cli_names
            .iter()
            .find(|(name, _)| *name == cli_name)
            .map(|(_, spec)| spec)
    }

    pub fn cli_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cli_names.iter().map(|(name, _)| *name)
    }
}
