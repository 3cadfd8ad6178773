//! Parameter sweeps: one result table each, one isolated trial per point.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;

use crate::algorithms::{AlgorithmParams, AlgorithmSpec, Registry};
use crate::harness::Corpus;
use crate::hugepage::HugepageCounters;
use crate::hwinfo::Environment;
use crate::isolate::{run_isolated, HugepageProbe, Trial, TrialKind};
use crate::stats::format_bytes;
use crate::ui::{info, success, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum)]
pub enum SweepId {
    #[value(name = "memory")]
    Memory,
    #[value(name = "argon2-memory")]
    Argon2Memory,
    #[value(name = "argon2-time")]
    Argon2Time,
    #[value(name = "pbkdf2-iterations")]
    Pbkdf2Iterations,
    #[value(name = "scrypt")]
    Scrypt,
    #[value(name = "yescrypt")]
    Yescrypt,
    #[value(name = "compute")]
    Compute,
    #[value(name = "compute-fast")]
    ComputeFast,
    #[value(name = "brute-force")]
    BruteForce,
}

impl SweepId {
    /// Everything `run` does without `--sweep`, in execution order.
    /// Compute-only sweeps go last so earlier memory runs see a quiet machine.
    pub const DEFAULT_ORDER: [SweepId; 8] = [
        SweepId::Memory,
        SweepId::Argon2Memory,
        SweepId::Argon2Time,
        SweepId::Pbkdf2Iterations,
        SweepId::Scrypt,
        SweepId::Yescrypt,
        SweepId::Compute,
        SweepId::ComputeFast,
    ];

    pub const ALL: [SweepId; 9] = [
        SweepId::Memory,
        SweepId::Argon2Memory,
        SweepId::Argon2Time,
        SweepId::Pbkdf2Iterations,
        SweepId::Scrypt,
        SweepId::Yescrypt,
        SweepId::Compute,
        SweepId::ComputeFast,
        SweepId::BruteForce,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Argon2Memory => "argon2-memory",
            Self::Argon2Time => "argon2-time",
            Self::Pbkdf2Iterations => "pbkdf2-iterations",
            Self::Scrypt => "scrypt",
            Self::Yescrypt => "yescrypt",
            Self::Compute => "compute",
            Self::ComputeFast => "compute-fast",
            Self::BruteForce => "brute-force",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Memory => "memory1.csv",
            Self::Argon2Memory => "incr_argon2_mem.csv",
            Self::Argon2Time => "incr_argon2_time.csv",
            Self::Pbkdf2Iterations => "incr_pbkdf2_iters.csv",
            Self::Scrypt => "incr_scrypt.csv",
            Self::Yescrypt => "incr_yescrypt.csv",
            Self::Compute => "compute1.csv",
            Self::ComputeFast => "compute2.csv",
            Self::BruteForce => "bruteforce1.csv",
        }
    }

    /// Orders a selection the way [`SweepId::ALL`] does and drops repeats.
    pub fn in_run_order(selected: &[SweepId]) -> Vec<SweepId> {
        Self::ALL
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CorpusPaths {
    /// Used by every sweep except `compute-fast`.
    pub small: PathBuf,
    /// Used by `compute-fast`.
    pub large: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub spec: AlgorithmSpec,
    pub key: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SweepDefinition {
    pub id: SweepId,
    pub file_name: &'static str,
    /// What is measured, e.g. `Memory Use`.
    pub measure: &'static str,
    /// What it is measured on, e.g. `on Argon2id with increasing time cost`.
    pub subject: &'static str,
    pub key_columns: Vec<&'static str>,
    pub kind: TrialKind,
    pub corpus: PathBuf,
    pub points: Vec<SweepPoint>,
    /// Run the huge-page companion alongside each trial.
    pub probe: bool,
}

impl SweepDefinition {
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = self.key_columns.clone();
        columns.extend_from_slice(self.kind.value_columns());
        columns
    }

    /// First table line, without the hardware suffix.
    pub fn title(&self, corpus_len: usize) -> String {
        let corpus_name = self
            .corpus
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.corpus.display().to_string());
        format!(
            "{} ({corpus_len} passwords, {corpus_name}) {}",
            self.measure, self.subject
        )
    }
}

pub fn build_sweep(id: SweepId, registry: &Registry, corpora: &CorpusPaths) -> SweepDefinition {
    let by_name = |specs: &[AlgorithmSpec]| -> Vec<SweepPoint> {
        specs
            .iter()
            .map(|spec| SweepPoint {
                spec: spec.clone(),
                key: vec![spec.name.clone()],
            })
            .collect()
    };

    let base = SweepDefinition {
        id,
        file_name: id.file_name(),
        measure: "Computation Time",
        subject: "",
        key_columns: vec!["Algorithm"],
        kind: TrialKind::Profile,
        corpus: corpora.small.clone(),
        points: Vec::new(),
        probe: false,
    };

    match id {
        SweepId::Memory => SweepDefinition {
            measure: "Memory Use",
            subject: "on all the default algorithms",
            kind: TrialKind::MemoryFootprint,
            points: by_name(registry.defaults()),
            probe: true,
            ..base
        },
        SweepId::Argon2Memory => SweepDefinition {
            subject: "on Argon2id with increasing memory cost",
            key_columns: vec!["Memcost(KiB)"],
            points: (0..5)
                .map(|shift| {
                    let memory_kib = 65_536u32 << shift;
                    SweepPoint {
                        spec: AlgorithmSpec::argon2("Argon2", 3, memory_kib),
                        key: vec![memory_kib.to_string()],
                    }
                })
                .collect(),
            ..base
        },
        SweepId::Argon2Time => SweepDefinition {
            subject: "on Argon2id with increasing time cost",
            key_columns: vec!["Timecost"],
            points: (1..=5u32)
                .map(|time_cost| SweepPoint {
                    spec: AlgorithmSpec::argon2("Argon2", time_cost, 65_536),
                    key: vec![time_cost.to_string()],
                })
                .collect(),
            ..base
        },
        SweepId::Pbkdf2Iterations => SweepDefinition {
            subject: "on PBKDF2 with increasing iterations",
            key_columns: vec!["Iters"],
            points: [10_000u32, 100_000, 200_000, 400_000, 600_000, 1_000_000, 2_000_000]
                .into_iter()
                .map(|iterations| SweepPoint {
                    spec: AlgorithmSpec::pbkdf2("PBKDF2", iterations),
                    key: vec![iterations.to_string()],
                })
                .collect(),
            ..base
        },
        SweepId::Scrypt => SweepDefinition {
            subject: "on Scrypt with increasing parameters",
            key_columns: vec!["N", "R", "P"],
            points: [(1u64 << 17, 8u32, 1u32), (1 << 15, 8, 1), (1 << 13, 8, 1)]
                .into_iter()
                .map(|(n, r, p)| SweepPoint {
                    spec: AlgorithmSpec::scrypt("Scrypt", n, r, p),
                    key: vec![n.to_string(), r.to_string(), p.to_string()],
                })
                .collect(),
            probe: true,
            ..base
        },
        SweepId::Yescrypt => SweepDefinition {
            subject: "on Yescrypt with increasing parameters",
            key_columns: vec!["N"],
            points: [4096u64, 8192, 16_384, 32_768, 65_536]
                .into_iter()
                .map(|n| SweepPoint {
                    spec: AlgorithmSpec::yescrypt("yescrypt", n),
                    key: vec![n.to_string()],
                })
                .collect(),
            probe: true,
            ..base
        },
        SweepId::Compute => SweepDefinition {
            subject: "on all the default algorithms",
            kind: TrialKind::ComputeTime,
            points: by_name(registry.defaults()),
            ..base
        },
        SweepId::ComputeFast => SweepDefinition {
            subject: "on the fast algorithms",
            kind: TrialKind::ComputeTime,
            corpus: corpora.large.clone(),
            points: by_name(registry.fast()),
            ..base
        },
        SweepId::BruteForce => SweepDefinition {
            measure: "Brute-Force Time",
            subject: "on all the default algorithms",
            kind: TrialKind::BruteForceTime,
            points: by_name(registry.defaults()),
            ..base
        },
    }
}

pub struct SweepContext<'a> {
    pub results_dir: &'a Path,
    pub environment: &'a Environment,
    /// `None` disables the huge-page companion for every sweep.
    pub probe: Option<&'a HugepageProbe>,
    pub shutdown: &'a AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub id: SweepId,
    pub path: PathBuf,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Memory one hash needs, where the parameters make it predictable.
pub fn estimated_memory_bytes(spec: &AlgorithmSpec) -> Option<u64> {
    match spec.params {
        AlgorithmParams::Argon2 { memory_kib, .. } => Some(u64::from(memory_kib) * 1024),
        AlgorithmParams::Scrypt { n, r, .. } => Some(128 * u64::from(r) * n),
        AlgorithmParams::Yescrypt { n } => Some(128 * 32 * n),
        AlgorithmParams::Pbkdf2 { .. } | AlgorithmParams::Sha256 | AlgorithmParams::Plaintext => {
            None
        }
    }
}

pub fn run_sweep(definition: &SweepDefinition, ctx: &SweepContext<'_>) -> Result<SweepOutcome> {
    fs::create_dir_all(ctx.results_dir).with_context(|| {
        format!(
            "failed to create results directory {}",
            ctx.results_dir.display()
        )
    })?;
    let path = ctx.results_dir.join(definition.file_name);

    // Validate every point before the table is touched.
    let schemes = definition
        .points
        .iter()
        .map(|point| {
            point
                .spec
                .build()
                .with_context(|| format!("invalid sweep point {}", point.spec.name))
        })
        .collect::<Result<Vec<_>>>()?;

    let corpus_len = Corpus::load(&definition.corpus)?.len();
    let title = definition.title(corpus_len);
    let columns = definition.columns();
    fs::write(
        &path,
        format!(
            "{title}, {}\n{}\n",
            ctx.environment.hardware_string(),
            columns.join(",")
        ),
    )
    .with_context(|| format!("failed to write header to {}", path.display()))?;

    let probe = if definition.probe { ctx.probe } else { None };
    if probe.is_some() {
        check_hugepage_pool(definition.id);
    }
    warn_on_memory_budget(definition, ctx.environment);

    info(
        "SWEEP",
        format!(
            "{} | points={} | kind={} | out={}",
            definition.id.as_str(),
            definition.points.len(),
            definition.kind.label(),
            path.display()
        ),
    );

    for (point, scheme) in definition.points.iter().zip(&schemes) {
        if ctx.shutdown.load(Ordering::Relaxed) {
            bail!("{} interrupted before {}", definition.id.as_str(), point.spec.name);
        }
        info(
            "TRIAL",
            format!(
                "{} | {} | {}",
                point.spec.name,
                point.key.join(","),
                point.spec.describe_params()
            ),
        );
        let trial = Trial {
            scheme: &**scheme,
            corpus: &definition.corpus,
            kind: definition.kind,
            key: point.key.clone(),
        };
        if let Err(err) = run_isolated(&trial, Some(&path), probe) {
            if ctx.shutdown.load(Ordering::Relaxed) {
                bail!("{} interrupted during {}", definition.id.as_str(), trial.label());
            }
            return Err(err).with_context(|| format!("sweep {}", definition.id.as_str()));
        }
    }

    let rows = read_rows(&path)?;
    success(
        "SWEEP",
        format!(
            "{} | rows={} | out={}",
            definition.id.as_str(),
            rows.len(),
            path.display()
        ),
    );
    Ok(SweepOutcome {
        id: definition.id,
        path,
        title,
        columns: columns.into_iter().map(str::to_string).collect(),
        rows,
    })
}

/// Data rows of a result table, header lines skipped.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .skip(2)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect())
}

fn check_hugepage_pool(id: SweepId) {
    match HugepageCounters::read() {
        Ok(counters) if counters.total == 0 => warn(
            "HUGEPAGE",
            format!(
                "{} | HugePages_Total=0; large scrypt/yescrypt runs may fail. Reserve a pool via /proc/sys/vm/nr_hugepages",
                id.as_str()
            ),
        ),
        Ok(counters) => info(
            "HUGEPAGE",
            format!(
                "pool total={} free={} page={}",
                counters.total,
                counters.free,
                format_bytes(counters.page_size_bytes())
            ),
        ),
        Err(err) => warn("HUGEPAGE", format!("cannot read huge-page counters: {err:#}")),
    }
}

fn warn_on_memory_budget(definition: &SweepDefinition, environment: &Environment) {
    let available = environment.effective_available_bytes();
    if available == 0 {
        return;
    }
    for point in &definition.points {
        let Some(needed) = estimated_memory_bytes(&point.spec) else {
            continue;
        };
        if needed > available {
            warn(
                "SWEEP",
                format!(
                    "{} [{}] needs ~{} per hash but only ~{} is available",
                    point.spec.name,
                    point.key.join(","),
                    format_bytes(needed),
                    format_bytes(available)
                ),
            );
        }
    }
}
