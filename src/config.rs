use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::algorithms::{AlgorithmSpec, Registry};
use crate::analysis::{Metric, DEFAULT_SEED, INPUT_BITS};
use crate::hugepage::MEMINFO_PATH;
use crate::isolate::TrialKind;
use crate::sweep::{CorpusPaths, SweepId};

const DEFAULT_CORPUS: &str = "resources/rockyou32.txt";
const DEFAULT_LARGE_CORPUS: &str = "resources/rockyou25k.txt";
/// Analysis order when no `--algorithm` is given.
const ANALYZE_DEFAULTS: &[&str] = &[
    "argon2",
    "sha256",
    "pbkdf2-600k",
    "pbkdf2-1m",
    "yescrypt",
    "scrypt-mem",
    "scrypt-bal",
    "scrypt-cpu",
    "plaintext",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MeasureKind {
    Compute,
    BruteForce,
    Memory,
    Profile,
}

impl MeasureKind {
    pub fn trial_kind(self) -> TrialKind {
        match self {
            Self::Compute => TrialKind::ComputeTime,
            Self::BruteForce => TrialKind::BruteForceTime,
            Self::Memory => TrialKind::MemoryFootprint,
            Self::Profile => TrialKind::Profile,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "kdfbench",
    version,
    about = "Benchmark password hashes for compute time, brute-force time and memory footprint"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run parameter sweeps and write one CSV table per sweep.
    Run(RunArgs),
    /// Run one isolated trial and log the result.
    Measure(MeasureArgs),
    /// List default algorithms, single-hash names and sweep ids.
    List,
    /// Score output diffusion over single-bit input flips.
    Analyze(AnalyzeArgs),
    /// Huge-page companion: poll until SIGINT, then print peak usage in bytes.
    #[command(name = "hugepage-scout", hide = true)]
    HugepageScout(ScoutArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Sweeps to run. Repeat the flag or pass comma-separated values.
    #[arg(long = "sweep", value_enum, value_delimiter = ',', num_args = 1..)]
    sweeps: Vec<SweepId>,

    /// Password corpus for every sweep except compute-fast.
    #[arg(long, default_value = DEFAULT_CORPUS)]
    corpus: PathBuf,

    /// Password corpus for the compute-fast sweep.
    #[arg(long, default_value = DEFAULT_LARGE_CORPUS)]
    large_corpus: PathBuf,

    /// Directory receiving the CSV tables.
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Skip the huge-page companion process.
    #[arg(long, action = ArgAction::SetTrue)]
    no_hugepage_probe: bool,

    /// Also write a JSON report of every finished sweep to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MeasureArgs {
    /// Single-hash algorithm name (see `kdfbench list`).
    #[arg(long)]
    algorithm: String,

    #[arg(long, value_enum, default_value_t = MeasureKind::Profile)]
    kind: MeasureKind,

    #[arg(long, default_value = DEFAULT_CORPUS)]
    corpus: PathBuf,

    /// Skip the huge-page companion process.
    #[arg(long, action = ArgAction::SetTrue)]
    no_hugepage_probe: bool,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(long, value_enum, default_value_t = Metric::Diffusion)]
    metric: Metric,

    /// Algorithms to score. Repeat the flag or pass comma-separated values.
    #[arg(long = "algorithm", value_delimiter = ',', num_args = 1..)]
    algorithms: Vec<String>,

    /// Seed for the random base input.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Number of bit positions to flip, starting from the first.
    #[arg(long, default_value_t = INPUT_BITS)]
    trials: usize,
}

#[derive(Debug, Args)]
struct ScoutArgs {
    #[arg(long, default_value = MEMINFO_PATH)]
    meminfo: PathBuf,

    #[arg(long, default_value_t = 1)]
    poll_ms: u64,
}

#[derive(Debug, Clone)]
pub enum Config {
    Run(RunConfig),
    Measure(MeasureConfig),
    List,
    Analyze(AnalyzeConfig),
    HugepageScout(ScoutConfig),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sweeps: Vec<SweepId>,
    pub corpora: CorpusPaths,
    pub results_dir: PathBuf,
    pub hugepage_probe: bool,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MeasureConfig {
    pub algorithm: AlgorithmSpec,
    pub kind: TrialKind,
    pub corpus: PathBuf,
    pub hugepage_probe: bool,
}

#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub metric: Metric,
    pub algorithms: Vec<(String, AlgorithmSpec)>,
    pub seed: u64,
    pub trials: usize,
}

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub meminfo: PathBuf,
    pub poll_interval: Duration,
}

impl Config {
    pub fn parse(registry: &Registry) -> Result<Self> {
        Self::from_cli(Cli::parse(), registry)
    }

    fn from_cli(cli: Cli, registry: &Registry) -> Result<Self> {
        Ok(match cli.command {
            Command::Run(args) => Self::Run(run_config(args)?),
            Command::Measure(args) => {
                let algorithm = lookup(registry, &args.algorithm)?;
                require_file(&args.corpus, "corpus")?;
                Self::Measure(MeasureConfig {
                    algorithm,
                    kind: args.kind.trial_kind(),
                    corpus: args.corpus,
                    hugepage_probe: !args.no_hugepage_probe,
                })
            }
            Command::List => Self::List,
            Command::Analyze(args) => Self::Analyze(analyze_config(args, registry)?),
            Command::HugepageScout(args) => Self::HugepageScout(ScoutConfig {
                meminfo: args.meminfo,
                poll_interval: Duration::from_millis(args.poll_ms),
            }),
        })
    }
}

fn run_config(args: RunArgs) -> Result<RunConfig> {
    let sweeps = if args.sweeps.is_empty() {
        SweepId::DEFAULT_ORDER.to_vec()
    } else {
        SweepId::in_run_order(&args.sweeps)
    };

    require_file(&args.corpus, "corpus")?;
    if sweeps.contains(&SweepId::ComputeFast) {
        require_file(&args.large_corpus, "large corpus")?;
    }

    Ok(RunConfig {
        sweeps,
        corpora: CorpusPaths {
            small: args.corpus,
            large: args.large_corpus,
        },
        results_dir: args.results_dir,
        hugepage_probe: !args.no_hugepage_probe,
        report: args.report,
    })
}

fn analyze_config(args: AnalyzeArgs, registry: &Registry) -> Result<AnalyzeConfig> {
    if args.trials == 0 || args.trials > INPUT_BITS {
        bail!("trials must be in 1..={INPUT_BITS}, got {}", args.trials);
    }
    let names: Vec<String> = if args.algorithms.is_empty() {
        ANALYZE_DEFAULTS.iter().map(|name| name.to_string()).collect()
    } else {
        args.algorithms
    };
    let algorithms = names
        .into_iter()
        .map(|name| lookup(registry, &name).map(|spec| (name, spec)))
        .collect::<Result<Vec<_>>>()?;

    Ok(AnalyzeConfig {
        metric: args.metric,
        algorithms,
        seed: args.seed,
        trials: args.trials,
    })
}

fn lookup(registry: &Registry, name: &str) -> Result<AlgorithmSpec> {
    match registry.lookup(name) {
        Some(spec) => Ok(spec.clone()),
        None => bail!(
            "unknown algorithm {name:?}; expected one of: {}",
            registry.cli_names().collect::<Vec<_>>().join(", ")
        ),
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{what} file not found: {}", path.display());
    }
    Ok(())
}
