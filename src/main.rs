use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use kdfbench::algorithms::Registry;
use kdfbench::analysis::{random_bits, score, INPUT_BITS};
use kdfbench::config::{AnalyzeConfig, Config, MeasureConfig, RunConfig, ScoutConfig};
use kdfbench::hugepage::run_scout;
use kdfbench::hwinfo::Environment;
use kdfbench::isolate::{run_isolated, HugepageProbe, Trial};
use kdfbench::report::RunReport;
use kdfbench::stats::format_bytes;
use kdfbench::sweep::{build_sweep, run_sweep, SweepContext, SweepId};
use kdfbench::ui::{info, startup_banner, success, warn};
use kdfbench::version;

fn main() {
    if let Err(err) = run() {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let registry = Registry::standard();
    let cfg = Config::parse(&registry)?;

    match cfg {
        Config::List => {
            print_list(&registry);
            Ok(())
        }
        Config::Analyze(analyze) => run_analysis(&analyze),
        Config::HugepageScout(scout) => {
            let shutdown = install_shutdown()?;
            run_hugepage_scout(&scout, &shutdown)
        }
        Config::Measure(measure) => run_measure(&measure),
        Config::Run(run) => {
            let shutdown = install_shutdown()?;
            run_sweeps(&run, &registry, &shutdown)
        }
    }
}

fn install_shutdown() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }
    Ok(shutdown)
}

fn run_sweeps(cfg: &RunConfig, registry: &Registry, shutdown: &AtomicBool) -> Result<()> {
    let environment = Environment::collect();
    let probe = if cfg.hugepage_probe {
        Some(HugepageProbe::current_exe()?)
    } else {
        None
    };

    startup_banner(&[
        ("Mode", "sweep".to_string()),
        ("Version", version::build_label()),
        ("Hardware", environment.hardware_string()),
        (
            "Available RAM",
            format_bytes(environment.effective_available_bytes()),
        ),
        (
            "Sweeps",
            cfg.sweeps
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        ("Corpus", cfg.corpora.small.display().to_string()),
        ("Large Corpus", cfg.corpora.large.display().to_string()),
        ("Results", cfg.results_dir.display().to_string()),
        (
            "Hugepage Probe",
            if probe.is_some() { "on" } else { "off" }.to_string(),
        ),
    ]);

    let ctx = SweepContext {
        results_dir: &cfg.results_dir,
        environment: &environment,
        probe: probe.as_ref(),
        shutdown,
    };
    let mut report = RunReport::new(environment.clone());
    let mut result = Ok(());
    for id in &cfg.sweeps {
        let definition = build_sweep(*id, registry, &cfg.corpora);
        match run_sweep(&definition, &ctx) {
            Ok(outcome) => report.push(&outcome),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }

    if let Some(path) = &cfg.report {
        report.write(path)?;
        info(
            "REPORT",
            format!("sweeps={} | out={}", report.sweeps.len(), path.display()),
        );
    }
    if result.is_ok() {
        success("DONE", format!("{} sweep(s) complete", cfg.sweeps.len()));
    }
    result
}

fn run_measure(cfg: &MeasureConfig) -> Result<()> {
    let scheme = cfg.algorithm.build()?;
    let probe = if cfg.hugepage_probe && scheme.family().may_use_hugepages() {
        Some(HugepageProbe::current_exe()?)
    } else {
        None
    };
    info(
        "MEASURE",
        format!(
            "{} | {} | kind={} | corpus={}",
            cfg.algorithm.name,
            cfg.algorithm.describe_params(),
            cfg.kind.label(),
            cfg.corpus.display()
        ),
    );
    let trial = Trial {
        scheme: &*scheme,
        corpus: &cfg.corpus,
        kind: cfg.kind,
        key: vec![cfg.algorithm.name.clone()],
    };
    run_isolated(&trial, None, probe.as_ref())
}

fn run_analysis(cfg: &AnalyzeConfig) -> Result<()> {
    let base = random_bits(cfg.seed, INPUT_BITS);
    println!("{}", cfg.metric.title());
    println!("Alg,{}", cfg.metric.score_column());
    for (name, spec) in &cfg.algorithms {
        eprintln!("{name}: scoring {} flips", cfg.trials);
        let scheme = spec.build()?;
        let value = score(&*scheme, cfg.metric, &base, cfg.trials)?;
        println!("{name},{value}");
    }
    Ok(())
}

fn run_hugepage_scout(cfg: &ScoutConfig, shutdown: &AtomicBool) -> Result<()> {
    println!("{}", scout_peak(cfg, shutdown)?);
    Ok(())
}

fn scout_peak(cfg: &ScoutConfig, shutdown: &AtomicBool) -> Result<u64> {
    run_scout(&cfg.meminfo, shutdown, cfg.poll_interval)
}

fn print_list(registry: &Registry) {
    println!("Default algorithms:");
    for spec in registry.defaults() {
        println!("  {:<16} {}", spec.name, spec.describe_params());
    }

    println!("\nSingle-hash names:");
    for name in registry.cli_names() {
        if let Some(spec) = registry.lookup(name) {
            println!("  {:<16} -> {}", name, spec.name);
        }
    }

    println!("\nSweeps:");
    for id in SweepId::ALL {
        let scheduled = if SweepId::DEFAULT_ORDER.contains(&id) {
            ""
        } else {
            " (opt-in)"
        };
        println!("  {:<18} {}{}", id.as_str(), id.file_name(), scheduled);
    }

    if registry.defaults().is_empty() {
        warn("LIST", "registry is empty");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::*;

    fn unique_temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be >= unix epoch")
            .as_nanos();
        dir.push(format!("kdfbench-main-{}-{}", std::process::id(), now));
        dir
    }

    #[test]
    fn scout_mode_reports_the_peak_once_shut_down() {
        let dir = unique_temp_dir();
        fs::create_dir_all(&dir).expect("temp dir should be created");
        let meminfo = dir.join("meminfo");
        fs::write(
            &meminfo,
            "HugePages_Total:      10\nHugePages_Free:        4\nHugepagesize:       2048 kB\n",
        )
        .expect("meminfo should be written");

        // Same shape as the dispatch in `run`: a shared flag lent out by reference.
        let shutdown = Arc::new(AtomicBool::new(true));
        let cfg = ScoutConfig {
            meminfo,
            poll_interval: Duration::ZERO,
        };
        assert_eq!(
            scout_peak(&cfg, &shutdown).expect("scout should read the counters"),
            6 * 2048 * 1024
        );
        run_hugepage_scout(&cfg, &shutdown).expect("scout mode should print the peak");

        let _ = fs::remove_dir_all(dir);
    }
}
