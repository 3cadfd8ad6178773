//! One trial per forked child.
//!
//! Peak RSS only ever grows, so every memory measurement needs a process that
//! has done nothing else. The child measures, appends its row to the result
//! file and `_exit`s without returning into the caller. The parent reaps it
//! and turns anything other than a clean exit into an error.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use libc::{c_int, pid_t};

use crate::algorithms::HashScheme;
use crate::harness::{
    measure_brute_force_time, measure_compute_time, measure_memory_footprint, Corpus,
};
use crate::ui::{error, info, success, warn};

/// Subcommand of the main binary that runs [`crate::hugepage::run_scout`].
pub const SCOUT_SUBCOMMAND: &str = "hugepage-scout";
const SCOUT_GRACE: Duration = Duration::from_secs(2);
const SCOUT_POLL: Duration = Duration::from_millis(10);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrialKind {
    ComputeTime,
    BruteForceTime,
    MemoryFootprint,
    /// Memory footprint, then compute time, in the same child.
    Profile,
}

impl TrialKind {
    pub fn value_columns(self) -> &'static [&'static str] {
        match self {
            Self::ComputeTime | Self::BruteForceTime => &["Time(s)"],
            Self::MemoryFootprint => &["MaxUsage(B)"],
            Self::Profile => &["Time(s)", "MemoryUsage(B)"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ComputeTime => "compute",
            Self::BruteForceTime => "brute-force",
            Self::MemoryFootprint => "memory",
            Self::Profile => "profile",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    pub compute_secs: Option<f64>,
    pub brute_force_secs: Option<f64>,
    pub memory_bytes: Option<u64>,
}

impl Measurement {
    /// Measured values in column order: times first, then memory.
    pub fn values(&self) -> Vec<String> {
        let mut values = Vec::with_capacity(2);
        if let Some(secs) = self.compute_secs {
            values.push(secs.to_string());
        }
        if let Some(secs) = self.brute_force_secs {
            values.push(secs.to_string());
        }
        if let Some(bytes) = self.memory_bytes {
            values.push(bytes.to_string());
        }
        values
    }
}

pub struct Trial<'a> {
    pub scheme: &'a dyn HashScheme,
    pub corpus: &'a Path,
    pub kind: TrialKind,
    /// Leading row columns identifying this trial (algorithm name or parameters).
    pub key: Vec<String>,
}

impl Trial<'_> {
    pub fn label(&self) -> String {
        format!("{} [{}]", self.scheme.name(), self.key.join(","))
    }
}

/// Runs the trial in the current process.
pub fn run_in_process(trial: &Trial<'_>) -> Result<Measurement> {
    let corpus = Corpus::load(trial.corpus)?;
    let scheme = trial.scheme;
    let mut measurement = Measurement::default();
    match trial.kind {
        TrialKind::ComputeTime => {
            measurement.compute_secs = Some(measure_compute_time(scheme, &corpus)?);
        }
        TrialKind::BruteForceTime => {
            measurement.brute_force_secs = Some(measure_brute_force_time(scheme, &corpus)?);
        }
        TrialKind::MemoryFootprint => {
            measurement.memory_bytes = Some(measure_memory_footprint(scheme, &corpus)?);
        }
        TrialKind::Profile => {
            measurement.memory_bytes = Some(measure_memory_footprint(scheme, &corpus)?);
            measurement.compute_secs = Some(measure_compute_time(scheme, &corpus)?);
        }
    }
    Ok(measurement)
}

pub fn format_row(key: &[String], measurement: &Measurement) -> String {
    let mut fields = key.to_vec();
    fields.extend(measurement.values());
    let mut row = fields.join(",");
    row.push('\n');
    row
}

pub fn append_row(path: &Path, row: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {} for append", path.display()))?;
    file.write_all(row.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))
}

/// Forks, runs `trial` in the child and waits for it.
///
/// With `output` set the child appends one row there; otherwise it only logs.
/// A `probe`, if given, is started before the fork and stopped once the
/// child has been reaped, on every path out of this function.
pub fn run_isolated(
    trial: &Trial<'_>,
    output: Option<&Path>,
    probe: Option<&HugepageProbe>,
) -> Result<()> {
    let scout = probe.map(HugepageProbe::spawn).transpose()?;

    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    // SAFETY: the child only runs the trial on this thread and leaves via
    // `_exit`, never unwinding back into the caller.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("fork failed for {}", trial.label()));
    }
    if pid == 0 {
        child_main(trial, output);
    }

    let status = wait_for(pid).with_context(|| format!("waiting for {}", trial.label()))?;

    if let Some(scout) = scout {
        match scout.finish() {
            Ok(Some(bytes)) => info(
                "HUGEPAGE",
                format!("{} | peak={bytes}B", trial.scheme.name()),
            ),
            Ok(None) => warn(
                "HUGEPAGE",
                format!("{} | probe exited without a reading", trial.scheme.name()),
            ),
            Err(err) => warn("HUGEPAGE", format!("{}: {err:#}", trial.scheme.name())),
        }
    }

    check_exit_status(status).with_context(|| format!("trial {} failed", trial.label()))
}

fn child_main(trial: &Trial<'_>, output: Option<&Path>) -> ! {
    // The orchestrator's Ctrl-C handler must not keep the child alive.
    // SAFETY: restoring the default disposition has no preconditions.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        let measurement = run_in_process(trial)?;
        let row = format_row(&trial.key, &measurement);
        if let Some(path) = output {
            append_row(path, &row)?;
        }
        success(
            "TRIAL",
            format!(
                "{} | {} | {}",
                trial.label(),
                trial.kind.label(),
                describe(&measurement)
            ),
        );
        Ok(())
    }));

    let code = match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            error("TRIAL", format!("{}: {err:#}", trial.label()));
            1
        }
        Err(_) => {
            error("TRIAL", format!("{}: panicked", trial.label()));
            1
        }
    };
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    // SAFETY: `_exit` skips atexit handlers and destructors that belong to
    // the parent's copy of the process state.
    unsafe { libc::_exit(code) }
}

fn describe(measurement: &Measurement) -> String {
    let mut parts = Vec::new();
    if let Some(secs) = measurement.compute_secs {
        parts.push(format!("time={}", crate::stats::format_seconds(secs)));
    }
    if let Some(secs) = measurement.brute_force_secs {
        parts.push(format!("bruteforce={}", crate::stats::format_seconds(secs)));
    }
    if let Some(bytes) = measurement.memory_bytes {
        parts.push(format!("maxrss+={}", crate::stats::format_bytes(bytes)));
    }
    parts.join(" ")
}

fn wait_for(pid: pid_t) -> Result<c_int> {
    let mut status: c_int = 0;
    loop {
        // SAFETY: `pid` is our own child and `status` is a valid out pointer.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == pid {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err).context("waitpid failed");
    }
}

fn check_exit_status(status: c_int) -> Result<()> {
    if libc::WIFEXITED(status) {
        return match libc::WEXITSTATUS(status) {
            0 => Ok(()),
            code => Err(anyhow!("child exited with status {code}")),
        };
    }
    if libc::WIFSIGNALED(status) {
        bail!("child killed by signal {}", libc::WTERMSIG(status));
    }
    bail!("child ended with unexpected wait status {status:#x}")
}

/// How to launch the huge-page companion.
#[derive(Debug, Clone)]
pub struct HugepageProbe {
    program: PathBuf,
    args: Vec<OsString>,
}

impl HugepageProbe {
    /// This executable's own hidden scout subcommand.
    pub fn current_exe() -> Result<Self> {
        let program =
            std::env::current_exe().context("failed to locate the running executable")?;
        Ok(Self {
            program,
            args: vec![OsString::from(SCOUT_SUBCOMMAND)],
        })
    }

    pub fn command<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn spawn(&self) -> Result<ScoutGuard> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start probe {}", self.program.display()))?;
        Ok(ScoutGuard { child: Some(child) })
    }
}

/// A running probe. Interrupted and reaped when finished or dropped.
pub struct ScoutGuard {
    child: Option<Child>,
}

impl ScoutGuard {
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Interrupts the probe and parses the byte count it prints on exit.
    pub fn finish(mut self) -> Result<Option<u64>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        let exited_cleanly = interrupt_and_reap(&mut child)?;
        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)
                .context("failed to read probe output")?;
        }
        if !exited_cleanly {
            return Ok(None);
        }
        Ok(stdout
            .lines()
            .rev()
            .find_map(|line| line.trim().parse::<u64>().ok()))
    }
}

impl Drop for ScoutGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = interrupt_and_reap(&mut child) {
                warn("HUGEPAGE", format!("probe cleanup failed: {err:#}"));
            }
        }
    }
}

/// SIGINT, then a grace period, then SIGKILL. Returns whether it exited 0.
fn interrupt_and_reap(child: &mut Child) -> Result<bool> {
    if child.try_wait()?.is_none() {
        let pid = pid_t::try_from(child.id()).context("probe pid out of range")?;
        // SAFETY: plain kill(2) on a child we have not reaped yet.
        unsafe {
            libc::kill(pid, libc::SIGINT);
        }
    }

    let deadline = Instant::now() + SCOUT_GRACE;
    loop {
        if let Some(status) = child.try_wait().context("failed to poll probe")? {
            return Ok(status.success());
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(SCOUT_POLL);
    }

    warn("HUGEPAGE", "probe ignored SIGINT; killing it");
    child.kill().context("failed to kill probe")?;
    child.wait().context("failed to reap probe")?;
    Ok(false)
}
