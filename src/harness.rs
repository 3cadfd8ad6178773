//! Measurement procedures built only on [`HashScheme`].
//!
//! Nothing here knows which KDF it is driving. Memory numbers come from the
//! process-wide peak RSS, so [`measure_memory_footprint`] only means something
//! inside a freshly forked child (see [`crate::isolate`]).

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};

use crate::algorithms::HashScheme;

/// Newline-delimited passwords, kept as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    entries: Vec<Vec<u8>>,
}

impl Corpus {
    pub fn new(entries: Vec<Vec<u8>>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open corpus {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("failed to read corpus {}", path.display()))
    }

    /// Every line is an entry, empty ones included. Only the terminator
    /// (`\n`, or `\r\n`) is stripped; a trailing terminator adds no entry.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let mut entries = Vec::new();
        loop {
            let mut line = Vec::new();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
            entries.push(line);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wall-clock seconds to `encode` every entry once, in corpus order.
pub fn measure_compute_time(scheme: &dyn HashScheme, corpus: &Corpus) -> Result<f64> {
    let started = Instant::now();
    hash_all(scheme, corpus)?;
    Ok(started.elapsed().as_secs_f64())
}

/// Hashes the last entry, then verifies candidates from the front until one
/// matches. Returns the index of the first match.
pub fn brute_force_scan(scheme: &dyn HashScheme, corpus: &Corpus) -> Result<usize> {
    let Some(last) = corpus.entries().last() else {
        bail!("{}: brute force needs a non-empty corpus", scheme.name());
    };
    let target = scheme
        .encode(last)
        .with_context(|| format!("{}: failed to hash brute-force target", scheme.name()))?;

    for (idx, candidate) in corpus.entries().iter().enumerate() {
        if scheme
            .verify(&target, candidate)
            .with_context(|| format!("{}: verify failed at entry {idx}", scheme.name()))?
        {
            return Ok(idx);
        }
    }
    Err(anyhow!(
        "{}: target derived from the last entry was never matched ({} candidates); encode and verify disagree",
        scheme.name(),
        corpus.len()
    ))
}

/// Wall-clock seconds for [`brute_force_scan`], target hashing included.
pub fn measure_brute_force_time(scheme: &dyn HashScheme, corpus: &Corpus) -> Result<f64> {
    if corpus.is_empty() {
        bail!("{}: brute force needs a non-empty corpus", scheme.name());
    }
    let started = Instant::now();
    brute_force_scan(scheme, corpus)?;
    Ok(started.elapsed().as_secs_f64())
}

/// Growth of peak RSS across one compute workload, in bytes.
pub fn measure_memory_footprint(scheme: &dyn HashScheme, corpus: &Corpus) -> Result<u64> {
    let before = peak_rss_kib()?;
    hash_all(scheme, corpus)?;
    let after = peak_rss_kib()?;
    Ok(after.saturating_sub(before).saturating_mul(1024))
}

pub fn measure_compute_time_from_file(scheme: &dyn HashScheme, path: &Path) -> Result<f64> {
    measure_compute_time(scheme, &Corpus::load(path)?)
}

pub fn measure_brute_force_time_from_file(scheme: &dyn HashScheme, path: &Path) -> Result<f64> {
    measure_brute_force_time(scheme, &Corpus::load(path)?)
}

pub fn measure_memory_footprint_from_file(scheme: &dyn HashScheme, path: &Path) -> Result<u64> {
    measure_memory_footprint(scheme, &Corpus::load(path)?)
}

/// `ru_maxrss` for this process, in KiB on Linux.
pub fn peak_rss_kib() -> Result<u64> {
    // SAFETY: getrusage only writes into the zeroed struct we hand it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).context("getrusage(RUSAGE_SELF) failed");
    }
    Ok(u64::try_from(usage.ru_maxrss).unwrap_or(0))
}

fn hash_all(scheme: &dyn HashScheme, corpus: &Corpus) -> Result<()> {
    for (idx, password) in corpus.entries().iter().enumerate() {
        scheme
            .encode(password)
            .with_context(|| format!("{}: encode failed at entry {idx}", scheme.name()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::algorithms::{Family, Plaintext, Sha256Digest};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    fn corpus(lines: &[&str]) -> Corpus {
        Corpus::new(lines.iter().map(|line| line.as_bytes().to_vec()).collect())
    }

    /// Counts encode calls and can be told to fail.
    struct Probe {
        encodes: Cell<usize>,
        verifies: Cell<usize>,
        fail_encode: bool,
        never_match: bool,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                encodes: Cell::new(0),
                verifies: Cell::new(0),
                fail_encode: false,
                never_match: false,
            }
        }
    }

    impl HashScheme for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn family(&self) -> Family {
            Family::Plaintext
        }

        fn encode(&self, password: &[u8]) -> Result<String> {
            self.encodes.set(self.encodes.get() + 1);
            if self.fail_encode {
                bail!("kdf exploded");
            }
            Ok(String::from_utf8_lossy(password).into_owned())
        }

        fn verify(&self, encoded: &str, password: &[u8]) -> Result<bool> {
            self.verifies.set(self.verifies.get() + 1);
            Ok(!self.never_match && encoded.as_bytes() == password)
        }
    }

    #[test]
    fn corpus_keeps_empty_lines_and_strips_terminators() {
        let parsed = Corpus::from_reader(&b"p1\n\nwin\r\nlast"[..]).unwrap();
        assert_eq!(
            parsed.entries(),
            &[b"p1".to_vec(), Vec::new(), b"win".to_vec(), b"last".to_vec()]
        );

        let trailing = Corpus::from_reader(&b"a\nb\n"[..]).unwrap();
        assert_eq!(trailing.len(), 2);

        let blank_tail = Corpus::from_reader(&b"a\n\n"[..]).unwrap();
        assert_eq!(blank_tail.entries(), &[b"a".to_vec(), Vec::new()]);

        assert!(Corpus::from_reader(&b""[..]).unwrap().is_empty());
    }

    #[test]
    fn corpus_preserves_inner_whitespace_and_raw_bytes() {
        let parsed = Corpus::from_reader(&b"  spaced \n\xff\xfe\n"[..]).unwrap();
        assert_eq!(parsed.entries()[0], b"  spaced ".to_vec());
        assert_eq!(parsed.entries()[1], vec![0xff, 0xfe]);
    }

    #[test]
    fn corpus_load_reports_missing_file() {
        let dir = unique_temp_dir("kdfbench-corpus");
        let err = Corpus::load(&dir.join("absent.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.txt"));

        let path = dir.join("pw.txt");
        fs::write(&path, "p1\np2\np3\n").unwrap();
        assert_eq!(Corpus::load(&path).unwrap(), corpus(&["p1", "p2", "p3"]));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn compute_time_encodes_every_entry_once() {
        let probe = Probe::new();
        let secs = measure_compute_time(&probe, &corpus(&["a", "b", "c", ""])).unwrap();
        assert!(secs >= 0.0);
        assert_eq!(probe.encodes.get(), 4);
    }

    #[test]
    fn compute_time_propagates_kdf_failures() {
        let probe = Probe {
            fail_encode: true,
            ..Probe::new()
        };
        let err = measure_compute_time(&probe, &corpus(&["a"])).unwrap_err();
        assert!(format!("{err:#}").contains("kdf exploded"));
    }

    #[test]
    fn brute_force_finds_the_last_entry_scanning_from_the_front() {
        let probe = Probe::new();
        assert_eq!(brute_force_scan(&probe, &corpus(&["a", "b", "c"])).unwrap(), 2);
        assert_eq!(probe.encodes.get(), 1);
        assert_eq!(probe.verifies.get(), 3);

        let sha = Sha256Digest::new("sha256");
        assert_eq!(brute_force_scan(&sha, &corpus(&["x", "y", "z"])).unwrap(), 2);
    }

    #[test]
    fn brute_force_stops_at_an_earlier_duplicate() {
        let probe = Probe::new();
        assert_eq!(brute_force_scan(&probe, &corpus(&["c", "b", "c"])).unwrap(), 0);
        assert_eq!(probe.verifies.get(), 1);
    }

    #[test]
    fn brute_force_single_entry_corpus_matches_immediately() {
        let plain = Plaintext::new("Plaintext");
        assert_eq!(brute_force_scan(&plain, &corpus(&["only"])).unwrap(), 0);
        assert!(measure_brute_force_time(&plain, &corpus(&["only"])).unwrap() >= 0.0);
    }

    #[test]
    fn brute_force_fails_fast_on_empty_corpus() {
        let probe = Probe::new();
        assert!(measure_brute_force_time(&probe, &Corpus::default()).is_err());
        assert_eq!(probe.encodes.get(), 0);
    }

    #[test]
    fn brute_force_exhaustion_is_an_error() {
        let probe = Probe {
            never_match: true,
            ..Probe::new()
        };
        let err = brute_force_scan(&probe, &corpus(&["a", "b"])).unwrap_err();
        assert!(format!("{err:#}").contains("never matched"));
    }

    #[test]
    fn peak_rss_is_positive_and_monotonic() {
        let first = peak_rss_kib().unwrap();
        let ballast = vec![1u8; 8 << 20];
        let second = peak_rss_kib().unwrap();
        assert!(first > 0);
        assert!(second >= first);
        drop(ballast);
    }

    #[test]
    fn memory_footprint_reports_bytes() {
        let plain = Plaintext::new("Plaintext");
        let bytes = measure_memory_footprint(&plain, &corpus(&["p1", "p2", "p3"])).unwrap();
        assert_eq!(bytes % 1024, 0);
    }
}
