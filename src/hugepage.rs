//! Huge-page usage probing.
//!
//! `ru_maxrss` does not count huge pages, so memory-hard KDFs that grab them
//! look cheaper than they are. The probe runs as a companion process for the
//! duration of one trial, tracks the lowest `HugePages_Free` it sees, and
//! reports the peak usage when interrupted.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const MEMINFO_PATH: &str = "/proc/meminfo";
/// Used when the kernel omits `Hugepagesize` (2 MiB on x86-64).
const FALLBACK_PAGE_KIB: u64 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugepageCounters {
    pub total: u64,
    pub free: u64,
    pub page_size_kib: u64,
}

impl HugepageCounters {
    pub fn read() -> Result<Self> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_meminfo(&raw)
    }

    pub fn page_size_bytes(&self) -> u64 {
        self.page_size_kib.saturating_mul(1024)
    }
}

pub fn parse_meminfo(raw: &str) -> Result<HugepageCounters> {
    let mut total = None;
    let mut free = None;
    let mut page_size_kib = None;
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok());
        match key.trim() {
            "HugePages_Total" => total = value,
            "HugePages_Free" => free = value,
            "Hugepagesize" => page_size_kib = value,
            _ => {}
        }
    }
    Ok(HugepageCounters {
        total: total.ok_or_else(|| anyhow!("HugePages_Total not found in meminfo"))?,
        free: free.ok_or_else(|| anyhow!("HugePages_Free not found in meminfo"))?,
        page_size_kib: page_size_kib.unwrap_or(FALLBACK_PAGE_KIB),
    })
}

/// Running minimum of free pages against the pool size seen at start.
#[derive(Debug, Clone, Copy)]
pub struct PeakTracker {
    total: u64,
    min_free: u64,
    page_size_bytes: u64,
}

impl PeakTracker {
    pub fn new(initial: HugepageCounters) -> Self {
        Self {
            total: initial.total,
            min_free: initial.free.min(initial.total),
            page_size_bytes: initial.page_size_bytes(),
        }
    }

    pub fn observe_free(&mut self, free: u64) {
        self.min_free = self.min_free.min(free);
    }

    pub fn peak_pages(&self) -> u64 {
        self.total.saturating_sub(self.min_free)
    }

    pub fn peak_bytes(&self) -> u64 {
        self.peak_pages().saturating_mul(self.page_size_bytes)
    }
}

/// Polls `meminfo_path` until `shutdown` is raised and returns peak usage in bytes.
pub fn run_scout(meminfo_path: &Path, shutdown: &AtomicBool, poll: Duration) -> Result<u64> {
    let mut tracker = PeakTracker::new(HugepageCounters::read_from(meminfo_path)?);
    while !shutdown.load(Ordering::Relaxed) {
        tracker.observe_free(HugepageCounters::read_from(meminfo_path)?.free);
        if !poll.is_zero() {
            thread::sleep(poll);
        }
    }
    // One last look: the child may have freed pages between our polls.
    tracker.observe_free(HugepageCounters::read_from(meminfo_path)?.free);
    Ok(tracker.peak_bytes())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    const SAMPLE: &str = "MemTotal:       32768000 kB\n\
HugePages_Total:     200\n\
HugePages_Free:      180\n\
HugePages_Rsvd:        0\n\
Hugepagesize:       2048 kB\n";

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    #[test]
    fn parses_hugepage_counters() {
        let counters = parse_meminfo(SAMPLE).unwrap();
        assert_eq!(
            counters,
            HugepageCounters {
                total: 200,
                free: 180,
                page_size_kib: 2048,
            }
        );
        assert_eq!(counters.page_size_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn missing_counters_are_an_error() {
        assert!(parse_meminfo("MemTotal: 1 kB\n").is_err());
        let no_size = parse_meminfo("HugePages_Total: 4\nHugePages_Free: 4\n").unwrap();
        assert_eq!(no_size.page_size_kib, FALLBACK_PAGE_KIB);
    }

    #[test]
    fn tracker_reports_lowest_free_watermark() {
        let mut tracker = PeakTracker::new(parse_meminfo(SAMPLE).unwrap());
        assert_eq!(tracker.peak_pages(), 20);
        tracker.observe_free(150);
        tracker.observe_free(190);
        assert_eq!(tracker.peak_pages(), 50);
        assert_eq!(tracker.peak_bytes(), 50 * 2048 * 1024);
    }

    #[test]
    fn tracker_is_zero_without_a_pool() {
        let tracker = PeakTracker::new(HugepageCounters {
            total: 0,
            free: 0,
            page_size_kib: 2048,
        });
        assert_eq!(tracker.peak_bytes(), 0);
    }

    #[test]
    fn scout_stops_when_shutdown_is_raised() {
        let dir = unique_temp_dir("kdfbench-scout");
        let meminfo = dir.join("meminfo");
        fs::write(&meminfo, SAMPLE).unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let meminfo = meminfo.clone();
            thread::spawn(move || run_scout(&meminfo, &shutdown, Duration::from_millis(5)))
        };
        thread::sleep(Duration::from_millis(30));
        let staged = dir.join("meminfo.next");
        fs::write(&staged, SAMPLE.replace("Free:      180", "Free:      100")).unwrap();
        fs::rename(&staged, &meminfo).unwrap();
        thread::sleep(Duration::from_millis(30));
        shutdown.store(true, Ordering::SeqCst);

        let peak = handle.join().unwrap().unwrap();
        assert_eq!(peak, 100 * 2048 * 1024);
        let _ = fs::remove_dir_all(dir);
    }
}
