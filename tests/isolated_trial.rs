use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use kdfbench::algorithms::{Plaintext, Sha256Digest};
use kdfbench::isolate::{run_isolated, HugepageProbe, Trial, TrialKind};

fn unique_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock should be >= unix epoch")
        .as_nanos();
    dir.push(format!("kdfbench-isolated-{}-{}", std::process::id(), now));
    dir
}

// Forked trials share one test so no other test thread is mid-allocation
// when the child is created.
#[test]
fn forked_trials_append_rows_and_report_failures() {
    let dir = unique_temp_dir();
    fs::create_dir_all(&dir).expect("temp dir should be created");
    let corpus = dir.join("corpus.txt");
    fs::write(&corpus, "123456\npassword\nletmein\n").expect("corpus should be written");
    let output = dir.join("rows.csv");

    let sha = Sha256Digest::new("SHA-256");
    let memory = Trial {
        scheme: &sha,
        corpus: &corpus,
        kind: TrialKind::MemoryFootprint,
        key: vec!["SHA-256".to_string()],
    };
    run_isolated(&memory, Some(&output), None).expect("memory trial should succeed");

    let plain = Plaintext::new("Plaintext");
    let plain_memory = Trial {
        scheme: &plain,
        corpus: &corpus,
        kind: TrialKind::MemoryFootprint,
        key: vec!["Plaintext".to_string()],
    };
    run_isolated(&plain_memory, Some(&output), None).expect("plaintext memory trial should succeed");

    let profile = Trial {
        scheme: &plain,
        corpus: &corpus,
        kind: TrialKind::Profile,
        key: vec!["Plaintext".to_string()],
    };
    let script = "trap 'echo 0; exit 0' INT; while :; do sleep 0.02; done";
    let probe = HugepageProbe::command("sh", ["-c", script]);
    run_isolated(&profile, Some(&output), Some(&probe)).expect("profile trial should succeed");

    let rows = fs::read_to_string(&output).expect("rows should be readable");
    let rows: Vec<Vec<&str>> = rows.lines().map(|line| line.split(',').collect()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), 2);
    assert_eq!(rows[0][0], "SHA-256");
    assert!(rows[0][1].parse::<u64>().is_ok());

    // A fresh child hashing three short lines barely grows its peak RSS.
    assert_eq!(rows[1].len(), 2);
    assert_eq!(rows[1][0], "Plaintext");
    let plain_bytes: u64 = rows[1][1].parse().expect("memory column should be bytes");
    assert!(plain_bytes < 1024 * 1024, "plaintext grew peak RSS by {plain_bytes} B");

    assert_eq!(rows[2].len(), 3);
    assert_eq!(rows[2][0], "Plaintext");
    assert!(rows[2][1].parse::<f64>().is_ok());
    assert!(rows[2][2].parse::<u64>().is_ok());

    let missing = dir.join("missing.txt");
    let broken = Trial {
        scheme: &sha,
        corpus: &missing,
        kind: TrialKind::ComputeTime,
        key: vec!["SHA-256".to_string()],
    };
    let err = run_isolated(&broken, Some(&output), None).expect_err("missing corpus should fail");
    assert!(format!("{err:#}").contains("status 1"), "{err:#}");
    assert_eq!(
        fs::read_to_string(&output)
            .expect("rows should be readable")
            .lines()
            .count(),
        3
    );

    let _ = fs::remove_dir_all(dir);
}
