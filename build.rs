use std::env;
use std::process::Command;

fn main() {
    stamp("KDFBENCH_GIT_TAG", &["describe", "--tags", "--exact-match", "HEAD"]);
    stamp("KDFBENCH_GIT_COMMIT", &["rev-parse", "--short=12", "HEAD"]);
}

/// Exposes `key` to the crate, preferring the build environment over git.
fn stamp(key: &str, git_args: &[&str]) {
    println!("cargo:rerun-if-env-changed={key}");
    let value = env::var(key)
        .ok()
        .and_then(trimmed)
        .or_else(|| git(git_args));
    if let Some(value) = value {
        println!("cargo:rustc-env={key}={value}");
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().and_then(trimmed)
}

fn trimmed(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
