/// Git tag of the build, or the crate version outside a tagged checkout.
pub const RELEASE_VERSION: &str = match option_env!("KDFBENCH_GIT_TAG") {
    Some(value) => value,
    None => env!("CARGO_PKG_VERSION"),
};

pub const GIT_COMMIT: Option<&str> = option_env!("KDFBENCH_GIT_COMMIT");

pub fn ui_display_version() -> String {
    with_v_prefix(RELEASE_VERSION)
}

/// `v0.3.0 (1a2b3c4d5e6f)` when the commit is known.
pub fn build_label() -> String {
    match GIT_COMMIT {
        Some(commit) => format!("{} ({commit})", ui_display_version()),
        None => ui_display_version(),
    }
}

/// Semver-looking versions gain a `v`; tags that already have one or are
/// not numeric pass through.
fn with_v_prefix(version: &str) -> String {
    match version.chars().next() {
        Some(ch) if ch.is_ascii_digit() => format!("v{version}"),
        _ => version.to_string(),
    }
}
