//! Terminal logging shared by the orchestrator and its forked trial children.
//!
//! Every line carries the time since the first log call and a short tag.
//! Lines written from a forked child also carry that child's pid, so
//! interleaved output from a sweep can be told apart.

use std::io::{IsTerminal, Write};
use std::sync::OnceLock;
use std::time::Instant;

use crossterm::style::{Color, Stylize};

const BANNER_WIDTH: usize = 72;
const KEY_WIDTH: usize = 16;
const TAG_WIDTH: usize = 8;

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();
static LOG_ORIGIN: OnceLock<(Instant, u32)> = OnceLock::new();

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Level {
    Info,
    Success,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERR",
        }
    }

    fn color(self) -> Color {
        match self {
            Self::Info => Color::Cyan,
            Self::Success => Color::Green,
            Self::Warn => Color::Yellow,
            Self::Error => Color::Red,
        }
    }
}

/// Boxed key/value summary printed once before any sweep starts.
pub fn startup_banner(lines: &[(&str, String)]) {
    let colors = use_color();
    let title = format!("kdfbench {}", crate::version::ui_display_version());
    let mut out = String::new();
    out.push('\n');
    out.push_str(&banner_edge('┌', '┐', Some(&title)));
    for (key, value) in lines {
        let key_cell = format!("{:<width$}", format!("{key}:"), width = KEY_WIDTH);
        let value_room = BANNER_WIDTH.saturating_sub(KEY_WIDTH + 2);
        let value_cell = format!("{:<value_room$}", truncate(value, value_room));
        if colors {
            out.push_str(&format!(
                "│ {}{} │\n",
                key_cell.with(Color::Cyan).bold(),
                value_cell.bold()
            ));
        } else {
            out.push_str(&format!("│ {key_cell}{value_cell} │\n"));
        }
    }
    out.push_str(&banner_edge('└', '┘', None));
    println!("{out}");
}

pub fn info(tag: &str, message: impl AsRef<str>) {
    log(Level::Info, tag, message.as_ref());
}

pub fn success(tag: &str, message: impl AsRef<str>) {
    log(Level::Success, tag, message.as_ref());
}

pub fn warn(tag: &str, message: impl AsRef<str>) {
    log(Level::Warn, tag, message.as_ref());
}

pub fn error(tag: &str, message: impl AsRef<str>) {
    log(Level::Error, tag, message.as_ref());
}

fn log(level: Level, tag: &str, message: &str) {
    let (origin, root_pid) = *LOG_ORIGIN.get_or_init(|| (Instant::now(), std::process::id()));
    let pid = std::process::id();
    let child = (pid != root_pid).then_some(pid);
    let line = format_line(
        origin.elapsed().as_secs_f64(),
        level,
        tag,
        child,
        message,
        use_color(),
    );

    // One write per line keeps output from parent and child from tearing.
    let _ = match level {
        Level::Warn | Level::Error => std::io::stderr().lock().write_all(line.as_bytes()),
        Level::Info | Level::Success => std::io::stdout().lock().write_all(line.as_bytes()),
    };
}

fn format_line(
    elapsed_secs: f64,
    level: Level,
    tag: &str,
    child: Option<u32>,
    message: &str,
    colors: bool,
) -> String {
    let time = format!("{elapsed_secs:>8.1}s");
    let label = format!("{:<4}", level.label());
    let tag = format!("{tag:<width$}", width = TAG_WIDTH);
    let origin = child.map(|pid| format!("[{pid}] ")).unwrap_or_default();
    if !colors {
        return format!("{time} {label} {tag} {origin}{message}\n");
    }
    format!(
        "{} {} {} {}{}\n",
        time.dark_grey(),
        label.with(level.color()).bold(),
        tag.bold(),
        origin.dark_grey(),
        highlight(message)
    )
}

/// Emphasises `key=value` values and turns `|` separators dim.
fn highlight(message: &str) -> String {
    message
        .split(' ')
        .map(|token| match token.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                format!("{}={}", key.dark_cyan(), value.white().bold())
            }
            _ if token == "|" => token.dark_grey().to_string(),
            _ => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn banner_edge(left: char, right: char, title: Option<&str>) -> String {
    let inner = BANNER_WIDTH;
    let mut edge = String::with_capacity(inner * 3);
    edge.push(left);
    match title {
        Some(title) => {
            let title = format!(" {} ", truncate(title, inner.saturating_sub(4)));
            edge.push('─');
            edge.push_str(&title);
            let rest = inner.saturating_sub(title.chars().count() + 1);
            edge.extend(std::iter::repeat('─').take(rest));
        }
        None => edge.extend(std::iter::repeat('─').take(inner)),
    }
    edge.push(right);
    edge.push('\n');
    edge
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return ".".repeat(max_chars);
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

fn use_color() -> bool {
    *COLOR_ENABLED.get_or_init(|| {
        if std::env::var_os("CLICOLOR_FORCE").is_some_and(|force| force != "0") {
            return true;
        }
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb")) {
            return false;
        }
        std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_keep_fixed_columns() {
        let line = format_line(1.5, Level::Info, "SWEEP", None, "memory | points=10", false);
        assert_eq!(line, "     1.5s INFO SWEEP    memory | points=10\n");
    }

    #[test]
    fn child_lines_carry_the_pid() {
        let line = format_line(0.0, Level::Error, "TRIAL", Some(4242), "boom", false);
        assert!(line.contains("ERR  TRIAL    [4242] boom"), "{line:?}");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 6), "abcdef");
        assert_eq!(truncate("abcdefgh", 6), "abc...");
        assert_eq!(truncate("abcdefgh", 2), "..");
    }

    #[test]
    fn banner_edges_span_the_full_width() {
        let top = banner_edge('┌', '┐', Some("kdfbench v0.1.0"));
        let bottom = banner_edge('└', '┘', None);
        assert_eq!(top.trim_end().chars().count(), BANNER_WIDTH + 2);
        assert_eq!(bottom.trim_end().chars().count(), BANNER_WIDTH + 2);
        assert!(top.contains(" kdfbench v0.1.0 "));
    }

    #[test]
    fn highlight_leaves_plain_words_alone() {
        let plain = "SHA-256 compute";
        assert_eq!(highlight(plain), plain);
    }
}
