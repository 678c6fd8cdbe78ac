//! Terminal output helpers.
//!
//! Human-readable output uses colored symbols and indented fields. With
//! `--json` every command prints exactly one JSON document on stdout
//! instead, so scripts can pipe it into `jq`.

use std::fmt::Display;

use owo_colors::OwoColorize;
use parking_lot::RwLock;
use serde_json::{json, Value};

/// Output mode selected by the global `--json` and `--quiet` flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// One JSON document per command on stdout.
    pub json: bool,
    /// Only warnings, errors and JSON documents.
    pub quiet: bool,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    const fn human(self) -> bool {
        !self.json && !self.quiet
    }
}

static MODE: RwLock<OutputConfig> = parking_lot::const_rwlock(OutputConfig {
    json: false,
    quiet: false,
});

/// Set the output mode for the rest of the process.
pub fn configure(config: OutputConfig) {
    *MODE.write() = config;
}

fn mode() -> OutputConfig {
    *MODE.read()
}

#[must_use]
pub fn is_json() -> bool {
    mode().json
}

/// `hindsight <version>` banner.
pub fn header(version: &str) {
    if mode().human() {
        println!("{} {}\n", "hindsight".bold(), version.dimmed());
    }
}

/// Indented `label value` pair with an aligned label column.
pub fn field(label: &str, value: impl Display) {
    if mode().human() {
        println!("  {:<14} {value}", label.dimmed());
    }
}

pub fn success(message: &str) {
    if mode().human() {
        println!("  {} {message}", "✓".green());
    }
}

/// Shown in quiet mode too, never in JSON mode.
pub fn warning(message: &str) {
    if !is_json() {
        println!("  {} {message}", "⚠".yellow());
    }
}

/// Always on stderr. In JSON mode the error is itself a JSON object.
pub fn error(message: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
    } else {
        eprintln!("  {} {message}", "×".red());
    }
}

pub fn section(title: &str) {
    if mode().human() {
        println!("\n{}", title.bold());
    }
}

/// Indent every line of a preformatted block such as a table.
pub fn lines(content: &str) {
    if mode().human() {
        content.lines().for_each(|line| println!("  {line}"));
    }
}

pub fn hint(message: &str) {
    if mode().human() {
        println!("  {} {}", "hint:".cyan().dimmed(), message.dimmed());
    }
}

/// Emit the command's JSON document.
pub fn json_output(value: &Value) {
    println!("{value}");
}

/// Apply `style` unless colors would end up inside JSON output.
fn paint(text: String, style: impl FnOnce(&String) -> String) -> String {
    if is_json() {
        text
    } else {
        style(&text)
    }
}

/// Green for gains, red for losses, plain at zero.
pub fn signed(value: f64, text: impl Display) -> String {
    paint(text.to_string(), |t| {
        if value > 0.0 {
            t.green().to_string()
        } else if value < 0.0 {
            t.red().to_string()
        } else {
            t.clone()
        }
    })
}

pub fn highlight(value: impl Display) -> String {
    paint(value.to_string(), |t| t.cyan().to_string())
}

pub fn muted(value: impl Display) -> String {
    paint(value.to_string(), |t| t.dimmed().to_string())
}
