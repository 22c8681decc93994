//! Human and JSON output
//!
//! Messages go through an [`OutputFormatter`]. In JSON mode only structured
//! results reach stdout; status lines are dropped or sent to stderr as JSON
//! objects so that stdout stays a single parseable document.

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    /// Indented detail line; dropped in JSON mode
    fn info(&self, message: &str);
    /// Structured result; dropped in human mode
    fn print_json(&self, value: &Value);
}

pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("! {message}");
    }

    fn info(&self, message: &str) {
        if message.is_empty() {
            println!();
        } else {
            println!("  {message}");
        }
    }

    fn print_json(&self, _value: &Value) {}
}

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({ "ok": true, "message": message }));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", json!({ "ok": false, "error": message }));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({ "level": "warn", "message": message }));
    }

    fn info(&self, _message: &str) {}

    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("cannot render output: {e}")),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Serializes a result and hands it to the formatter
pub fn print_value<T: Serialize>(formatter: &dyn OutputFormatter, value: &T) -> Result<()> {
    formatter.print_json(&serde_json::to_value(value)?);
    Ok(())
}

pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

/// Shortens an id for table output, keeping the start
pub fn truncate_id(id: &str, max_len: usize) -> String {
    if id.chars().count() <= max_len {
        id.to_string()
    } else {
        let head: String = id.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
