//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use studente_core::{InstanceState, TimerLevel};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Instance state, green when running, yellow while changing, red when down.
pub fn paint_state(state: &InstanceState, color: bool) -> String {
    let text = state.as_str();
    if !color {
        return text.to_owned();
    }
    if state.is_running() {
        text.green().to_string()
    } else if state.is_transitioning() {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

pub fn paint_timer(formatted: &str, level: TimerLevel, color: bool) -> String {
    if !color {
        return formatted.to_owned();
    }
    match level {
        TimerLevel::Normal => formatted.green().to_string(),
        TimerLevel::Warning => formatted.yellow().to_string(),
        TimerLevel::Critical => formatted.red().bold().to_string(),
    }
}

/// `●` when lit, `·` otherwise.
pub fn flag(on: bool, color: bool) -> String {
    match (on, color) {
        (true, true) => "●".cyan().bold().to_string(),
        (true, false) => "●".into(),
        (false, true) => "·".dimmed().to_string(),
        (false, false) => "·".into(),
    }
}

pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_owned()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the data via serde
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted string.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: String,
        size: u32,
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "i-1".into(),
                size: 1,
            },
            Item {
                id: "i-2".into(),
                size: 2,
            },
        ]
    }

    fn row(item: &Item) -> ItemRow {
        ItemRow {
            id: item.id.clone(),
        }
    }

    #[test]
    fn plain_emits_one_identifier_per_line() {
        let out = render_list(OutputFormat::Plain, &items(), row, |i| i.id.clone());
        assert_eq!(out, "i-1\ni-2");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(OutputFormat::JsonCompact, &items(), row, |i| i.id.clone());
        assert_eq!(out, r#"[{"id":"i-1","size":1},{"id":"i-2","size":2}]"#);
    }

    #[test]
    fn table_has_headers() {
        let out = render_list(OutputFormat::Table, &items(), row, |i| i.id.clone());
        assert!(out.contains("ID"));
        assert!(out.contains("i-2"));
    }

    #[test]
    fn uncolored_helpers_are_plain_text() {
        assert_eq!(paint_state(&InstanceState::Running, false), "running");
        assert_eq!(paint_timer("00:01:00", TimerLevel::Critical, false), "00:01:00");
        assert_eq!(flag(true, false), "●");
    }
}
