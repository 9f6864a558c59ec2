//! Output formatting for the CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use manus_e2e::report::SuiteStats;
use manus_e2e::{RunReport, ScenarioResult, ScenarioStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Items that can be displayed as a table row.
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<Cell>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Json | OutputFormat::Table => {
            println!("{}", serde_json::to_string_pretty(value)?)
        }
    }
    Ok(())
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Table = format {
        if items.is_empty() {
            println!("No items found.");
            return Ok(());
        }
        let mut table = table();
        table.set_header(T::headers());
        for item in items {
            table.add_row(item.row());
        }
        println!("{table}");
        return Ok(());
    }
    print_structured(items, format)
}

/// Print key/value pairs, or the item itself for structured formats.
pub fn print_fields<T: Serialize>(item: &T, fields: &[(&str, String)], format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Table = format {
        let mut table = table();
        table.set_header(vec!["Field", "Value"]);
        for (name, value) in fields {
            table.add_row(vec![name.to_string(), value.clone()]);
        }
        println!("{table}");
        return Ok(());
    }
    print_structured(item, format)
}

fn status_cell(status: ScenarioStatus) -> Cell {
    match status {
        ScenarioStatus::Passed => Cell::new("passed").fg(Color::Green),
        ScenarioStatus::Failed => Cell::new("FAILED").fg(Color::Red),
        ScenarioStatus::Skipped => Cell::new("skipped").fg(Color::Yellow),
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Scenario", "Status", "Attempts", "Duration"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.suite),
            Cell::new(&self.title),
            status_cell(self.status),
            Cell::new(self.attempts),
            Cell::new(format!("{}ms", self.duration_ms)),
        ]
    }
}

impl TableDisplay for SuiteStats {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Total", "Passed", "Failed", "Skipped", "Success"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::new(&self.name),
            Cell::new(self.total),
            Cell::new(self.passed),
            Cell::new(self.failed),
            Cell::new(self.skipped),
            Cell::new(format!("{:.1}%", self.success_rate)),
        ]
    }
}

/// Print the per-scenario table, the per-suite table and a one-line verdict.
pub fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    if !matches!(format, OutputFormat::Table) {
        return print_structured(report, format);
    }

    print_list(&report.results, format)?;
    print_list(&report.suites, format)?;

    for failure in &report.failures {
        print_error(&format!(
            "{} - {}: {}",
            failure.suite,
            failure.title,
            failure.error.as_deref().unwrap_or("unknown error")
        ));
    }

    for message in &report.harness_errors {
        print_warning(message);
    }

    let totals = &report.totals;
    let line = format!(
        "{} scenarios, {} passed, {} failed, {} skipped ({:.1}%) in {}ms",
        totals.total,
        totals.passed,
        totals.failed,
        totals.skipped,
        totals.success_rate,
        totals.duration_ms
    );
    if report.is_success() {
        print_success(&line);
    } else {
        print_error(&line);
    }
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "i".blue().bold(), message);
}
