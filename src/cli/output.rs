// Output formatting and display for CLI

use crate::bootstrap::{BootstrapReport, ManifestStatus};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// One line of `haiku check`
#[derive(Tabled)]
pub struct CheckRow {
    #[tabled(rename = "Check")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl CheckRow {
    pub fn new(name: &str, ok: bool, details: impl Display) -> Self {
        Self {
            name: name.to_string(),
            status: format_status(ok),
            details: truncate(&details.to_string(), 60),
        }
    }
}

pub fn print_check_table(rows: &[CheckRow]) {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
}

/// Print what bootstrap did
pub fn print_bootstrap_report(report: &BootstrapReport) {
    print_success_msg(&describe_manifest(&report.manifest));
    print_success_msg(&format!(
        "Logs directory ready: {}",
        report.logs_dir.display()
    ));
    if report.ownership_changes > 0 {
        print_success_msg(&format!(
            "Changed ownership of {} path(s) to {}",
            report.ownership_changes, report.identity
        ));
    }
}

pub fn describe_manifest(status: &ManifestStatus) -> String {
    match status {
        ManifestStatus::Missing => "No dependency manifest, skipped".to_string(),
        ManifestStatus::Parsed(count) => format!("Manifest parsed: {} requirement(s)", count),
        ManifestStatus::Resolved(count) => {
            format!("Dependencies resolved: {} requirement(s)", count)
        }
    }
}

pub fn print_haiku(first_line: &str, completion: &str) {
    println!();
    println!("  {}", first_line.cyan().bold());
    for line in completion.lines() {
        println!("  {}", line.cyan());
    }
    println!();
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

fn format_status(ok: bool) -> String {
    if ok {
        "ok".green().to_string()
    } else {
        "missing".yellow().bold().to_string()
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Create a spinner for long operations
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Finish a progress bar with success
pub fn finish_progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✓".green(), message));
}

/// Finish a progress bar with error
pub fn finish_progress_error(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a very long string", 10), "this is...");
        assert_eq!(truncate("утренний туман", 8), "утрен...");
    }

    #[test]
    fn test_describe_manifest() {
        assert_eq!(
            describe_manifest(&ManifestStatus::Resolved(3)),
            "Dependencies resolved: 3 requirement(s)"
        );
        assert!(describe_manifest(&ManifestStatus::Missing).contains("skipped"));
    }
}
