//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and the summary table printed after a run.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for runs
/// - Summary tables with per-action counts
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folderchronicle::output::OutputFormatter;
    /// OutputFormatter::success("report.docx -> 2021/03/");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folderchronicle::output::OutputFormatter;
    /// OutputFormatter::info("Sorting contents of: /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// The bar is hidden automatically when stderr is not a terminal.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folderchronicle::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a summary table of file counts per action.
    ///
    /// Rows with a zero count are left out.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folderchronicle::output::OutputFormatter;
    ///
    /// OutputFormatter::summary_table(&[("Moved", 15), ("Failed", 1)], 16);
    /// ```
    pub fn summary_table(rows: &[(&str, usize)], total_files: usize) {
        Self::header("SUMMARY");

        let rows: Vec<_> = rows.iter().filter(|(_, count)| *count > 0).collect();
        let max_label_len = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max(6); // At least "Action" width

        println!(
            "{:<width$} | {}",
            "Action".bold(),
            "Files".bold(),
            width = max_label_len
        );
        println!("{}", "-".repeat(max_label_len + 10));

        for (label, count) in &rows {
            let count_text = if *label == "Failed" {
                count.to_string().red()
            } else {
                count.to_string().green()
            };
            println!(
                "{:<width$} | {} {}",
                label,
                count_text,
                file_word(*count),
                width = max_label_len
            );
        }

        println!("{}", "-".repeat(max_label_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            file_word(total_files),
            width = max_label_len
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
