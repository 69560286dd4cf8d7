//! Markdown report generation
//!
//! This module renders a finished crawl as a human-readable markdown report,
//! including statistics, the depth breakdown and per-page failures.

use crate::output::traits::{CrawlReport, Notifier, ReportResult};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LISTED_FAILURES: usize = 50;

/// Writes the markdown report for `report` to `output_path`
pub fn generate_markdown_report(report: &CrawlReport, output_path: &Path) -> ReportResult<()> {
    let markdown = format_markdown_report(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_report(report: &CrawlReport) -> String {
    let stats = &report.stats;
    let mut md = String::new();

    md.push_str("# Sitesearch Crawl Report\n\n");

    if !report.recipients.is_empty() {
        md.push_str(&format!("To: {}\n\n", report.recipients.join(", ")));
    }

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(run_id) = stats.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Base URL**: {}\n", report.base_url));
    md.push_str(&format!("- **Started**: {}\n", stats.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", stats.finished_at.to_rfc3339()));
    let seconds = stats.duration().num_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        seconds,
        seconds as f64 / 60.0
    ));
    md.push_str(&format!("- **Outcome**: {}\n", stats.outcome.to_db_string()));
    if !report.config_hash.is_empty() {
        md.push_str(&format!("- **Config Hash**: {}\n", report.config_hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Pages visited | {} |\n", stats.pages_visited));
    md.push_str(&format!("| Pages indexed | {} |\n", stats.pages_indexed));
    md.push_str(&format!("| Provided by indexers | {} |\n", stats.pages_provided));
    md.push_str(&format!("| Filtered out | {} |\n", stats.pages_filtered));
    md.push_str(&format!("| Non-HTML skipped | {} |\n", stats.non_html_skipped));
    md.push_str(&format!("| Fetch/indexer errors | {} |\n", stats.errors));
    md.push_str(&format!("| Parse errors | {} |\n", stats.parse_errors));
    md.push_str(&format!("| Store errors | {} |\n", stats.store_errors));
    md.push_str(&format!("| Stale documents removed | {} |\n\n", stats.documents_removed));
    md.push_str(&format!("- **Success Rate**: {:.2}%\n\n", stats.success_rate()));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !stats.failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for failure in stats.failures.iter().take(MAX_LISTED_FAILURES) {
            md.push_str(&format!("| {} | {} |\n", failure.url, failure.reason.replace('|', "\\|")));
        }
        if stats.failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                stats.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md
}

/// Notifier that writes the markdown report to a file
#[derive(Debug, Clone)]
pub struct MarkdownFileNotifier {
    path: PathBuf,
}

impl MarkdownFileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Notifier for MarkdownFileNotifier {
    fn notify(&self, report: &CrawlReport) -> ReportResult<()> {
        generate_markdown_report(report, &self.path)?;
        tracing::info!(
            "Crawl report written to {} for {} recipient(s)",
            self.path.display(),
            report.recipients.len()
        );
        Ok(())
    }
}
