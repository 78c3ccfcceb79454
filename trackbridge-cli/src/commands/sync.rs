//! `trackbridge sync` — one reconciliation pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use trackbridge_core::{BridgeConfig, StatusMode};
use trackbridge_sync::{pipeline, RunSummary};

/// Arguments for `trackbridge sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Report what would change without writing to either tracker.
    #[arg(long)]
    pub dry_run: bool,

    /// Linear project to scan (overrides config and LINEAR_SYNC_PROJECT_ID).
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,

    /// off | jira_to_linear | bidirectional
    #[arg(long, value_name = "MODE")]
    pub status_mode: Option<StatusMode>,

    /// Emit the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let mut config = BridgeConfig::from_env_at(&home).context("failed to load configuration")?;
        self.apply(&mut config);

        let summary = pipeline::run(&home, &config).context("sync failed")?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
            );
        } else {
            print_summary(&summary, config.dry_run);
        }
        Ok(())
    }

    fn apply(&self, config: &mut BridgeConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(project) = &self.project {
            config.project_id = Some(project.clone());
        }
        if let Some(mode) = self.status_mode {
            config.status_mode = mode;
        }
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "metric")]
    metric: &'static str,
    #[tabled(rename = "count")]
    count: usize,
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let headline = format!(
        "{prefix}✓ {} issue(s) scanned, {} change(s)",
        summary.scanned,
        summary.total_changes()
    );
    if summary.total_changes() == 0 {
        println!("{}", headline.green());
    } else {
        println!("{}", headline.yellow());
    }

    let rows = vec![
        SummaryRow { metric: "scanned", count: summary.scanned },
        SummaryRow { metric: "mapped", count: summary.mapped },
        SummaryRow { metric: "status changes", count: summary.status_changes },
        SummaryRow { metric: "comments jira → linear", count: summary.comments_jira_to_linear },
        SummaryRow { metric: "comments linear → jira", count: summary.comments_linear_to_jira },
        SummaryRow { metric: "skipped (no jira key)", count: summary.skipped_no_jira_key },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
