//! `trackbridge daemon` — run the poll scheduler or talk to a running one.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;

use trackbridge_core::BridgeConfig;
use trackbridge_daemon::paths::socket_path;
use trackbridge_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};
use trackbridge_sync::RunSummary;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (poll scheduler + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status(StatusArgs),
    /// Ask the running daemon to sync now and wait for the result.
    Trigger(TriggerArgs),
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the raw status payload as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Trigger token; defaults to SYNC_TRIGGER_TOKEN or daemon.trigger_token.
    #[arg(long)]
    pub token: Option<String>,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = crate::home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status(args) => {
            let status = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            } else {
                print_status(&status, Utc::now());
            }
        }
        DaemonCommand::Trigger(args) => {
            let token = match args.token {
                Some(token) => Some(token),
                None => BridgeConfig::from_env_at(&home)
                    .context("failed to load configuration")?
                    .daemon
                    .trigger_token,
            };
            let data = match request_sync(&home, token) {
                Ok(data) => data,
                Err(DaemonError::DaemonNotRunning { .. }) => {
                    bail!("daemon is not running; start it with `trackbridge daemon start`")
                }
                Err(err) => return Err(err).context("daemon sync failed"),
            };
            let summary: RunSummary =
                serde_json::from_value(data).context("daemon returned an unexpected summary")?;
            println!(
                "✓ synced: {} scanned, {} mapped, {} change(s)",
                summary.scanned,
                summary.mapped,
                summary.total_changes()
            );
        }
    }

    Ok(())
}

fn print_status(status: &Value, now: DateTime<Utc>) {
    let socket = status["socket"].as_str().unwrap_or("?");
    if status["running"] != Value::Bool(true) {
        println!("{} daemon is not running ({socket})", "■".bright_black().bold());
        return;
    }

    println!(
        "{} daemon running (pid {}, socket {socket})",
        "■".green().bold(),
        status["pid"]
    );
    match status["poll_interval_secs"].as_u64() {
        Some(0) | None => println!("  schedule: manual triggers only"),
        Some(secs) => println!("  schedule: every {secs}s"),
    }
    println!(
        "  runs: {} ({} failed)",
        status["runs"].as_u64().unwrap_or(0),
        status["failures"].as_u64().unwrap_or(0)
    );
    println!(
        "  last success: {}",
        format_age(status["last_success_at"].as_str(), now)
    );
    if let Some(error) = status["last_error"].as_str() {
        println!("  last error: {}", error.red());
    }
}

/// Render an RFC 3339 timestamp as a coarse age relative to `now`.
fn format_age(timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(parsed) = timestamp.and_then(|t| DateTime::parse_from_rfc3339(t).ok()) else {
        return "never".to_string();
    };
    let secs = (now - parsed.with_timezone(&Utc)).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ages_are_coarse() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_age(None, now), "never");
        assert_eq!(format_age(Some("garbage"), now), "never");
        assert_eq!(format_age(Some("2026-03-01T11:59:30Z"), now), "30s ago");
        assert_eq!(format_age(Some("2026-03-01T11:15:00Z"), now), "45m ago");
        assert_eq!(format_age(Some("2026-03-01T07:00:00+00:00"), now), "5h ago");
        assert_eq!(format_age(Some("2026-02-26T12:00:00Z"), now), "3d ago");
    }
}
