//! `trackbridge mappings` — inspect and pin identity links.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use trackbridge_core::{BridgeConfig, IdentityStore, IssueKey, LinearIssueId};
use trackbridge_sync::keys::is_issue_key;

#[derive(Subcommand, Debug)]
pub enum MappingsCommand {
    /// List every linked issue pair.
    List(ListArgs),
    /// Show the counterpart of a Jira key or Linear issue id.
    Show {
        /// Jira key (ABC-123) or Linear issue id.
        id: String,
    },
    /// Pin a Jira key to a Linear issue, replacing any previous link of either.
    Link {
        /// Jira issue key, e.g. ABC-123.
        key: String,
        /// Linear issue id.
        linear_id: String,
    },
    /// Remove the link held by a Jira key or Linear issue id.
    Unlink {
        /// Jira key (ABC-123) or Linear issue id.
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: MappingsCommand) -> Result<()> {
    let home = crate::home_dir()?;
    let store = open_store(&home)?;
    match command {
        MappingsCommand::List(args) => list(&store, args.json),
        MappingsCommand::Show { id } => show(&store, &id),
        MappingsCommand::Link { key, linear_id } => link(&store, &key, &linear_id),
        MappingsCommand::Unlink { id } => unlink(&store, &id),
    }
}

fn open_store(home: &Path) -> Result<IdentityStore> {
    let config = BridgeConfig::from_env_at(home).context("failed to load configuration")?;
    Ok(config.identity_store_at(home))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MappingsJson {
    issues: Vec<IssuePairJson>,
    comment_pairs: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuePairJson {
    jira_key: String,
    linear_issue_id: String,
}

#[derive(Tabled)]
struct IssuePairRow {
    #[tabled(rename = "jira key")]
    jira_key: String,
    #[tabled(rename = "linear issue")]
    linear_issue_id: String,
}

fn list(store: &IdentityStore, json: bool) -> Result<()> {
    let file = store
        .load()
        .with_context(|| format!("failed to read {}", store.path().display()))?;
    let pairs = file.issue_pairs();

    if json {
        let payload = MappingsJson {
            issues: pairs
                .into_iter()
                .map(|(key, id)| IssuePairJson {
                    jira_key: key.0,
                    linear_issue_id: id.0,
                })
                .collect(),
            comment_pairs: file.comment_pair_count(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize mappings")?
        );
        return Ok(());
    }

    if pairs.is_empty() {
        println!("No issue links recorded in {}.", store.path().display());
        return Ok(());
    }

    let rows: Vec<IssuePairRow> = pairs
        .into_iter()
        .map(|(key, id)| IssuePairRow {
            jira_key: key.0,
            linear_issue_id: id.0,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{} mirrored comment pair(s)", file.comment_pair_count());
    Ok(())
}

fn show(store: &IdentityStore, id: &str) -> Result<()> {
    if is_issue_key(id) {
        let key = IssueKey::from(id);
        match store.linear_issue_id(&key)? {
            Some(linear) => println!("{key} ↔ {linear}"),
            None => bail!("no Linear issue linked to {key}"),
        }
    } else {
        let linear = LinearIssueId::from(id);
        match store.jira_key(&linear)? {
            Some(key) => println!("{key} ↔ {linear}"),
            None => bail!("no Jira key linked to {linear}"),
        }
    }
    Ok(())
}

fn link(store: &IdentityStore, key: &str, linear_id: &str) -> Result<()> {
    if !is_issue_key(key) {
        bail!("'{key}' is not a Jira issue key (expected e.g. ABC-123)");
    }
    let key = IssueKey::from(key);
    let linear = LinearIssueId::from(linear_id);
    store
        .set_issue_pair(&key, &linear)
        .with_context(|| format!("failed to link {key} to {linear}"))?;
    println!("✓ Linked {key} ↔ {linear}");
    Ok(())
}

fn unlink(store: &IdentityStore, id: &str) -> Result<()> {
    let removed = if is_issue_key(id) {
        let key = IssueKey::from(id);
        store.update(|file| file.unlink_key(&key))?
    } else {
        let linear = LinearIssueId::from(id);
        store.update(|file| file.unlink_issue_id(&linear))?
    };

    match removed {
        Some((key, linear)) => println!("✓ Unlinked {key} ↔ {linear}"),
        None => println!("nothing linked to {id}"),
    }
    Ok(())
}
