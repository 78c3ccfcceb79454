//! `trackbridge init [--force]`

use anyhow::{bail, Context, Result};
use clap::Args;

use trackbridge_core::config::{config_path_at, write_config_at, CONFIG_TEMPLATE};

/// Write a commented default `~/.trackbridge/config.yaml`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = crate::home_dir()?;
        let path = config_path_at(&home);
        if path.exists() && !self.force {
            bail!(
                "config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }

        let path = write_config_at(&home, CONFIG_TEMPLATE)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("✓ Wrote {}", path.display());
        println!("  Set project_id (or LINEAR_SYNC_PROJECT_ID) and the tracker credentials,");
        println!("  then run: trackbridge sync --dry-run");
        Ok(())
    }
}
