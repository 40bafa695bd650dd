//! Usage command - inspect the weekly quota ledger.

use clap::Args;
use console::style;

use invex_core::{FileLedger, UsageStore};

use super::config::load_config;

/// Arguments for the usage command.
#[derive(Args)]
pub struct UsageArgs {}

pub fn run(_args: UsageArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let ledger = FileLedger::new(&config.quota.ledger_path);

    let used = match ledger.weekly_count() {
        Ok(count) => count,
        Err(e) => {
            eprintln!(
                "{} Ledger unreadable, treating as empty: {}",
                style("⚠").yellow(),
                e
            );
            0
        }
    };

    let limit = config.quota.weekly_limit;
    println!("Weekly usage: {} / {}", used, limit);
    println!("Remaining: {}", limit.saturating_sub(used));
    println!("Ledger file: {}", config.quota.ledger_path.display());

    Ok(())
}
