//! Stats command handler.
//!
//! Aggregate counts over the incident records file.

use clap::Args;
use incidex_core::config::AppConfig;
use incidex_retrieval::{record_stats, RecordStats};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Show aggregate counts over the incident records
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Records file (JSON array); defaults to the configured path
    #[arg(short, long)]
    pub records: Option<PathBuf>,

    /// Entries shown per breakdown
    #[arg(short = 'n', long, default_value_t = 10)]
    pub top: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");
        tracing::debug!("Stats options: {:?}", self);

        let path = self
            .records
            .clone()
            .unwrap_or_else(|| config.records_path.clone());
        let stats = record_stats(&path)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Total incidents: {}", stats.total_incidents);
        print_breakdown("Incident types", &stats.incident_types, self.top);
        print_breakdown("Statuses", &stats.statuses, self.top);
        print_breakdown("Locations", &stats.locations, self.top);

        Ok(())
    }
}

fn print_breakdown(title: &str, counts: &BTreeMap<String, usize>, top: usize) {
    println!();
    println!("{} ({} distinct):", title, counts.len());
    for (name, count) in RecordStats::top(counts, top) {
        println!("  {:>6}  {}", count, name);
    }
    if counts.len() > top {
        println!("  ... {} more", counts.len() - top);
    }
}
