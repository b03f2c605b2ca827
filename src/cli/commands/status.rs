//! Status command implementation
//!
//! This module implements the `status` command for displaying the
//! checkpoint of every export profile.

use crate::adapters::database::create_backends;
use crate::config::load_config;
use crate::core::state::{Checkpoint, ExportStatus, StateManager};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only this profile
    #[arg(long)]
    pub profile: Option<String>,
}

fn status_label(status: ExportStatus) -> &'static str {
    match status {
        ExportStatus::Completed => "Completed",
        ExportStatus::InProgress => "In Progress",
        ExportStatus::Failed => "Failed",
        ExportStatus::Interrupted => "Interrupted",
        ExportStatus::NotStarted => "Not Started",
    }
}

fn format_row(checkpoint: &Checkpoint) -> String {
    let completed = checkpoint
        .completed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Never".to_string());

    format!(
        "{:<30} {:<14} {:<13} {:<12} {:<10} {:<25}",
        checkpoint.profile_name,
        checkpoint.entity.to_string(),
        status_label(checkpoint.status),
        checkpoint.last_id,
        checkpoint.records_exported,
        completed
    )
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        println!("Export Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let backends = match create_backends(&config).await {
            Ok(b) => b,
            Err(e) => {
                println!("Failed to connect to database");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        let state_manager = StateManager::new_with_storage(backends.checkpoints);

        let checkpoints = match state_manager.get_all_checkpoints().await {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load checkpoints");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let checkpoints: Vec<_> = checkpoints
            .into_iter()
            .filter(|c| {
                self.profile
                    .as_deref()
                    .map_or(true, |p| c.profile_name == p)
            })
            .collect();

        if checkpoints.is_empty() {
            println!("No export history found.");
            println!("Run 'courier export' to start exporting data.");
            return Ok(0);
        }

        println!("Found {} checkpoint(s):", checkpoints.len());
        println!();
        println!(
            "{:<30} {:<14} {:<13} {:<12} {:<10} {:<25}",
            "Profile", "Entity", "Status", "Last Id", "Records", "Completed"
        );
        println!("{}", "-".repeat(108));

        for checkpoint in &checkpoints {
            println!("{}", format_row(checkpoint));
        }

        println!();
        Ok(0)
    }
}
