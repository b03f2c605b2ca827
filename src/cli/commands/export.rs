//! Export command implementation
//!
//! This module implements the `export` command: run the configured profile,
//! deploy its output and store the checkpoint.

use crate::config::load_config;
use crate::core::export::{error_type, ExportErrorType, ExportPipeline, ExportSummary};
use crate::domain::EntityId;
use clap::Args;
use tokio_util::sync::CancellationToken;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - render records but skip deployment and checkpoints
    #[arg(long)]
    pub dry_run: bool,

    /// Override the record limit
    #[arg(long)]
    pub limit: Option<usize>,

    /// Export only these ids (comma-separated)
    #[arg(long)]
    pub ids: Option<String>,

    /// Continue after the last checkpointed id
    #[arg(long)]
    pub resume: bool,
}

/// Parse a comma-separated id list
fn parse_ids(raw: &str) -> Result<Vec<EntityId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EntityId>().map_err(|e| format!("invalid id '{s}': {e}")))
        .collect()
}

/// Exit code of a finished run
fn exit_code(summary: &ExportSummary, cancelled: bool) -> i32 {
    if summary
        .errors
        .iter()
        .any(|e| e.error_type == ExportErrorType::Configuration)
    {
        2
    } else if cancelled && summary.was_interrupted() {
        130
    } else if summary.is_successful() {
        0
    } else {
        1
    }
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(&self, config_path: &str, cancel: CancellationToken) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(limit) = self.limit {
            tracing::info!(limit, "Overriding record limit from CLI");
            config.export.limit = Some(limit);
        }

        if let Some(raw) = &self.ids {
            match parse_ids(raw) {
                Ok(ids) => {
                    tracing::info!(ids = ?ids, "Overriding entity ids from CLI");
                    config.export.filter.entity_ids = ids;
                }
                Err(e) => {
                    eprintln!("Invalid --ids: {e}");
                    return Ok(2);
                }
            }
        }

        if self.resume {
            config.export.resume = true;
        }

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            println!("DRY RUN MODE - nothing will be deployed or checkpointed");
            println!();
        }

        if !self.yes && !config.application.dry_run {
            println!("Export Configuration:");
            println!("  Profile: {}", config.export.profile_name);
            println!("  Entity: {}", config.export.entity);
            println!("  Page size: {}", config.export.page_size);
            println!(
                "  Limit: {}",
                config
                    .export
                    .limit
                    .map_or_else(|| "none".to_string(), |l| l.to_string())
            );
            println!(
                "  Destinations: {}",
                config.deployments.iter().filter(|d| d.enabled).count()
            );
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let pipeline = match ExportPipeline::new(config, cancel.clone()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export pipeline");
                eprintln!("Failed to initialize export: {e}");
                return Ok(match error_type(&e) {
                    ExportErrorType::Configuration => 2,
                    _ => 4,
                });
            }
        };

        println!("Starting export...");
        println!();

        let summary = match pipeline.execute().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(match error_type(&e) {
                    ExportErrorType::Connection => 4,
                    _ => 5,
                });
            }
        };

        println!();
        println!("Export Summary:");
        println!("  Profile: {}", summary.profile_name);
        println!("  Succeeded: {}", summary.run.succeeded);
        println!("  Failed: {}", summary.run.failed);
        println!("  Last id: {}", summary.run.last_id);
        println!("  Pages: {}", summary.run.pages_processed);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Success Rate: {:.2}%", summary.success_rate());
        println!();

        if let Some(cause) = &summary.run.abort_cause {
            println!("Export aborted at record {}: {}", cause.entity_id, cause.message);
            println!("  Output is incomplete and was not deployed.");
            println!();
        }

        if summary.deployment_skipped {
            println!("Deployment skipped.");
        } else {
            for deployment in &summary.deployments {
                match &deployment.last_error {
                    None => println!(
                        "  Deployed '{}' ({} file(s))",
                        deployment.name, deployment.files_published
                    ),
                    Some(e) => println!("  Deployment '{}' failed: {e}", deployment.name),
                }
            }
        }
        println!();

        if !summary.errors.is_empty() {
            println!("Errors encountered:");
            for error in &summary.errors {
                println!("  - {:?}: {}", error.error_type, error.message);
                if let Some(context) = &error.context {
                    println!("    Context: {context}");
                }
            }
            println!();
        }

        let code = exit_code(&summary, cancel.is_cancelled());
        match code {
            0 => println!("Export completed successfully!"),
            130 => {
                println!("Export interrupted. Output so far was kept.");
                println!("Run again with --resume to continue from the checkpoint.");
                tracing::info!("Export interrupted by user signal");
            }
            _ => println!("Export completed with failures"),
        }

        Ok(code)
    }
}
