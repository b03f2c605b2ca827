//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Courier configuration file.

use crate::config::load_config;
use crate::config::CourierConfig;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

fn print_summary(config: &CourierConfig) {
    println!("Configuration Summary:");
    println!("  Environment: {:?}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);
    println!(
        "  Database: postgresql://***@{}",
        config
            .database
            .connection_string
            .expose_secret()
            .as_str()
            .rsplit('@')
            .next()
            .unwrap_or("***")
    );
    println!("  Max Connections: {}", config.database.max_connections);
    println!("  Profile: {}", config.export.profile_name);
    println!("  Entity: {}", config.export.entity);
    println!("  Page Size: {}", config.export.page_size);
    println!("  Output Dir: {}", config.export.output_dir);
    println!("  Create Zip: {}", config.export.create_zip);
    println!("  Destinations:");
    if config.deployments.is_empty() {
        println!("    (none)");
    }
    for deployment in &config.deployments {
        println!(
            "    - {} ({:?}){}",
            deployment.name,
            deployment.kind,
            if deployment.enabled { "" } else { " [disabled]" }
        );
    }
    println!();
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
                println!();
                print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}
