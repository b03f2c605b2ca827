//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "courier.toml")]
    pub output: String,

    /// Include example destinations and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing Courier configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(()) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with COURIER_DB_URL set to the shop database");
                println!("  3. Validate configuration: courier validate-config");
                println!("  4. Run export: courier export");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Courier Configuration File

[application]
log_level = "info"
dry_run = false

[database]
connection_string = "${COURIER_DB_URL}"

[export]
profile_name = "category-feed"
entity = "category"
page_size = 500
output_dir = "./export"

[deployment]
public_root = "./public/exchange"

[[deployments]]
name = "public"
kind = "public_folder"

[state]
enable_checkpointing = true

[logging]
local_enabled = true
local_path = "/var/log/courier"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Courier Configuration File
# Exports one entity of the shop database in pages and publishes the result.
#
# ${VAR} references are substituted from the environment (.env is loaded).
# COURIER_<SECTION>_<KEY> variables override values after parsing,
# e.g. COURIER_EXPORT_PAGE_SIZE=1000.

# Runtime environment: development, staging or production.
# Plain http:// destinations are rejected in production.
environment = "development"

[application]
# trace, debug, info, warn, error
log_level = "info"
# Render records but skip deployment and checkpoints
dry_run = false

[database]
connection_string = "${COURIER_DB_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 120
# disable, prefer, require
ssl_mode = "prefer"
# Keys per "= ANY($1)" list; larger key sets are split
max_in_list = 2000

[export]
profile_name = "order-feed"
# category, manufacturer, customer, order
entity = "order"
page_size = 500
# Skip records before the first page (ignored when resuming)
# offset = 1000
# Stop after this many records (soft abort, output is kept)
# limit = 10000
output_dir = "./export"
# Pack the output into <output_dir>/<profile_name>.zip
create_zip = true
# Continue after the last checkpointed id
resume = false
# creates_initial_public_deployment, can_include_hidden, requires_currency
features = ["requires_currency"]

[export.filter]
# entity_ids = [1, 2, 3]
created_from = "2024-01-01T00:00:00Z"
# created_to = "2024-12-31T23:59:59Z"
store_id = 1
include_hidden = false

[export.projection]
language_id = 1
currency_code = "EUR"
# Restrict the emitted top-level keys; "id" is always kept
# fields = ["id", "order_number", "order_total", "items"]

[deployment]
# Publish all destinations concurrently
parallel = false
public_root = "./public/exchange"
http_timeout_seconds = 120
ftp_timeout_seconds = 30

[[deployments]]
name = "archive"
kind = "filesystem"
path = "/srv/exports/orders"

[[deployments]]
name = "partner-ftp"
kind = "ftp"
url = "ftp://ftp.partner.example.com/incoming"
username = "courier"
password = "${COURIER_FTP_PASSWORD}"
use_ssl = true
zip_artifact = true

[[deployments]]
name = "partner-http"
kind = "http"
url = "https://partner.example.com/upload"
username = "courier"
password = "${COURIER_HTTP_PASSWORD}"
zip_artifact = true

[[deployments]]
name = "report-mail"
kind = "email"
email_addresses = "reports@example.com; sales@example.com"
email_subject = "Nightly order export"
zip_artifact = true
enabled = false

[state]
# Persist the last exported id after every page
enable_checkpointing = true

[logging]
local_enabled = true
local_path = "/var/log/courier"
# daily, hourly
local_rotation = "daily"
"#
        .to_string()
    }
}
