//! Configuration management for Courier.
//!
//! Courier uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `COURIER_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level, dry run)
//! - [`DatabaseConfig`] - Source PostgreSQL database
//! - [`ExportConfig`] - Export profile (entity, paging, filter, projection)
//! - [`DeploymentConfig`] - One delivery destination (`[[deployments]]`)
//! - [`DeploymentSettings`] - Settings shared by all destinations
//! - [`StateConfig`] - Checkpointing
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [database]
//! connection_string = "${COURIER_DATABASE_URL}"
//!
//! [export]
//! profile_name = "category-feed"
//! entity = "category"
//! page_size = 500
//! create_zip = true
//!
//! [[deployments]]
//! name = "partner-ftp"
//! kind = "ftp"
//! url = "ftp://files.example.com/incoming"
//! username = "feeds"
//! password = "${COURIER_FTP_PASSWORD}"
//! zip_artifact = true
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CourierConfig, DatabaseConfig, DeploymentConfig, DeploymentKind,
    DeploymentSettings, Environment, ExportConfig, ExportFeature, ExportFilter, ExportProjection,
    LoggingConfig, StateConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
