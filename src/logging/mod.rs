//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an optional
//! rolling JSON file layer.
//!
//! ```no_run
//! use courier::logging::init_logging;
//! use courier::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(profile = "category-feed", "Export started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a page
///
/// ```no_run
/// use courier::log_page_start;
///
/// log_page_start!(3, 1500, 500);
/// ```
#[macro_export]
macro_rules! log_page_start {
    ($page:expr, $last_id:expr, $size:expr) => {
        tracing::debug!(
            page = $page,
            after_id = $last_id,
            page_size = $size,
            "Fetching page"
        );
    };
}

/// Log a record that failed to render
///
/// ```no_run
/// use courier::log_record_failure;
/// use courier::domain::CourierError;
///
/// let error = CourierError::Record("missing name".to_string());
/// log_record_failure!(42, &error);
/// ```
#[macro_export]
macro_rules! log_record_failure {
    ($id:expr, $error:expr) => {
        tracing::warn!(
            entity_id = $id,
            error = %$error,
            "Failed to export record"
        );
    };
}

/// Log the outcome of one destination
///
/// ```no_run
/// use courier::log_deployment_result;
/// use courier::deploy::DeploymentResult;
///
/// let result = DeploymentResult::new("public");
/// log_deployment_result!(&result);
/// ```
#[macro_export]
macro_rules! log_deployment_result {
    ($result:expr) => {
        match &$result.last_error {
            None => tracing::info!(
                deployment = %$result.name,
                status = ?$result.status,
                "Deployment finished"
            ),
            Some(error) => tracing::error!(
                deployment = %$result.name,
                status = ?$result.status,
                error = %error,
                "Deployment failed"
            ),
        }
    };
}
