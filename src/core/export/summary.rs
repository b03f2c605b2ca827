//! Export summary and reporting
//!
//! This module defines structures for tracking and reporting export results.

use super::result::{AbortMode, ExportRunResult};
use crate::deploy::DeploymentResult;
use crate::domain::{DeploymentArtifact, EntityKind};
use crate::log_deployment_result;
use std::time::Duration;

/// Summary of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Export profile
    pub profile_name: String,

    /// Primary entity of the profile
    pub entity: EntityKind,

    /// Record counters and abort state of the run
    pub run: ExportRunResult,

    /// Generated output, when the run got far enough to produce one
    pub artifact: Option<DeploymentArtifact>,

    /// One result per attempted destination
    pub deployments: Vec<DeploymentResult>,

    /// Deployment was skipped (dry run or hard abort)
    pub deployment_skipped: bool,

    /// Duration of the export
    pub duration: Duration,

    /// Errors encountered outside of record rendering
    pub errors: Vec<ExportError>,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new(profile_name: impl Into<String>, entity: EntityKind) -> Self {
        Self {
            profile_name: profile_name.into(),
            entity,
            run: ExportRunResult::new(),
            artifact: None,
            deployments: Vec::new(),
            deployment_skipped: false,
            duration: Duration::from_secs(0),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: ExportError) {
        self.errors.push(error);
    }

    /// Destinations whose publish failed
    pub fn failed_deployments(&self) -> Vec<&DeploymentResult> {
        self.deployments.iter().filter(|d| !d.succeeded()).collect()
    }

    /// The run stopped before all records were processed
    pub fn was_interrupted(&self) -> bool {
        self.run.abort_mode != AbortMode::None
    }

    /// Check if the export was successful (no failures anywhere)
    pub fn is_successful(&self) -> bool {
        self.run.failed == 0
            && !self.run.incomplete
            && self.errors.is_empty()
            && self.failed_deployments().is_empty()
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.run.total();
        if total == 0 {
            return 100.0;
        }
        (self.run.succeeded as f64 / total as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            profile = %self.profile_name,
            entity = %self.entity,
            succeeded = self.run.succeeded,
            failed = self.run.failed,
            last_id = self.run.last_id,
            pages = self.run.pages_processed,
            abort_mode = ?self.run.abort_mode,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export completed"
        );

        if let Some(cause) = &self.run.abort_cause {
            tracing::error!(
                entity_id = cause.entity_id,
                message = %cause.message,
                "Export aborted; output is incomplete"
            );
        }

        for (entity_id, message) in &self.run.errors {
            tracing::warn!(entity_id = *entity_id, message = %message, "Record error");
        }

        for deployment in &self.deployments {
            log_deployment_result!(deployment);
        }

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Export completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    "Export error"
                );
            }
        }
    }
}

/// Type of export error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportErrorType {
    /// Connection error (database)
    Connection,
    /// Page or secondary-data query error
    Query,
    /// Artifact could not be finalized
    Artifact,
    /// State management error
    State,
    /// Configuration error
    Configuration,
    /// Unknown error
    Unknown,
}

/// Export error with context
#[derive(Debug, Clone)]
pub struct ExportError {
    /// Type of error
    pub error_type: ExportErrorType,

    /// Error message
    pub message: String,

    /// Optional context (e.g., profile name, file path)
    pub context: Option<String>,
}

impl ExportError {
    /// Create a new export error
    pub fn new(error_type: ExportErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::DeploymentStatus;

    #[test]
    fn test_export_summary_creation() {
        let summary = ExportSummary::new("feed", EntityKind::Category);

        assert_eq!(summary.profile_name, "feed");
        assert_eq!(summary.run.total(), 0);
        assert_eq!(summary.duration, Duration::from_secs(0));
        assert!(summary.errors.is_empty());
        assert!(summary.is_successful());
    }

    #[test]
    fn test_export_summary_with_duration() {
        let summary =
            ExportSummary::new("feed", EntityKind::Order).with_duration(Duration::from_secs(120));

        assert_eq!(summary.duration, Duration::from_secs(120));
    }

    #[test]
    fn test_record_failure_is_not_successful() {
        let mut summary = ExportSummary::new("feed", EntityKind::Category);
        summary.run.record_success(1);
        assert!(summary.is_successful());

        summary.run.record_failure(2, "bad");
        assert!(!summary.is_successful());
        assert_eq!(summary.success_rate(), 50.0);
    }

    #[test]
    fn test_failed_deployment_is_not_successful() {
        let mut summary = ExportSummary::new("feed", EntityKind::Category);

        let mut ok = DeploymentResult::new("disk");
        ok.succeed();
        let mut failed = DeploymentResult::new("ftp");
        failed.fail("connection refused");
        summary.deployments = vec![ok, failed];

        assert_eq!(summary.failed_deployments().len(), 1);
        assert_eq!(summary.failed_deployments()[0].status, DeploymentStatus::Failed);
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_hard_abort_marks_interrupted() {
        let mut summary = ExportSummary::new("feed", EntityKind::Category);
        summary.run.hard_abort(7, "oom");
        assert!(summary.was_interrupted());
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_export_error_with_context() {
        let error = ExportError::new(ExportErrorType::State, "Checkpoint failed".to_string())
            .with_context("profile=feed".to_string());

        assert_eq!(error.error_type, ExportErrorType::State);
        assert_eq!(error.context, Some("profile=feed".to_string()));
    }

    #[test]
    fn test_export_summary_add_error() {
        let mut summary = ExportSummary::new("feed", EntityKind::Category);
        summary.add_error(ExportError::new(
            ExportErrorType::Artifact,
            "Failed to write".to_string(),
        ));

        assert_eq!(summary.errors.len(), 1);
        assert!(!summary.is_successful());
    }
}
