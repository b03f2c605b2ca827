//! Artifact deployment
//!
//! A finished artifact is published to every enabled destination of the
//! profile. Each destination gets its own [`DeploymentResult`]; a failing
//! destination never prevents the others from being attempted.
//!
//! # Transports
//!
//! - [`filesystem`] - copy to a local directory or below the public root
//! - [`email`] - queue one message per recipient with the files attached
//! - [`ftp`] - upload over FTP/FTPS, mirroring the directory tree
//! - [`http`] - one multipart POST, or one PUT per file (legacy)

pub mod email;
pub mod filesystem;
pub mod ftp;
pub mod http;

use crate::adapters::database::traits::EmailQueue;
use crate::config::{DeploymentConfig, DeploymentKind, DeploymentSettings, ExportFeature};
use crate::domain::{CourierError, DeploymentArtifact, DeploymentError, Result};
use crate::log_deployment_result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use email::EmailPublisher;
pub use filesystem::FilesystemPublisher;
pub use ftp::FtpPublisher;
pub use http::{HttpLegacyPublisher, HttpPublisher};

/// Name of the destination added for `CreatesInitialPublicDeployment`
pub const IMPLICIT_PUBLIC_DEPLOYMENT: &str = "public";

/// Lifecycle of one publish attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
}

/// Outcome of publishing to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub name: String,
    pub status: DeploymentStatus,
    /// Human-readable failure; `None` means success
    pub last_error: Option<String>,
    pub last_execution_utc: Option<DateTime<Utc>>,
    /// Files delivered by the attempt
    pub files_published: usize,
}

impl DeploymentResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DeploymentStatus::NotStarted,
            last_error: None,
            last_execution_utc: None,
            files_published: 0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.last_error.is_none()
    }

    pub fn start(&mut self) {
        self.status = DeploymentStatus::InProgress;
        self.last_execution_utc = Some(Utc::now());
    }

    pub fn succeed(&mut self) {
        self.status = DeploymentStatus::Succeeded;
        self.last_error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = DeploymentStatus::Failed;
        self.last_error = Some(message.into());
    }
}

/// Transport selected by a destination's kind
pub enum Publisher {
    Filesystem(FilesystemPublisher),
    Email(EmailPublisher),
    Ftp(FtpPublisher),
    Http(HttpPublisher),
    HttpLegacy(HttpLegacyPublisher),
}

impl Publisher {
    /// Build the publisher for `destination`
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be set up (no e-mail queue,
    /// unusable HTTP client settings).
    pub fn for_destination(
        destination: &DeploymentConfig,
        settings: &DeploymentSettings,
        email_queue: Option<&Arc<dyn EmailQueue>>,
    ) -> Result<Self> {
        let publisher = match destination.kind {
            DeploymentKind::Filesystem => Publisher::Filesystem(FilesystemPublisher::new(None)),
            DeploymentKind::PublicFolder => Publisher::Filesystem(FilesystemPublisher::new(Some(
                PathBuf::from(&settings.public_root),
            ))),
            DeploymentKind::Email => {
                let queue = email_queue.ok_or_else(|| {
                    DeploymentError::InvalidDestination(format!(
                        "deployment '{}': no e-mail queue is configured",
                        destination.name
                    ))
                })?;
                Publisher::Email(EmailPublisher::new(Arc::clone(queue)))
            }
            DeploymentKind::Ftp => Publisher::Ftp(FtpPublisher::new(settings.ftp_timeout_seconds)),
            DeploymentKind::Http => Publisher::Http(HttpPublisher::new(settings.http_timeout_seconds)?),
            DeploymentKind::HttpLegacy => {
                Publisher::HttpLegacy(HttpLegacyPublisher::new(settings.http_timeout_seconds)?)
            }
        };
        Ok(publisher)
    }

    /// Deliver the artifact; returns the number of files published
    ///
    /// Transports that deliver file by file stop at the next file once
    /// `cancel` fires.
    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        match self {
            Publisher::Filesystem(p) => p.publish(destination, artifact, cancel).await,
            Publisher::Email(p) => p.publish(destination, artifact, cancel).await,
            Publisher::Ftp(p) => p.publish(destination, artifact, cancel).await,
            Publisher::Http(p) => p.publish(destination, artifact, cancel).await,
            Publisher::HttpLegacy(p) => p.publish(destination, artifact, cancel).await,
        }
    }
}

/// Publishes an artifact to a set of destinations
pub struct Deployer {
    settings: DeploymentSettings,
    email_queue: Option<Arc<dyn EmailQueue>>,
}

impl Deployer {
    pub fn new(settings: DeploymentSettings, email_queue: Option<Arc<dyn EmailQueue>>) -> Self {
        Self {
            settings,
            email_queue,
        }
    }

    /// Enabled destinations, plus the implicit public folder when the
    /// provider asks for one and none is configured
    pub fn destinations(
        configured: &[DeploymentConfig],
        features: &[ExportFeature],
    ) -> Vec<DeploymentConfig> {
        let mut destinations: Vec<DeploymentConfig> =
            configured.iter().filter(|d| d.enabled).cloned().collect();

        let has_public = configured
            .iter()
            .any(|d| d.kind == DeploymentKind::PublicFolder);
        if features.contains(&ExportFeature::CreatesInitialPublicDeployment) && !has_public {
            tracing::debug!("Adding implicit public folder deployment");
            destinations.push(DeploymentConfig::new(
                IMPLICIT_PUBLIC_DEPLOYMENT,
                DeploymentKind::PublicFolder,
            ));
        }

        destinations
    }

    /// Publish to every destination and collect one result each
    ///
    /// Destinations run concurrently when `deployment.parallel` is set, in
    /// configuration order otherwise.
    pub async fn deploy_all(
        &self,
        destinations: &[DeploymentConfig],
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Vec<DeploymentResult> {
        if self.settings.parallel {
            futures::future::join_all(
                destinations
                    .iter()
                    .map(|destination| self.deploy(destination, artifact, cancel)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(destinations.len());
            for destination in destinations {
                results.push(self.deploy(destination, artifact, cancel).await);
            }
            results
        }
    }

    /// Publish to one destination; failures end up in the result
    pub async fn deploy(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> DeploymentResult {
        let mut result = DeploymentResult::new(&destination.name);
        result.start();

        tracing::info!(
            deployment = %destination.name,
            kind = ?destination.kind,
            "Publishing artifact"
        );

        let outcome = match Publisher::for_destination(
            destination,
            &self.settings,
            self.email_queue.as_ref(),
        ) {
            Ok(publisher) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CourierError::Cancelled),
                    outcome = publisher.publish(destination, artifact, cancel) => outcome,
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(files) => {
                result.files_published = files;
                result.succeed();
            }
            Err(e) => {
                tracing::debug!(deployment = %destination.name, error = ?e, "Publish error detail");
                result.fail(e.to_string());
            }
        }

        log_deployment_result!(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(dir: &TempDir) -> DeploymentArtifact {
        let out = dir.path().join("feed");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("feed.jsonl"), "{\"id\":1}\n").unwrap();
        DeploymentArtifact::new("feed", out).with_record_count(1)
    }

    fn settings(dir: &TempDir, parallel: bool) -> DeploymentSettings {
        DeploymentSettings {
            parallel,
            public_root: dir.path().join("public").to_string_lossy().to_string(),
            http_timeout_seconds: 5,
            ftp_timeout_seconds: 1,
        }
    }

    #[test]
    fn test_result_state_machine() {
        let mut result = DeploymentResult::new("disk");
        assert_eq!(result.status, DeploymentStatus::NotStarted);

        result.start();
        assert_eq!(result.status, DeploymentStatus::InProgress);
        assert!(result.last_execution_utc.is_some());

        result.fail("disk full");
        assert!(!result.succeeded());
        assert_eq!(result.status, DeploymentStatus::Failed);

        result.succeed();
        assert!(result.succeeded());
    }

    #[test]
    fn test_destinations_skip_disabled_and_add_public() {
        let mut disabled = DeploymentConfig::new("old-ftp", DeploymentKind::Ftp);
        disabled.enabled = false;
        let mut disk = DeploymentConfig::new("disk", DeploymentKind::Filesystem);
        disk.path = Some("/srv/feeds".to_string());

        let configured = vec![disabled, disk];
        let names = |d: Vec<DeploymentConfig>| d.into_iter().map(|d| d.name).collect::<Vec<_>>();

        assert_eq!(names(Deployer::destinations(&configured, &[])), vec!["disk"]);
        assert_eq!(
            names(Deployer::destinations(
                &configured,
                &[ExportFeature::CreatesInitialPublicDeployment]
            )),
            vec!["disk", IMPLICIT_PUBLIC_DEPLOYMENT]
        );
    }

    #[test]
    fn test_configured_public_folder_suppresses_implicit_one() {
        let public = DeploymentConfig::new("exchange", DeploymentKind::PublicFolder);
        let destinations = Deployer::destinations(
            &[public],
            &[ExportFeature::CreatesInitialPublicDeployment],
        );
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].name, "exchange");
    }

    #[tokio::test]
    async fn test_unreachable_ftp_does_not_block_filesystem() {
        for parallel in [false, true] {
            let dir = TempDir::new().unwrap();
            let artifact = artifact(&dir);

            let mut ftp = DeploymentConfig::new("partner-ftp", DeploymentKind::Ftp);
            ftp.url = Some("ftp://127.0.0.1:1/incoming".to_string());
            let mut disk = DeploymentConfig::new("disk", DeploymentKind::Filesystem);
            disk.path = Some(dir.path().join("target").to_string_lossy().to_string());

            let deployer = Deployer::new(settings(&dir, parallel), None);
            let results = deployer
                .deploy_all(&[ftp, disk], &artifact, &CancellationToken::new())
                .await;

            assert_eq!(results.len(), 2);
            assert!(!results[0].succeeded());
            assert!(!results[0].last_error.as_deref().unwrap_or_default().is_empty());
            assert!(results[1].succeeded());
            assert_eq!(results[1].files_published, 1);
            assert!(dir.path().join("target").join("feed.jsonl").is_file());
            assert!(artifact.directory.join("feed.jsonl").is_file());
        }
    }

    #[tokio::test]
    async fn test_email_without_queue_fails_only_that_destination() {
        let dir = TempDir::new().unwrap();
        let artifact = artifact(&dir);

        let mut email = DeploymentConfig::new("mail", DeploymentKind::Email);
        email.email_addresses = Some("ops@example.com".to_string());

        let deployer = Deployer::new(settings(&dir, false), None);
        let results = deployer
            .deploy_all(
                &[email, DeploymentConfig::new("public", DeploymentKind::PublicFolder)],
                &artifact,
                &CancellationToken::new(),
            )
            .await;

        assert!(!results[0].succeeded());
        assert!(results[1].succeeded());
        assert!(dir.path().join("public").join("feed").join("feed.jsonl").is_file());
    }

    #[tokio::test]
    async fn test_cancelled_deploy_is_failed() {
        let dir = TempDir::new().unwrap();
        let artifact = artifact(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let deployer = Deployer::new(settings(&dir, false), None);
        let mut ftp = DeploymentConfig::new("partner-ftp", DeploymentKind::Ftp);
        ftp.url = Some("ftp://127.0.0.1:1/".to_string());
        let result = deployer.deploy(&ftp, &artifact, &cancel).await;

        assert_eq!(result.status, DeploymentStatus::Failed);
        assert_eq!(result.last_error.as_deref(), Some("Operation cancelled"));
    }
}
