//! E-mail publishing through the outbound queue

use crate::adapters::database::traits::EmailQueue;
use crate::config::DeploymentConfig;
use crate::domain::{
    CourierError, DeploymentArtifact, DeploymentError, EmailAttachment, QueuedEmail, Result,
};
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const EMAIL_PATTERN: &str = r"^[^@\s;,]+@[^@\s;,]+\.[^@\s;,]+$";

/// Split a recipient list on `,` and `;`, keeping valid addresses only
pub fn parse_recipients(list: &str) -> Result<Vec<String>> {
    let email = Regex::new(EMAIL_PATTERN)
        .map_err(|e| CourierError::Other(format!("Invalid e-mail pattern: {e}")))?;
    let mut recipients: Vec<String> = Vec::new();
    for address in list.split([',', ';']).map(str::trim) {
        if address.is_empty() {
            continue;
        }
        if !email.is_match(address) {
            tracing::warn!(address = %address, "Skipping invalid e-mail address");
            continue;
        }
        if !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
            recipients.push(address.to_string());
        }
    }
    Ok(recipients)
}

/// Queues one message per recipient with the artifact files attached
pub struct EmailPublisher {
    queue: Arc<dyn EmailQueue>,
}

impl EmailPublisher {
    pub fn new(queue: Arc<dyn EmailQueue>) -> Self {
        Self { queue }
    }

    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let list = destination.email_addresses.as_deref().unwrap_or_default();
        let recipients = parse_recipients(list)?;
        if recipients.is_empty() {
            return Err(DeploymentError::NoRecipients(list.to_string()).into());
        }

        let files = artifact
            .files(destination.zip_artifact)
            .map_err(|e| DeploymentError::ArtifactMissing(e.to_string()))?;
        let mut attachments = Vec::with_capacity(files.len());
        for file in &files {
            let data = tokio::fs::read(&file.path).await.map_err(|e| {
                DeploymentError::ArtifactMissing(format!("{}: {e}", file.path.display()))
            })?;
            attachments.push(EmailAttachment::new(file.file_name(), data));
        }

        let subject = destination
            .email_subject
            .clone()
            .unwrap_or_else(|| format!("Export '{}'", artifact.profile_name));
        let body = destination.email_body.clone().unwrap_or_else(|| {
            format!(
                "The export '{}' finished with {} record(s).",
                artifact.profile_name, artifact.record_count
            )
        });

        let mut failures = Vec::new();
        for to in &recipients {
            if cancel.is_cancelled() {
                return Err(CourierError::Cancelled);
            }
            let email = QueuedEmail {
                email_account_id: destination.email_account_id,
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
                attachments: attachments.clone(),
                created_on_utc: Utc::now(),
            };
            match self.queue.enqueue(&email).await {
                Ok(id) => tracing::debug!(to = %to, email_id = id, "Queued e-mail"),
                Err(e) => {
                    tracing::warn!(to = %to, error = %e, "Failed to queue e-mail");
                    failures.push(format!("{to}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(DeploymentError::QueueFailed(format!(
                "{} of {} recipient(s) failed: {}",
                failures.len(),
                recipients.len(),
                failures.join("; ")
            ))
            .into());
        }

        Ok(files.len())
    }
}
