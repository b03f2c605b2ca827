//! HTTP publishing
//!
//! [`HttpPublisher`] posts every artifact file in one `multipart/form-data`
//! request. [`HttpLegacyPublisher`] issues one `PUT` per file against
//! `<url>/<relative path>` for receivers that predate multipart support.

use crate::config::DeploymentConfig;
use crate::domain::email::mime_type_for;
use crate::domain::{ArtifactFile, CourierError, DeploymentArtifact, DeploymentError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Response bodies are cut to this many characters in error messages
const MAX_ERROR_BODY_CHARS: usize = 2000;

fn build_client(timeout_seconds: u64) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(timeout_seconds.min(30)))
        .build()
        .map_err(|e| CourierError::Configuration(format!("Failed to build HTTP client: {e}")))
}

fn target_url(destination: &DeploymentConfig) -> Result<&str> {
    destination
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            DeploymentError::InvalidDestination(format!(
                "deployment '{}': url is required",
                destination.name
            ))
            .into()
        })
}

fn with_auth(request: RequestBuilder, destination: &DeploymentConfig) -> RequestBuilder {
    match &destination.username {
        Some(username) => request.basic_auth(
            username,
            destination
                .password
                .as_ref()
                .map(|p| p.expose_secret().as_str().to_string()),
        ),
        None => request,
    }
}

async fn read_file(file: &ArtifactFile) -> Result<Vec<u8>> {
    tokio::fs::read(&file.path).await.map_err(|e| {
        DeploymentError::ArtifactMissing(format!("{}: {e}", file.path.display())).into()
    })
}

/// Turn a non-success response into [`DeploymentError::HttpStatus`]
async fn check_status(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(DeploymentError::HttpStatus {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
    .into())
}

fn connection_failed(url: &str, e: &reqwest::Error) -> CourierError {
    DeploymentError::ConnectionFailed(format!("{url}: {e}")).into()
}

/// Single multipart POST of all files
pub struct HttpPublisher {
    client: Client,
}

impl HttpPublisher {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
        })
    }

    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let url = target_url(destination)?;
        let files = artifact
            .files(destination.zip_artifact)
            .map_err(|e| DeploymentError::ArtifactMissing(e.to_string()))?;

        let mut form = Form::new();
        for file in &files {
            let part = Part::bytes(read_file(file).await?)
                .file_name(file.relative_path.clone())
                .mime_str(mime_type_for(&file.relative_path))
                .map_err(|e| CourierError::Other(format!("Invalid MIME type: {e}")))?;
            form = form.part(file.relative_path.clone(), part);
        }

        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        tracing::debug!(url = %url, files = files.len(), "Posting multipart upload");

        let request = with_auth(self.client.post(url), destination).multipart(form);
        let response = request
            .send()
            .await
            .map_err(|e| connection_failed(url, &e))?;
        check_status(response).await?;

        Ok(files.len())
    }
}

/// One PUT per file
pub struct HttpLegacyPublisher {
    client: Client,
}

impl HttpLegacyPublisher {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_seconds)?,
        })
    }

    /// Files are sent in order. A connect or timeout error ends the upload;
    /// any other per-file failure is recorded and the next file is tried.
    /// Cancellation is honoured between files.
    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let base = target_url(destination)?.trim_end_matches('/');
        let files = artifact
            .files(destination.zip_artifact)
            .map_err(|e| DeploymentError::ArtifactMissing(e.to_string()))?;

        let mut uploaded = 0;
        let mut failures = Vec::new();

        for file in &files {
            if cancel.is_cancelled() {
                tracing::info!(uploaded, total = files.len(), "HTTP upload cancelled");
                return Err(CourierError::Cancelled);
            }
            let url = format!("{base}/{}", file.relative_path);
            let data = read_file(file).await?;

            let request = with_auth(self.client.put(&url), destination)
                .header("Content-Type", mime_type_for(&file.relative_path))
                .body(data);

            match request.send().await {
                Ok(response) => match check_status(response).await {
                    Ok(()) => {
                        uploaded += 1;
                        tracing::debug!(url = %url, "Uploaded file");
                    }
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "HTTP upload failed");
                        failures.push(format!("{}: {e}", file.relative_path));
                    }
                },
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if uploaded == 0 {
                        return Err(connection_failed(&url, &e));
                    }
                    failures.push(format!("{}: {e}", file.relative_path));
                    break;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "HTTP upload failed");
                    failures.push(format!("{}: {e}", file.relative_path));
                }
            }
        }

        if failures.is_empty() {
            Ok(uploaded)
        } else {
            Err(DeploymentError::PartialUpload {
                uploaded,
                total: files.len(),
                message: failures.join("; "),
            }
            .into())
        }
    }
}
