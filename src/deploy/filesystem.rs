//! Filesystem and public-folder publishing

use crate::config::DeploymentConfig;
use crate::domain::{CourierError, DeploymentArtifact, DeploymentError, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Copies the artifact below a target directory
///
/// Without a root the destination's `path` is the target. With a root
/// (public folder) the target is `<root>/<path>`, where `path` defaults to the
/// profile name.
pub struct FilesystemPublisher {
    root: Option<PathBuf>,
}

impl FilesystemPublisher {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Directory the artifact is copied into
    pub fn target_dir(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
    ) -> Result<PathBuf> {
        let path = destination.path.as_deref().filter(|p| !p.trim().is_empty());
        match (&self.root, path) {
            (Some(root), Some(sub_folder)) => {
                Ok(root.join(sub_folder.trim_matches(|c| c == '/' || c == '\\')))
            }
            (Some(root), None) => Ok(root.join(&artifact.profile_name)),
            (None, Some(path)) => Ok(PathBuf::from(path)),
            (None, None) => Err(DeploymentError::InvalidDestination(format!(
                "deployment '{}': no target path",
                destination.name
            ))
            .into()),
        }
    }

    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let files = artifact
            .files(destination.zip_artifact)
            .map_err(|e| DeploymentError::ArtifactMissing(e.to_string()))?;
        let target = self.target_dir(destination, artifact)?;

        let source_dir = resolve(&artifact.directory).await;
        let resolved_target = resolve(&target).await;
        if resolved_target.starts_with(&source_dir) {
            return Err(DeploymentError::InvalidDestination(format!(
                "deployment '{}': target {} lies inside the artifact directory",
                destination.name,
                target.display()
            ))
            .into());
        }
        for file in &files {
            if resolve(&file.path).await == resolved_target.join(&file.relative_path) {
                return Err(DeploymentError::InvalidDestination(format!(
                    "deployment '{}': {} would be copied onto itself",
                    destination.name,
                    file.path.display()
                ))
                .into());
            }
        }

        tokio::fs::create_dir_all(&target).await.map_err(|e| {
            DeploymentError::CopyFailed(format!("cannot create {}: {e}", target.display()))
        })?;

        for file in &files {
            if cancel.is_cancelled() {
                return Err(CourierError::Cancelled);
            }
            let dest = target.join(&file.relative_path);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    DeploymentError::CopyFailed(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
            tokio::fs::copy(&file.path, &dest).await.map_err(|e| {
                DeploymentError::CopyFailed(format!(
                    "{} -> {}: {e}",
                    file.path.display(),
                    dest.display()
                ))
            })?;
            tracing::debug!(file = %file.relative_path, target = %dest.display(), "Copied file");
        }

        Ok(files.len())
    }
}

/// Absolute form of `path` with every existing ancestor canonicalized
async fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = tokio::fs::canonicalize(existing).await {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return absolute.clone(),
        }
    }
}
