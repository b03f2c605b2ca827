//! Generated export output
//!
//! An artifact is either a directory tree of files or that tree packed into a
//! single zip archive named after the export profile.

use crate::domain::{CourierError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file inside an artifact, with its path relative to the artifact root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Absolute (or caller-relative) location on disk
    pub path: PathBuf,
    /// Forward-slash separated path below the artifact root
    pub relative_path: String,
}

impl ArtifactFile {
    /// File name component of the relative path
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// The output of an export run, ready for deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentArtifact {
    /// Export profile the artifact was produced by
    pub profile_name: String,

    /// Directory containing the generated files
    pub directory: PathBuf,

    /// Zip archive of `directory`, when one was created
    pub zip_path: Option<PathBuf>,

    /// Number of records written
    pub record_count: usize,

    /// MIME type hint for the generated files
    pub content_type: String,
}

impl DeploymentArtifact {
    pub fn new(profile_name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            profile_name: profile_name.into(),
            directory: directory.into(),
            zip_path: None,
            record_count: 0,
            content_type: "application/x-ndjson".to_string(),
        }
    }

    pub fn with_zip(mut self, zip_path: impl Into<PathBuf>) -> Self {
        self.zip_path = Some(zip_path.into());
        self
    }

    pub fn with_record_count(mut self, count: usize) -> Self {
        self.record_count = count;
        self
    }

    /// Files to deliver: the zip when `prefer_zip` and one exists, otherwise
    /// every file of the directory tree in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact does not exist on disk.
    pub fn files(&self, prefer_zip: bool) -> Result<Vec<ArtifactFile>> {
        if prefer_zip {
            if let Some(zip_path) = &self.zip_path {
                if !zip_path.is_file() {
                    return Err(CourierError::Io(format!(
                        "Artifact archive not found: {}",
                        zip_path.display()
                    )));
                }
                let name = zip_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| format!("{}.zip", self.profile_name));
                return Ok(vec![ArtifactFile {
                    path: zip_path.clone(),
                    relative_path: name,
                }]);
            }
        }

        if !self.directory.is_dir() {
            return Err(CourierError::Io(format!(
                "Artifact directory not found: {}",
                self.directory.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(&self.directory, &self.directory, &mut files)?;
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<ArtifactFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if path.is_file() {
            let relative = path.strip_prefix(root).map_err(|e| {
                CourierError::Io(format!("{} is outside {}: {e}", path.display(), root.display()))
            })?;
            let relative_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(ArtifactFile {
                path,
                relative_path,
            });
        }
    }
    Ok(())
}
