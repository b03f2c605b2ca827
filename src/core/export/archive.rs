//! Zip packing of the artifact directory

use crate::domain::{ArtifactFile, CourierError, DeploymentArtifact, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack the artifact's directory into `zip_path`
///
/// Entries keep their paths relative to the artifact directory. An existing
/// archive at `zip_path` is replaced.
///
/// # Errors
///
/// Returns an error if the directory is missing or the archive cannot be
/// written.
pub async fn create_archive(artifact: &DeploymentArtifact, zip_path: &Path) -> Result<PathBuf> {
    let files = artifact.files(false)?;
    let target = zip_path.to_path_buf();

    tracing::info!(
        archive = %target.display(),
        files = files.len(),
        "Creating zip archive"
    );

    tokio::task::spawn_blocking(move || write_archive(&files, &target).map(|()| target))
        .await
        .map_err(|e| CourierError::Export(format!("Archive task failed: {e}")))?
}

fn write_archive(files: &[ArtifactFile], zip_path: &Path) -> Result<()> {
    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut buffer = Vec::new();
    for file in files {
        zip.start_file(file.relative_path.as_str(), options)?;
        buffer.clear();
        File::open(&file.path)?.read_to_end(&mut buffer)?;
        zip.write_all(&buffer)?;
    }

    zip.finish()?.flush()?;
    Ok(())
}
