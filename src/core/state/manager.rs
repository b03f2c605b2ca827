//! State manager for checkpoint persistence
//!
//! This module provides the StateManager for loading and saving export
//! checkpoints through a [`CheckpointStorage`] backend.

use crate::adapters::database::traits::CheckpointStorage;
use crate::core::state::checkpoint::Checkpoint;
use crate::domain::{EntityKind, Result};
use std::sync::Arc;

/// State manager for checkpoint persistence
///
/// Checkpoints track the `last_id` cursor of an export profile so an
/// interrupted run can resume after the last completed page.
pub struct StateManager {
    storage: Arc<dyn CheckpointStorage>,
    dry_run: bool,
}

impl StateManager {
    /// Create a new StateManager with a checkpoint storage backend
    pub fn new_with_storage(storage: Arc<dyn CheckpointStorage>) -> Self {
        Self {
            storage,
            dry_run: false,
        }
    }

    /// In dry-run mode checkpoints are logged but not written
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load the checkpoint of a profile
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails for reasons other than "not found".
    pub async fn load_checkpoint(&self, profile_name: &str) -> Result<Option<Checkpoint>> {
        self.storage.load_checkpoint(profile_name).await
    }

    /// Load the checkpoint of a profile, or start a fresh one
    pub async fn load_or_new(&self, profile_name: &str, entity: EntityKind) -> Result<Checkpoint> {
        Ok(self
            .load_checkpoint(profile_name)
            .await?
            .unwrap_or_else(|| Checkpoint::new(profile_name, entity)))
    }

    /// Save a checkpoint (upsert)
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert operation fails.
    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.storage.save_checkpoint(checkpoint, self.dry_run).await
    }

    /// Get all checkpoints, ordered by profile name
    pub async fn get_all_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        self.storage.all_checkpoints().await
    }

    /// Persist progress after a completed page
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint fails.
    pub async fn checkpoint_page(&self, checkpoint: &Checkpoint) -> Result<()> {
        tracing::info!(
            profile = %checkpoint.profile_name,
            last_id = checkpoint.last_id,
            records_exported = checkpoint.records_exported,
            "Checkpointing page"
        );

        self.save_checkpoint(checkpoint).await
    }
}
