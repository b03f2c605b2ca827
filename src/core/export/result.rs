//! Run result accumulator

use crate::domain::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How a run was stopped early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortMode {
    #[default]
    None,
    /// Stop after the current record and keep the output
    Soft,
    /// Stop now; the output is flagged incomplete and not deployed
    Hard,
}

/// The record that triggered a hard abort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortCause {
    pub entity_id: EntityId,
    pub message: String,
}

/// Outcome of one export run
///
/// Created at run start and mutated only by the run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRunResult {
    pub succeeded: usize,
    pub failed: usize,
    /// Highest primary id processed; replay from here to resume
    pub last_id: EntityId,
    /// Error message per failed record
    pub errors: BTreeMap<EntityId, String>,
    pub pages_processed: usize,
    pub abort_mode: AbortMode,
    pub abort_cause: Option<AbortCause>,
    /// Output must not be treated as a full export
    pub incomplete: bool,
    /// Files written by the renderer
    pub files: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExportRunResult {
    pub fn new() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            last_id: 0,
            errors: BTreeMap::new(),
            pages_processed: 0,
            abort_mode: AbortMode::None,
            abort_cause: None,
            incomplete: false,
            files: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Start from a known cursor (resumed runs)
    pub fn resuming_after(last_id: EntityId) -> Self {
        Self {
            last_id,
            ..Self::new()
        }
    }

    pub fn record_success(&mut self, id: EntityId) {
        self.succeeded += 1;
        self.advance(id);
    }

    pub fn record_failure(&mut self, id: EntityId, message: impl Into<String>) {
        self.failed += 1;
        self.errors.insert(id, message.into());
        self.advance(id);
    }

    /// Stop the run on `id`; the record is not counted as failed
    pub fn hard_abort(&mut self, id: EntityId, message: impl Into<String>) {
        self.abort_mode = AbortMode::Hard;
        self.abort_cause = Some(AbortCause {
            entity_id: id,
            message: message.into(),
        });
        self.incomplete = true;
        self.advance(id);
    }

    /// Request a stop after the current record; never downgrades a hard abort
    pub fn soft_abort(&mut self) {
        if self.abort_mode == AbortMode::None {
            self.abort_mode = AbortMode::Soft;
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_mode != AbortMode::None
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|completed| completed - self.started_at)
    }

    fn advance(&mut self, id: EntityId) {
        self.last_id = self.last_id.max(id);
    }
}

impl Default for ExportRunResult {
    fn default() -> Self {
        Self::new()
    }
}
