//! Checkpoint model for resumable export runs
//!
//! One checkpoint exists per export profile. It records the last primary id
//! that was fully processed so that a later run can continue by cursor.

use crate::domain::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the last run of a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Failed,
    /// Stopped early by cancellation, a record limit, or a hard abort
    Interrupted,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::NotStarted => "not_started",
            ExportStatus::InProgress => "in_progress",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ExportStatus::NotStarted),
            "in_progress" => Ok(ExportStatus::InProgress),
            "completed" => Ok(ExportStatus::Completed),
            "failed" => Ok(ExportStatus::Failed),
            "interrupted" => Ok(ExportStatus::Interrupted),
            other => Err(format!("unknown export status '{other}'")),
        }
    }
}

/// Progress of one export profile
///
/// # Examples
///
/// ```
/// use courier::core::state::{Checkpoint, ExportStatus};
/// use courier::domain::EntityKind;
///
/// let mut checkpoint = Checkpoint::new("category-feed", EntityKind::Category);
/// checkpoint.mark_started();
/// checkpoint.record_page(500, 500);
///
/// assert_eq!(checkpoint.last_id, 500);
/// assert_eq!(checkpoint.status, ExportStatus::InProgress);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub profile_name: String,

    pub entity: EntityKind,

    /// Highest primary id already processed
    pub last_id: EntityId,

    /// Records processed by the run that wrote this checkpoint
    pub records_exported: u64,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub status: ExportStatus,
}

impl Checkpoint {
    pub fn new(profile_name: impl Into<String>, entity: EntityKind) -> Self {
        Self {
            profile_name: profile_name.into(),
            entity,
            last_id: 0,
            records_exported: 0,
            started_at: Utc::now(),
            completed_at: None,
            status: ExportStatus::NotStarted,
        }
    }

    /// Id to resume after; `0` unless the previous run stopped early
    pub fn resume_after(&self) -> EntityId {
        match self.status {
            ExportStatus::InProgress | ExportStatus::Interrupted | ExportStatus::Failed => {
                self.last_id
            }
            ExportStatus::NotStarted | ExportStatus::Completed => 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExportStatus::Completed
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|completed| completed - self.started_at)
    }

    /// Start a new run, keeping `last_id` for resumption
    pub fn mark_started(&mut self) {
        self.started_at = Utc::now();
        self.completed_at = None;
        self.records_exported = 0;
        self.status = ExportStatus::InProgress;
    }

    /// Forget the cursor so the next run starts from the first record
    pub fn reset_cursor(&mut self) {
        self.last_id = 0;
    }

    /// Advance after a page
    pub fn record_page(&mut self, last_id: EntityId, records: u64) {
        self.last_id = self.last_id.max(last_id);
        self.records_exported += records;
    }

    pub fn mark_completed(&mut self) {
        self.finish(ExportStatus::Completed);
    }

    pub fn mark_failed(&mut self) {
        self.finish(ExportStatus::Failed);
    }

    pub fn mark_interrupted(&mut self) {
        self.finish(ExportStatus::Interrupted);
    }

    fn finish(&mut self, status: ExportStatus) {
        self.completed_at = Some(Utc::now());
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checkpoint() {
        let checkpoint = Checkpoint::new("orders", EntityKind::Order);
        assert_eq!(checkpoint.status, ExportStatus::NotStarted);
        assert_eq!(checkpoint.last_id, 0);
        assert_eq!(checkpoint.resume_after(), 0);
        assert!(checkpoint.duration().is_none());
    }

    #[test]
    fn test_record_page_never_moves_backwards() {
        let mut checkpoint = Checkpoint::new("orders", EntityKind::Order);
        checkpoint.record_page(1000, 500);
        checkpoint.record_page(800, 10);
        assert_eq!(checkpoint.last_id, 1000);
        assert_eq!(checkpoint.records_exported, 510);
    }

    #[test]
    fn test_resume_after_depends_on_status() {
        let mut checkpoint = Checkpoint::new("orders", EntityKind::Order);
        checkpoint.mark_started();
        checkpoint.record_page(1500, 1500);
        assert_eq!(checkpoint.resume_after(), 1500);

        checkpoint.mark_interrupted();
        assert_eq!(checkpoint.resume_after(), 1500);
        assert!(checkpoint.duration().is_some());

        checkpoint.mark_completed();
        assert!(checkpoint.is_completed());
        assert_eq!(checkpoint.resume_after(), 0);

        checkpoint.reset_cursor();
        checkpoint.record_page(200, 200);
        assert_eq!(checkpoint.last_id, 200);
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            ExportStatus::NotStarted,
            ExportStatus::InProgress,
            ExportStatus::Completed,
            ExportStatus::Failed,
            ExportStatus::Interrupted,
        ] {
            assert_eq!(status.as_str().parse::<ExportStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ExportStatus>().is_err());
    }

    #[test]
    fn test_serialization() {
        let checkpoint = Checkpoint::new("customers", EntityKind::Customer);
        let json = serde_json::to_string(&checkpoint).unwrap();
        assert!(json.contains("\"status\":\"not_started\""));
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checkpoint);
    }
}
