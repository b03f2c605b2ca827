// State management and checkpoint tracking

pub mod checkpoint;
pub mod manager;

pub use checkpoint::{Checkpoint, ExportStatus};
pub use manager::StateManager;
