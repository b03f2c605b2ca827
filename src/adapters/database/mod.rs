//! Database abstraction layer
//!
//! Trait-based access to the shop database, the checkpoint table and the
//! e-mail queue, so export runs work against PostgreSQL or the in-memory
//! store alike.

pub mod factory;
pub mod traits;

pub use factory::{create_backends, Backends};
pub use traits::{CheckpointStorage, EmailQueue, ExportStore};
