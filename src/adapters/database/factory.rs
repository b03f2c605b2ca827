//! Backend factory
//!
//! Builds the data-access trait objects a pipeline runs against from the
//! configuration.

use crate::adapters::database::traits::{CheckpointStorage, EmailQueue, ExportStore};
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::config::CourierConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Data-access backends of one pipeline
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ExportStore>,
    pub checkpoints: Arc<dyn CheckpointStorage>,
    /// `None` disables e-mail deployments
    pub email_queue: Option<Arc<dyn EmailQueue>>,
}

impl Backends {
    /// Serve every trait from one in-memory store
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            store: store.clone(),
            checkpoints: store.clone(),
            email_queue: Some(store),
        }
    }
}

/// Create the PostgreSQL backends described by the configuration
///
/// All three traits share one connection pool. The checkpoint and e-mail
/// queue tables are created unless the run is a dry run.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or the schema cannot be
/// created.
pub async fn create_backends(config: &CourierConfig) -> Result<Backends> {
    tracing::info!("Creating PostgreSQL backends");
    let client = PostgreSQLClient::new(config.database.clone())?;
    let adapter = Arc::new(PostgreSQLAdapter::new(client));

    if !config.application.dry_run {
        adapter.client().ensure_schema().await?;
    }

    Ok(Backends {
        store: adapter.clone(),
        checkpoints: adapter.clone(),
        email_queue: Some(adapter),
    })
}
