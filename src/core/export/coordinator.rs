//! Export pipeline - main orchestrator for one export profile
//!
//! Connects to the store, runs the page loop for the profile's entity,
//! finalizes the artifact, publishes it and records the outcome in the
//! profile's checkpoint.

use super::archive::create_archive;
use super::context::{ExportContext, ExportRunConfig};
use super::renderer::{JsonDocument, JsonLinesRenderer};
use super::result::{AbortMode, ExportRunResult};
use super::run::{run_export, PageProgress};
use super::summary::{ExportError, ExportErrorType, ExportSummary};
use crate::adapters::database::{create_backends, Backends};
use crate::config::CourierConfig;
use crate::core::state::{Checkpoint, StateManager};
use crate::deploy::Deployer;
use crate::domain::{
    Category, CourierError, Customer, DataAccessError, DeploymentArtifact, EntityId, EntityKind,
    Manufacturer, Order, Result,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Export pipeline
pub struct ExportPipeline {
    config: CourierConfig,
    backends: Backends,
    state_manager: StateManager,
    cancel: CancellationToken,
}

impl ExportPipeline {
    /// Create a pipeline over the configured PostgreSQL database
    pub async fn new(config: CourierConfig, cancel: CancellationToken) -> Result<Self> {
        let backends = create_backends(&config).await?;
        Ok(Self::with_backends(config, backends, cancel))
    }

    /// Create a pipeline over already constructed backends
    pub fn with_backends(
        config: CourierConfig,
        backends: Backends,
        cancel: CancellationToken,
    ) -> Self {
        let state_manager = StateManager::new_with_storage(Arc::clone(&backends.checkpoints))
            .with_dry_run(config.application.dry_run);
        Self {
            config,
            backends,
            state_manager,
            cancel,
        }
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    /// Execute the export
    ///
    /// 1. Validates configuration and tests the connection
    /// 2. Loads the checkpoint (resuming after its `last_id` when enabled)
    /// 3. Runs the page loop for the profile's entity
    /// 4. Zips the artifact when requested
    /// 5. Publishes to every destination unless the run hard-aborted, was
    ///    cancelled or is a dry run
    /// 6. Saves the final checkpoint
    ///
    /// # Errors
    ///
    /// Returns the structural error that stopped the run (connection, page
    /// query or secondary load). Record failures, artifact problems and failed
    /// deployments are reported in the summary instead.
    pub async fn execute(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let export = &self.config.export;
        let dry_run = self.config.application.dry_run;
        let mut summary = ExportSummary::new(&export.profile_name, export.entity);

        tracing::info!(
            profile = %export.profile_name,
            entity = %export.entity,
            dry_run,
            "Starting export"
        );

        if let Err(e) = self.config.validate() {
            summary.add_error(ExportError::new(ExportErrorType::Configuration, e));
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        self.backends.store.test_connection().await?;

        let mut checkpoint = self
            .state_manager
            .load_or_new(&export.profile_name, export.entity)
            .await?;
        let resume_after = if export.resume {
            checkpoint.resume_after()
        } else {
            0
        };
        if resume_after == 0 {
            checkpoint.reset_cursor();
        } else {
            tracing::info!(last_id = resume_after, "Resuming after previous run");
        }
        checkpoint.mark_started();
        self.save_checkpoint(&checkpoint, &mut summary).await;

        let run_config = Arc::new(ExportRunConfig::from_config(export, dry_run));

        let run = match export.entity {
            EntityKind::Category => {
                self.run_entity::<Category>(&run_config, resume_after, &mut checkpoint)
                    .await
            }
            EntityKind::Manufacturer => {
                self.run_entity::<Manufacturer>(&run_config, resume_after, &mut checkpoint)
                    .await
            }
            EntityKind::Customer => {
                self.run_entity::<Customer>(&run_config, resume_after, &mut checkpoint)
                    .await
            }
            EntityKind::Order => {
                self.run_entity::<Order>(&run_config, resume_after, &mut checkpoint)
                    .await
            }
        };

        let run = match run {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(error = %e, "Export run failed");
                checkpoint.mark_failed();
                self.save_checkpoint(&checkpoint, &mut summary).await;
                return Err(e);
            }
        };

        let cancelled = self.cancel.is_cancelled();
        let hard_aborted = run.abort_mode == AbortMode::Hard;

        let mut artifact =
            DeploymentArtifact::new(&run_config.profile_name, run_config.artifact_dir())
                .with_record_count(run.succeeded);
        if run_config.create_zip && !hard_aborted {
            match create_archive(&artifact, &run_config.zip_path()).await {
                Ok(zip_path) => artifact = artifact.with_zip(zip_path),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create archive");
                    summary.add_error(
                        ExportError::new(ExportErrorType::Artifact, e.to_string())
                            .with_context(format!("zip={}", run_config.zip_path().display())),
                    );
                }
            }
        }

        if hard_aborted || cancelled || dry_run {
            tracing::warn!(hard_aborted, cancelled, dry_run, "Skipping deployment");
            summary.deployment_skipped = true;
        } else {
            let destinations =
                Deployer::destinations(&self.config.deployments, &run_config.features);
            let deployer = Deployer::new(
                self.config.deployment.clone(),
                self.backends.email_queue.clone(),
            );
            summary.deployments = deployer
                .deploy_all(&destinations, &artifact, &self.cancel)
                .await;
        }

        checkpoint.record_page(run.last_id, 0);
        if !self.config.state.enable_checkpointing {
            checkpoint.records_exported = run.total() as u64;
        }
        if hard_aborted {
            checkpoint.mark_failed();
        } else if cancelled {
            checkpoint.mark_interrupted();
        } else {
            checkpoint.mark_completed();
        }
        self.save_checkpoint(&checkpoint, &mut summary).await;

        summary.run = run;
        summary.artifact = Some(artifact);
        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    async fn run_entity<P: JsonDocument>(
        &self,
        run_config: &Arc<ExportRunConfig>,
        resume_after: EntityId,
        checkpoint: &mut Checkpoint,
    ) -> Result<ExportRunResult> {
        let ctx = ExportContext::<P>::new(
            Arc::clone(run_config),
            Arc::clone(&self.backends.store),
            self.cancel.clone(),
            resume_after,
        )
        .await?;

        let progress = if self.config.state.enable_checkpointing {
            Some(PageProgress {
                state: &self.state_manager,
                checkpoint,
            })
        } else {
            None
        };

        let mut renderer = JsonLinesRenderer::new();
        run_export(ctx, &mut renderer, progress).await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint, summary: &mut ExportSummary) {
        if let Err(e) = self.state_manager.save_checkpoint(checkpoint).await {
            tracing::warn!(error = %e, "Failed to save checkpoint");
            summary.add_error(
                ExportError::new(ExportErrorType::State, e.to_string())
                    .with_context(format!("profile={}", checkpoint.profile_name)),
            );
        }
    }
}

/// Classify an error that stopped a run
pub fn error_type(error: &CourierError) -> ExportErrorType {
    match error {
        CourierError::Connection(_)
        | CourierError::DataAccess(DataAccessError::ConnectionFailed(_)) => {
            ExportErrorType::Connection
        }
        CourierError::Database(_) | CourierError::DataAccess(_) | CourierError::DataLoad(_) => {
            ExportErrorType::Query
        }
        CourierError::State(_) => ExportErrorType::State,
        CourierError::Configuration(_) => ExportErrorType::Configuration,
        _ => ExportErrorType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::CheckpointStorage;
    use crate::adapters::memory::{MemoryData, MemoryStore};
    use crate::core::state::ExportStatus;
    use crate::domain::ProductCategory;
    use chrono::Utc;
    use tempfile::TempDir;

    fn categories(count: EntityId) -> Vec<Category> {
        (1..=count)
            .map(|id| Category {
                id,
                name: format!("Category {id}"),
                parent_id: None,
                media_file_id: None,
                published: true,
                updated_on_utc: Utc::now(),
            })
            .collect()
    }

    fn config(dir: &TempDir, extra: &str) -> CourierConfig {
        let toml = format!(
            r#"
[application]
log_level = "info"

[database]
connection_string = "postgres://localhost/shop"

[export]
profile_name = "feed"
entity = "category"
page_size = 10
output_dir = "{out}"

[deployment]
public_root = "{public}"

[logging]
local_enabled = false
{extra}
"#,
            out = dir.path().join("out").display(),
            public = dir.path().join("public").display(),
        );
        toml::from_str(&toml).unwrap()
    }

    fn pipeline(config: CourierConfig, store: Arc<MemoryStore>) -> ExportPipeline {
        ExportPipeline::with_backends(
            config,
            Backends::from_memory(store),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_export_writes_zips_and_deploys() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new_shared(MemoryData {
            categories: categories(25),
            product_categories: vec![ProductCategory {
                id: 1,
                category_id: 3,
                product_id: 42,
                display_order: 0,
            }],
            ..MemoryData::default()
        });
        let target = dir.path().join("target");
        let config = config(
            &dir,
            &format!(
                r#"
[[deployments]]
name = "disk"
kind = "filesystem"
path = "{}"
zip_artifact = true
"#,
                target.display()
            ),
        );
        let mut config = config;
        config.export.create_zip = true;

        let summary = pipeline(config, store.clone()).execute().await.unwrap();

        assert!(summary.is_successful());
        assert_eq!(summary.run.succeeded, 25);
        assert_eq!(summary.run.pages_processed, 3);
        assert_eq!(summary.deployments.len(), 1);
        assert!(summary.deployments[0].succeeded());
        assert!(target.join("feed.zip").is_file());

        let jsonl = std::fs::read_to_string(dir.path().join("out").join("feed").join("feed.jsonl"))
            .unwrap();
        assert_eq!(jsonl.lines().count(), 25);

        let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
        assert_eq!(checkpoint.status, ExportStatus::Completed);
        assert_eq!(checkpoint.last_id, 25);
        assert_eq!(checkpoint.records_exported, 25);
    }

    #[tokio::test]
    async fn test_dry_run_skips_deployment_and_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new_shared(MemoryData {
            categories: categories(5),
            ..MemoryData::default()
        });
        let mut config = config(&dir, "");
        config.application.dry_run = true;
        config.export.features = vec![crate::config::ExportFeature::CreatesInitialPublicDeployment];

        let summary = pipeline(config, store.clone()).execute().await.unwrap();

        assert!(summary.deployment_skipped);
        assert!(summary.deployments.is_empty());
        assert!(!dir.path().join("public").exists());
        assert!(store.load_checkpoint("feed").await.unwrap().is_none());
        assert_eq!(summary.run.succeeded, 5);
    }

    #[tokio::test]
    async fn test_resume_continues_after_interrupted_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new_shared(MemoryData {
            categories: categories(30),
            ..MemoryData::default()
        });
        let mut previous = Checkpoint::new("feed", EntityKind::Category);
        previous.mark_started();
        previous.record_page(20, 20);
        previous.mark_interrupted();
        store.save_checkpoint(&previous, false).await.unwrap();

        let mut config = config(&dir, "");
        config.export.resume = true;
        let summary = pipeline(config, store.clone()).execute().await.unwrap();

        assert_eq!(summary.run.succeeded, 10);
        assert_eq!(summary.run.last_id, 30);
        let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
        assert!(checkpoint.is_completed());
    }

    #[tokio::test]
    async fn test_without_resume_starts_from_first_record() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new_shared(MemoryData {
            categories: categories(30),
            ..MemoryData::default()
        });
        let mut previous = Checkpoint::new("feed", EntityKind::Category);
        previous.mark_started();
        previous.record_page(20, 20);
        previous.mark_interrupted();
        store.save_checkpoint(&previous, false).await.unwrap();

        let summary = pipeline(config(&dir, ""), store).execute().await.unwrap();
        assert_eq!(summary.run.succeeded, 30);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_interrupted_without_deployment() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new_shared(MemoryData {
            categories: categories(5),
            ..MemoryData::default()
        });
        let mut config = config(&dir, "");
        config.export.features = vec![crate::config::ExportFeature::CreatesInitialPublicDeployment];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = ExportPipeline::with_backends(config, Backends::from_memory(store.clone()), cancel)
            .execute()
            .await
            .unwrap();

        assert!(summary.was_interrupted());
        assert!(summary.deployment_skipped);
        let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
        assert_eq!(checkpoint.status, ExportStatus::Interrupted);
    }

    #[tokio::test]
    async fn test_query_failure_marks_checkpoint_failed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            MemoryStore::from_data(MemoryData {
                categories: categories(5),
                ..MemoryData::default()
            })
            .fail_on("category_page"),
        );

        let err = pipeline(config(&dir, ""), store.clone())
            .execute()
            .await
            .unwrap_err();
        assert_eq!(error_type(&err), ExportErrorType::Query);

        let checkpoint = store.load_checkpoint("feed").await.unwrap().unwrap();
        assert_eq!(checkpoint.status, ExportStatus::Failed);
    }

    #[test]
    fn test_error_type_classification() {
        assert_eq!(
            error_type(&CourierError::Connection("refused".to_string())),
            ExportErrorType::Connection
        );
        assert_eq!(
            error_type(&DataAccessError::ConnectionFailed("x".to_string()).into()),
            ExportErrorType::Connection
        );
        assert_eq!(
            error_type(&CourierError::DataLoad("x".to_string())),
            ExportErrorType::Query
        );
        assert_eq!(error_type(&CourierError::Cancelled), ExportErrorType::Unknown);
    }
}
