//! Core business logic for Courier.
//!
//! # Modules
//!
//! - [`paging`] - Offset and cursor page requests
//! - [`batch`] - Batch Contexts with lazily loaded relations per page
//! - [`export`] - Export runs, archiving and the deployment pipeline
//! - [`state`] - Checkpoints for resumable runs
//!
//! # Export Workflow
//!
//! 1. **Load State**: Read the profile checkpoint
//! 2. **Page**: Read primary records in ascending id order
//! 3. **Batch**: Load related rows once per page on first access
//! 4. **Render**: Write one JSON line per record
//! 5. **Archive**: Optionally zip the output directory
//! 6. **Deploy**: Publish to every enabled destination
//! 7. **Checkpoint**: Store the last exported id and run status
//!
//! # Example
//!
//! ```rust,no_run
//! use courier::config::load_config;
//! use courier::core::export::ExportPipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("courier.toml")?;
//! let pipeline = ExportPipeline::new(config, CancellationToken::new()).await?;
//!
//! let summary = pipeline.execute().await?;
//! println!("Exported: {}", summary.run.succeeded);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod export;
pub mod paging;
pub mod state;
