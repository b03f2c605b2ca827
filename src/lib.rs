// Courier - Batched shop data export and deployment
// Copyright (c) 2025 Courier Contributors
// Licensed under the MIT License

//! # Courier - batched shop data export and deployment
//!
//! Courier reads one entity type of a shop database in pages, renders every
//! record together with its related data, and publishes the output to any
//! number of destinations.
//!
//! ## Overview
//!
//! - **Paging** primary records by offset or by id cursor
//! - **Batching** secondary loads per page: each relation is fetched with one
//!   query the first time any record of the page asks for it
//! - **Aborting** softly (limit or cancellation, output kept) or hard (fatal
//!   record error, output flagged incomplete)
//! - **Deploying** to the file system, the public folder, e-mail, FTP and HTTP,
//!   each destination independently
//! - **Resuming** from a per-profile checkpoint
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Paging, batch contexts, export runs, checkpoints
//! - [`deploy`] - Publishers per transport
//! - [`adapters`] - PostgreSQL and in-memory data access
//! - [`domain`] - Records, artifacts and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::config::load_config;
//! use courier::core::export::ExportPipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("courier.toml")?;
//!     let pipeline = ExportPipeline::new(config, CancellationToken::new()).await?;
//!
//!     let summary = pipeline.execute().await?;
//!     println!("Exported {} record(s)", summary.run.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Contexts
//!
//! A page of primary records gets a [`core::batch::BatchContext`]. Its
//! relations are [`core::batch::LazyMultimap`]s keyed by the page's ids:
//!
//! ```rust
//! use courier::core::batch::{LazyMultimap, Multimap};
//! use futures::FutureExt;
//!
//! # async fn example() -> courier::domain::Result<()> {
//! let tags = LazyMultimap::new(vec![1_i64, 2, 3], |ids: Vec<i64>| {
//!     async move {
//!         Ok::<_, courier::domain::CourierError>(Multimap::group(
//!             ids.into_iter().map(|id| (id, format!("tag-{id}"))),
//!             |(id, _)| *id,
//!         ))
//!     }
//!     .boxed()
//! });
//!
//! assert_eq!(tags.get(&2).await?.len(), 1);
//! assert!(tags.is_loaded());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`domain::Result`] with [`domain::CourierError`].
//! Transport failures of publishers are [`domain::DeploymentError`]s and never
//! affect other destinations.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod deploy;
pub mod domain;
pub mod logging;
