//! External system integrations for Courier.
//!
//! - [`database`] - Data-access traits and the backend factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-memory implementation used by tests and dry runs
//!
//! # Design Pattern
//!
//! Adapters isolate the shop database behind the traits in
//! [`database::traits`]. Export runs only ever see `Arc<dyn ExportStore>`.

pub mod database;
pub mod memory;
pub mod postgresql;
