//! PostgreSQL database integration
//!
//! Reads the shop tables and stores checkpoints and queued e-mails.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use models::FromRow;
