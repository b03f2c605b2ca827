//! Domain models and types for Courier.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Export records** ([`Category`], [`Order`], [`MediaFile`], ...)
//! - **Artifacts** ([`DeploymentArtifact`]) produced by a run
//! - **Queued e-mail** ([`QueuedEmail`]) handed to the outbound queue
//! - **Error types** ([`CourierError`], [`DataAccessError`], [`DeploymentError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CourierError>`]:
//!
//! ```rust
//! use courier::domain::{CourierError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(CourierError::Validation("page_size must be > 0".to_string()))
//! }
//! ```

pub mod artifact;
pub mod email;
pub mod entities;
pub mod errors;
pub mod result;

// Re-export commonly used types for convenience
pub use artifact::{ArtifactFile, DeploymentArtifact};
pub use email::{EmailAttachment, QueuedEmail};
pub use entities::{
    Address, Category, Customer, EntityId, EntityKind, GenericAttribute, LocalizedProperty,
    Manufacturer, MediaFile, Order, OrderItem, ProductCategory, ProductManufacturer,
    ReferenceKind, ReferenceRecord, RewardPointsHistory, Shipment, UrlRecord,
};
pub use errors::{CourierError, DataAccessError, DeploymentError};
pub use result::Result;
