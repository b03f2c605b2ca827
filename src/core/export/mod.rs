//! Export runs and the pipeline around them
//!
//! - [`context`] - Export Run Context: run config, lookups, abort state
//! - [`run`] - the page loop driving one run
//! - [`renderer`] - record rendering (JSON lines)
//! - [`coordinator`] - the full pipeline: run, archive, deploy, checkpoint
//! - [`summary`] - run summary and error classification

pub mod archive;
pub mod context;
pub mod coordinator;
pub mod lookups;
pub mod renderer;
pub mod result;
pub mod run;
pub mod summary;

pub use archive::create_archive;
pub use context::{ExportContext, ExportRunConfig};
pub use coordinator::{error_type, ExportPipeline};
pub use lookups::{GlobalLocalization, GlobalLookups, Slugs, Translations};
pub use renderer::{JsonDocument, JsonLinesRenderer, RecordRenderer};
pub use result::{AbortCause, AbortMode, ExportRunResult};
pub use run::{run_export, PageProgress};
pub use summary::{ExportError, ExportErrorType, ExportSummary};
