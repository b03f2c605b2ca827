//! Page-scoped loading of secondary data
//!
//! Rendering a page of primary records usually needs related rows (product
//! links, addresses, attributes, ...). Loading them per record would issue one
//! query per record and relation. Instead each page gets a [`BatchContext`]
//! whose relations are [`LazyMultimap`]s over the page's key sets: the first
//! access to a relation loads it for the entire page with one query.

pub mod context;
pub mod multimap;
pub mod relations;

pub use context::{distinct_ids, BatchContext, ExportEntity, RelationLoader, RelationSet};
pub use multimap::{LazyMultimap, Multimap, MultimapLoader};
pub use relations::{
    CategoryRelations, CustomerRelations, ManufacturerRelations, OrderRelations,
    CUSTOMER_KEY_GROUP,
};
