//! Per-page batch context
//!
//! A [`BatchContext`] is built for every page of primary entities. It owns the
//! page's ids and one [`LazyMultimap`] per secondary relation, all scoped to
//! that page. Contexts are never reused: the next page gets a fresh one.

use super::multimap::{LazyMultimap, Multimap};
use crate::adapters::database::traits::ExportStore;
use crate::config::ExportFilter;
use crate::core::paging::PageRequest;
use crate::domain::{CourierError, EntityId, EntityKind, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The lazy relations of one primary entity type
pub trait RelationSet: Send + Sync {
    /// Release every owned map; must be idempotent
    fn clear(&mut self);
}

/// A primary entity an export profile can page through
#[async_trait]
pub trait ExportEntity: Clone + Serialize + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Relations the renderer may read for a page of this entity
    type Relations: RelationSet;

    fn id(&self) -> EntityId;

    /// Fetch one page, ordered by ascending id
    async fn fetch_page(
        store: &dyn ExportStore,
        request: &PageRequest,
        filter: &ExportFilter,
    ) -> Result<Vec<Self>>;

    /// Derive key sets from `page` and wire one lazy map per relation
    fn relations(page: &[Self], loader: &RelationLoader) -> Self::Relations;
}

/// Factory for page-scoped lazy maps
///
/// Holds the data-access handle and the run's cancellation token; every map it
/// builds aborts its load when the run is cancelled.
#[derive(Clone)]
pub struct RelationLoader {
    store: Arc<dyn ExportStore>,
    cancel: CancellationToken,
}

impl RelationLoader {
    pub fn new(store: Arc<dyn ExportStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Build a lazy map over `keys` whose single load runs `load`
    pub fn lazy<V, F, Fut>(&self, keys: Vec<EntityId>, load: F) -> LazyMultimap<EntityId, V>
    where
        V: Clone + Send + 'static,
        F: Fn(Arc<dyn ExportStore>, Vec<EntityId>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Multimap<EntityId, V>>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();

        LazyMultimap::new(
            keys,
            move |keys: Vec<EntityId>| -> BoxFuture<'static, Result<Multimap<EntityId, V>>> {
                let fetch = load(Arc::clone(&store), keys);
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(CourierError::Cancelled),
                        result = fetch => result,
                    }
                }
                .boxed()
            },
        )
    }
}

/// Secondary data of one page of `P`
///
/// Dereferences to `P::Relations`, so relations are read as fields:
/// `ctx.product_categories.get(&id).await?`.
pub struct BatchContext<P: ExportEntity> {
    entity_ids: Vec<EntityId>,
    relations: P::Relations,
    cleared: bool,
}

impl<P: ExportEntity> BatchContext<P> {
    pub fn new(page: &[P], loader: &RelationLoader) -> Self {
        Self {
            entity_ids: page.iter().map(|entity| entity.id()).collect(),
            relations: P::relations(page, loader),
            cleared: false,
        }
    }

    /// Primary ids of the page, in page order
    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    pub fn relations(&self) -> &P::Relations {
        &self.relations
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Release all maps and the id list. Safe to call repeatedly.
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }
        self.relations.clear();
        self.entity_ids = Vec::new();
        self.cleared = true;
    }
}

impl<P: ExportEntity> Deref for BatchContext<P> {
    type Target = P::Relations;

    fn deref(&self) -> &Self::Target {
        &self.relations
    }
}

/// Distinct, sorted ids from optional references
pub fn distinct_ids<I>(ids: I) -> Vec<EntityId>
where
    I: IntoIterator<Item = Option<EntityId>>,
{
    let mut ids: Vec<EntityId> = ids.into_iter().flatten().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_ids() {
        let ids = distinct_ids(vec![Some(5), None, Some(2), Some(5), Some(9), None]);
        assert_eq!(ids, vec![2, 5, 9]);
        assert!(distinct_ids(Vec::new()).is_empty());
    }
}
