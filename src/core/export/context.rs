//! Export run context
//!
//! The run context is the single owner of everything that lives for one
//! export invocation: the immutable run configuration, the run-scoped lookup
//! tables, the batch context of the page being rendered, and the result
//! accumulator.

use super::lookups::{
    is_global_slug_entity, is_global_translation_entity, GlobalLocalization, GlobalLookups,
};
use super::result::{AbortMode, ExportRunResult};
use crate::adapters::database::traits::ExportStore;
use crate::config::{ExportConfig, ExportFeature, ExportFilter, ExportProjection};
use crate::core::batch::{BatchContext, ExportEntity, LazyMultimap, Multimap, RelationLoader};
use crate::domain::{CourierError, EntityId, EntityKind, LocalizedProperty, Result, UrlRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Immutable settings of one export run
#[derive(Debug, Clone)]
pub struct ExportRunConfig {
    pub profile_name: String,
    pub entity: EntityKind,
    pub page_size: usize,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub output_dir: PathBuf,
    pub create_zip: bool,
    pub features: Vec<ExportFeature>,
    pub filter: ExportFilter,
    pub projection: ExportProjection,
    pub dry_run: bool,
}

impl ExportRunConfig {
    pub fn from_config(config: &ExportConfig, dry_run: bool) -> Self {
        Self {
            profile_name: config.profile_name.clone(),
            entity: config.entity,
            page_size: config.page_size,
            offset: config.offset,
            limit: config.limit,
            output_dir: PathBuf::from(&config.output_dir),
            create_zip: config.create_zip,
            features: config.features.clone(),
            filter: config.filter.clone(),
            projection: config.projection.clone(),
            dry_run,
        }
    }

    pub fn has_feature(&self, feature: ExportFeature) -> bool {
        self.features.contains(&feature)
    }

    /// Directory the renderer writes into
    pub fn artifact_dir(&self) -> PathBuf {
        self.output_dir.join(&self.profile_name)
    }

    /// Location of the optional archive, next to the artifact directory
    pub fn zip_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zip", self.profile_name))
    }
}

/// Translations and slugs of the primary entities on the current page
struct PageLocalization {
    translations: LazyMultimap<EntityId, LocalizedProperty>,
    slugs: LazyMultimap<EntityId, UrlRecord>,
}

impl PageLocalization {
    fn new(
        entity_name: &'static str,
        ids: Vec<EntityId>,
        language_id: EntityId,
        loader: &RelationLoader,
    ) -> Self {
        Self {
            translations: loader.lazy(ids.clone(), move |store, keys| async move {
                store
                    .localized_properties(entity_name, language_id, Some(&keys))
                    .await
                    .map(|rows| Multimap::group(rows, |p| p.entity_id))
            }),
            slugs: loader.lazy(ids, move |store, keys| async move {
                store
                    .url_records(entity_name, language_id, Some(&keys))
                    .await
                    .map(|rows| Multimap::group(rows, |u| u.entity_id))
            }),
        }
    }

    fn clear(&mut self) {
        self.translations.clear();
        self.slugs.clear();
    }
}

/// State of one export run over primary entity `P`
pub struct ExportContext<P: ExportEntity> {
    config: Arc<ExportRunConfig>,
    store: Arc<dyn ExportStore>,
    loader: RelationLoader,
    cancel: CancellationToken,
    lookups: GlobalLookups,
    localization: GlobalLocalization,
    batch: Option<BatchContext<P>>,
    page_localization: Option<PageLocalization>,
    page_index: usize,
    result: ExportRunResult,
}

impl<P: ExportEntity> ExportContext<P> {
    /// Build the context and load the run-scoped caches
    ///
    /// # Errors
    ///
    /// Returns an error if the reference data or the global translations
    /// cannot be loaded.
    pub async fn new(
        config: Arc<ExportRunConfig>,
        store: Arc<dyn ExportStore>,
        cancel: CancellationToken,
        resume_after: EntityId,
    ) -> Result<Self> {
        if config.filter.include_hidden && !config.has_feature(ExportFeature::CanIncludeHidden) {
            return Err(CourierError::Configuration(format!(
                "export '{}' cannot include hidden records: provider lacks can_include_hidden",
                config.profile_name
            )));
        }

        let lookups = GlobalLookups::load(store.as_ref()).await?;
        let localization =
            GlobalLocalization::load(store.as_ref(), config.projection.language_id).await?;

        Ok(Self {
            loader: RelationLoader::new(Arc::clone(&store), cancel.clone()),
            config,
            store,
            cancel,
            lookups,
            localization,
            batch: None,
            page_localization: None,
            page_index: 0,
            result: ExportRunResult::resuming_after(resume_after),
        })
    }

    pub fn config(&self) -> &ExportRunConfig {
        &self.config
    }

    pub fn filter(&self) -> &ExportFilter {
        &self.config.filter
    }

    pub fn projection(&self) -> &ExportProjection {
        &self.config.projection
    }

    pub fn language_id(&self) -> EntityId {
        self.config.projection.language_id
    }

    pub fn currency_code(&self) -> Option<&str> {
        self.config.projection.currency_code.as_deref()
    }

    pub fn store_id(&self) -> Option<EntityId> {
        self.config.projection.store_id
    }

    pub fn store(&self) -> &Arc<dyn ExportStore> {
        &self.store
    }

    pub fn lookups(&self) -> &GlobalLookups {
        &self.lookups
    }

    /// Zero-based index of the current page
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Batch context of the page being rendered
    ///
    /// # Errors
    ///
    /// Returns an error outside of page rendering.
    pub fn batch(&self) -> Result<&BatchContext<P>> {
        self.batch
            .as_ref()
            .filter(|batch| !batch.is_cleared())
            .ok_or_else(|| CourierError::Export("no page is being rendered".to_string()))
    }

    /// Translated value of `key` for an entity
    ///
    /// Reference entities are answered from the run-scoped cache. Other
    /// entities are only resolvable while their page is being rendered.
    pub async fn translation(
        &self,
        entity_name: &str,
        entity_id: EntityId,
        key: &str,
    ) -> Result<Option<String>> {
        if is_global_translation_entity(entity_name) {
            return Ok(self
                .localization
                .translation(entity_name, entity_id, key)
                .map(str::to_string));
        }

        match self.page_localization_for(entity_name) {
            Some(page) => Ok(page
                .translations
                .get(&entity_id)
                .await?
                .into_iter()
                .find(|p| p.locale_key == key)
                .map(|p| p.locale_value)),
            None => Ok(None),
        }
    }

    /// Active URL slug of an entity
    pub async fn slug(&self, entity_name: &str, entity_id: EntityId) -> Result<Option<String>> {
        if is_global_slug_entity(entity_name) {
            return Ok(self
                .localization
                .slug(entity_name, entity_id)
                .map(str::to_string));
        }

        match self.page_localization_for(entity_name) {
            Some(page) => Ok(page
                .slugs
                .get(&entity_id)
                .await?
                .into_iter()
                .find(|u| u.is_active)
                .map(|u| u.slug)),
            None => Ok(None),
        }
    }

    pub fn result(&self) -> &ExportRunResult {
        &self.result
    }

    pub fn abort_mode(&self) -> AbortMode {
        self.result.abort_mode
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Replace the batch context with a fresh one for `page`
    pub(crate) fn begin_page(&mut self, page: &[P]) {
        self.end_page();

        let ids: Vec<EntityId> = page.iter().map(|entity| entity.id()).collect();
        let entity_name = P::KIND.entity_name();
        self.page_localization = Some(PageLocalization::new(
            entity_name,
            ids,
            self.language_id(),
            &self.loader,
        ));
        self.batch = Some(BatchContext::new(page, &self.loader));
    }

    /// Release the current page's batch context
    pub(crate) fn end_page(&mut self) {
        if let Some(mut batch) = self.batch.take() {
            batch.clear();
            self.page_index += 1;
        }
        if let Some(mut page) = self.page_localization.take() {
            page.clear();
        }
    }

    pub(crate) fn result_mut(&mut self) -> &mut ExportRunResult {
        &mut self.result
    }

    pub(crate) fn into_result(mut self) -> ExportRunResult {
        self.end_page();
        self.result
    }

    fn page_localization_for(&self, entity_name: &str) -> Option<&PageLocalization> {
        if entity_name == P::KIND.entity_name() {
            self.page_localization.as_ref()
        } else {
            None
        }
    }
}
