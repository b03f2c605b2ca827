//! Run-scoped lookup tables
//!
//! Reference data (stores, languages, currencies, ...) and the translations
//! of a small set of reference entities do not vary by page. They are loaded
//! once when the run starts and shared by every page.

use crate::adapters::database::traits::ExportStore;
use crate::domain::{
    EntityId, LocalizedProperty, ReferenceKind, ReferenceRecord, Result, UrlRecord,
};
use std::collections::HashMap;

/// Entity names whose translations are loaded once per run
pub const GLOBAL_TRANSLATION_ENTITIES: [&str; 4] = ["Category", "Manufacturer", "Currency", "Country"];

/// Entity names whose URL slugs are loaded once per run
pub const GLOBAL_SLUG_ENTITIES: [&str; 2] = ["Category", "Manufacturer"];

pub fn is_global_translation_entity(entity_name: &str) -> bool {
    GLOBAL_TRANSLATION_ENTITIES.contains(&entity_name)
}

pub fn is_global_slug_entity(entity_name: &str) -> bool {
    GLOBAL_SLUG_ENTITIES.contains(&entity_name)
}

/// Reference tables keyed by kind and id
#[derive(Debug, Clone, Default)]
pub struct GlobalLookups {
    tables: HashMap<ReferenceKind, HashMap<EntityId, ReferenceRecord>>,
}

impl GlobalLookups {
    /// Load every reference table, one query per table
    pub async fn load(store: &dyn ExportStore) -> Result<Self> {
        let mut lookups = Self::default();
        for kind in ReferenceKind::ALL {
            let records = store.reference_data(kind).await?;
            lookups.insert(kind, records);
        }

        tracing::debug!(
            stores = lookups.len(ReferenceKind::Store),
            languages = lookups.len(ReferenceKind::Language),
            currencies = lookups.len(ReferenceKind::Currency),
            "Global lookups loaded"
        );
        Ok(lookups)
    }

    pub fn insert(&mut self, kind: ReferenceKind, records: Vec<ReferenceRecord>) {
        let table = self.tables.entry(kind).or_default();
        for record in records {
            table.insert(record.id, record);
        }
    }

    pub fn get(&self, kind: ReferenceKind, id: EntityId) -> Option<&ReferenceRecord> {
        self.tables.get(&kind).and_then(|table| table.get(&id))
    }

    /// Display name of a reference record
    pub fn name(&self, kind: ReferenceKind, id: EntityId) -> Option<&str> {
        self.get(kind, id).map(|record| record.name.as_str())
    }

    /// Find a record by its code (e.g. a currency ISO code)
    pub fn by_code(&self, kind: ReferenceKind, code: &str) -> Option<&ReferenceRecord> {
        self.tables.get(&kind).and_then(|table| {
            table
                .values()
                .find(|record| record.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(code)))
        })
    }

    /// All records of a table, ordered by id
    pub fn all(&self, kind: ReferenceKind) -> Vec<&ReferenceRecord> {
        let mut records: Vec<&ReferenceRecord> = self
            .tables
            .get(&kind)
            .map(|table| table.values().collect())
            .unwrap_or_default();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn len(&self, kind: ReferenceKind) -> usize {
        self.tables.get(&kind).map_or(0, HashMap::len)
    }
}

/// Translated property values of one entity name
#[derive(Debug, Clone, Default)]
pub struct Translations {
    values: HashMap<(EntityId, String), String>,
}

impl Translations {
    pub fn from_properties(properties: Vec<LocalizedProperty>) -> Self {
        let values = properties
            .into_iter()
            .map(|p| ((p.entity_id, p.locale_key), p.locale_value))
            .collect();
        Self { values }
    }

    pub fn get(&self, entity_id: EntityId, key: &str) -> Option<&str> {
        self.values
            .get(&(entity_id, key.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Active URL slugs of one entity name
#[derive(Debug, Clone, Default)]
pub struct Slugs {
    slugs: HashMap<EntityId, String>,
}

impl Slugs {
    pub fn from_records(records: Vec<UrlRecord>) -> Self {
        let slugs = records
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| (r.entity_id, r.slug))
            .collect();
        Self { slugs }
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&str> {
        self.slugs.get(&entity_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

/// Translations and slugs of the run-scoped entity names
#[derive(Debug, Clone, Default)]
pub struct GlobalLocalization {
    translations: HashMap<&'static str, Translations>,
    slugs: HashMap<&'static str, Slugs>,
}

impl GlobalLocalization {
    pub async fn load(store: &dyn ExportStore, language_id: EntityId) -> Result<Self> {
        let mut localization = Self::default();

        for entity_name in GLOBAL_TRANSLATION_ENTITIES {
            let properties = store
                .localized_properties(entity_name, language_id, None)
                .await?;
            localization
                .translations
                .insert(entity_name, Translations::from_properties(properties));
        }

        for entity_name in GLOBAL_SLUG_ENTITIES {
            let records = store.url_records(entity_name, language_id, None).await?;
            localization
                .slugs
                .insert(entity_name, Slugs::from_records(records));
        }

        Ok(localization)
    }

    pub fn translation(&self, entity_name: &str, entity_id: EntityId, key: &str) -> Option<&str> {
        self.translations
            .get(entity_name)
            .and_then(|t| t.get(entity_id, key))
    }

    pub fn slug(&self, entity_name: &str, entity_id: EntityId) -> Option<&str> {
        self.slugs.get(entity_name).and_then(|s| s.get(entity_id))
    }
}
