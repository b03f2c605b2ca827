//! Primary and secondary export records
//!
//! Primary entities are the top-level records an export profile walks page by
//! page. Secondary records hang off them and are fetched in bulk per page.
//! All identifiers are unique, monotonically assigned `i64` keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a persisted record
pub type EntityId = i64;

/// Kind of primary entity an export profile targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Manufacturer,
    Customer,
    Order,
}

impl EntityKind {
    /// Entity name used by localized properties and URL slugs
    pub fn entity_name(&self) -> &'static str {
        match self {
            EntityKind::Category => "Category",
            EntityKind::Manufacturer => "Manufacturer",
            EntityKind::Customer => "Customer",
            EntityKind::Order => "Order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" => Ok(EntityKind::Category),
            "manufacturer" => Ok(EntityKind::Manufacturer),
            "customer" => Ok(EntityKind::Customer),
            "order" => Ok(EntityKind::Order),
            other => Err(format!(
                "Unknown entity '{other}'. Must be one of: category, manufacturer, customer, order"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    pub parent_id: Option<EntityId>,
    pub media_file_id: Option<EntityId>,
    pub published: bool,
    pub updated_on_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: EntityId,
    pub name: String,
    pub media_file_id: Option<EntityId>,
    pub published: bool,
    pub updated_on_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub email: Option<String>,
    pub username: Option<String>,
    pub billing_address_id: Option<EntityId>,
    pub shipping_address_id: Option<EntityId>,
    pub active: bool,
    pub created_on_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityId,
    pub order_number: String,
    pub customer_id: EntityId,
    pub store_id: EntityId,
    pub billing_address_id: Option<EntityId>,
    pub shipping_address_id: Option<EntityId>,
    pub order_total: f64,
    pub currency_code: String,
    pub created_on_utc: DateTime<Utc>,
}

/// Link between a product and a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: EntityId,
    pub product_id: EntityId,
    pub category_id: EntityId,
    pub display_order: i32,
}

/// Link between a product and a manufacturer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductManufacturer {
    pub id: EntityId,
    pub product_id: EntityId,
    pub manufacturer_id: EntityId,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: EntityId,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub folder_id: Option<EntityId>,
}

/// Free-form key/value attribute attached to any entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericAttribute {
    pub id: EntityId,
    pub entity_id: EntityId,
    pub key_group: String,
    pub key: String,
    pub value: String,
    pub store_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: EntityId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub address1: Option<String>,
    pub zip_postal_code: Option<String>,
    pub country_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: EntityId,
    pub order_id: EntityId,
    pub product_id: EntityId,
    pub quantity: i32,
    pub unit_price: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: EntityId,
    pub order_id: EntityId,
    pub tracking_number: Option<String>,
    pub shipped_on_utc: Option<DateTime<Utc>>,
    pub delivered_on_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardPointsHistory {
    pub id: EntityId,
    pub customer_id: EntityId,
    pub points: i32,
    pub points_balance: i32,
    pub message: Option<String>,
    pub created_on_utc: DateTime<Utc>,
}

/// Translated value of one property of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedProperty {
    pub entity_id: EntityId,
    pub language_id: EntityId,
    pub locale_key_group: String,
    pub locale_key: String,
    pub locale_value: String,
}

/// SEO slug of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub slug: String,
    pub language_id: EntityId,
    pub is_active: bool,
}

/// Run-wide reference data (stores, languages, countries, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: EntityId,
    pub name: String,
    pub code: Option<String>,
}

/// Table of run-wide reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Store,
    Language,
    Country,
    Currency,
    DeliveryTime,
    QuantityUnit,
    Template,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 7] = [
        ReferenceKind::Store,
        ReferenceKind::Language,
        ReferenceKind::Country,
        ReferenceKind::Currency,
        ReferenceKind::DeliveryTime,
        ReferenceKind::QuantityUnit,
        ReferenceKind::Template,
    ];
}
