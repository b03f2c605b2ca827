//! Row mapping for the PostgreSQL adapter
//!
//! Every query selects its columns by name and each domain type is read back
//! through [`FromRow`]. Monetary columns are cast to `float8` in SQL so that
//! no decimal type crosses the driver boundary.

use crate::core::state::{Checkpoint, ExportStatus};
use crate::domain::{
    Address, Category, Customer, DataAccessError, EntityKind, GenericAttribute,
    LocalizedProperty, Manufacturer, MediaFile, Order, OrderItem, ProductCategory,
    ProductManufacturer, ReferenceRecord, Result, RewardPointsHistory, Shipment, UrlRecord,
};
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;

/// A domain type read from one result row
pub trait FromRow: Sized {
    /// Name used in mapping errors
    const ENTITY: &'static str;

    /// Column list for `SELECT`
    const COLUMNS: &'static str;

    fn from_row(row: &Row) -> Result<Self>;

    fn from_rows(rows: &[Row]) -> Result<Vec<Self>> {
        rows.iter().map(Self::from_row).collect()
    }
}

fn invalid_row(entity: &str, message: String) -> DataAccessError {
    DataAccessError::InvalidRow {
        entity: entity.to_string(),
        message,
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, entity: &str, column: &str) -> Result<T> {
    row.try_get(column)
        .map_err(|e| invalid_row(entity, format!("{column}: {e}")).into())
}

impl FromRow for Category {
    const ENTITY: &'static str = "category";
    const COLUMNS: &'static str =
        "id, name, parent_category_id, media_file_id, published, updated_on_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            name: get(row, Self::ENTITY, "name")?,
            parent_id: get(row, Self::ENTITY, "parent_category_id")?,
            media_file_id: get(row, Self::ENTITY, "media_file_id")?,
            published: get(row, Self::ENTITY, "published")?,
            updated_on_utc: get(row, Self::ENTITY, "updated_on_utc")?,
        })
    }
}

impl FromRow for Manufacturer {
    const ENTITY: &'static str = "manufacturer";
    const COLUMNS: &'static str = "id, name, media_file_id, published, updated_on_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            name: get(row, Self::ENTITY, "name")?,
            media_file_id: get(row, Self::ENTITY, "media_file_id")?,
            published: get(row, Self::ENTITY, "published")?,
            updated_on_utc: get(row, Self::ENTITY, "updated_on_utc")?,
        })
    }
}

impl FromRow for Customer {
    const ENTITY: &'static str = "customer";
    const COLUMNS: &'static str = "id, email, username, billing_address_id, \
        shipping_address_id, active, created_on_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            email: get(row, Self::ENTITY, "email")?,
            username: get(row, Self::ENTITY, "username")?,
            billing_address_id: get(row, Self::ENTITY, "billing_address_id")?,
            shipping_address_id: get(row, Self::ENTITY, "shipping_address_id")?,
            active: get(row, Self::ENTITY, "active")?,
            created_on_utc: get(row, Self::ENTITY, "created_on_utc")?,
        })
    }
}

impl FromRow for Order {
    const ENTITY: &'static str = "order";
    const COLUMNS: &'static str = "id, order_number, customer_id, store_id, \
        billing_address_id, shipping_address_id, order_total::float8 AS order_total, \
        customer_currency_code, created_on_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            order_number: get(row, Self::ENTITY, "order_number")?,
            customer_id: get(row, Self::ENTITY, "customer_id")?,
            store_id: get(row, Self::ENTITY, "store_id")?,
            billing_address_id: get(row, Self::ENTITY, "billing_address_id")?,
            shipping_address_id: get(row, Self::ENTITY, "shipping_address_id")?,
            order_total: get(row, Self::ENTITY, "order_total")?,
            currency_code: get(row, Self::ENTITY, "customer_currency_code")?,
            created_on_utc: get(row, Self::ENTITY, "created_on_utc")?,
        })
    }
}

impl FromRow for ProductCategory {
    const ENTITY: &'static str = "product_category_mapping";
    const COLUMNS: &'static str = "id, product_id, category_id, display_order";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            product_id: get(row, Self::ENTITY, "product_id")?,
            category_id: get(row, Self::ENTITY, "category_id")?,
            display_order: get(row, Self::ENTITY, "display_order")?,
        })
    }
}

impl FromRow for ProductManufacturer {
    const ENTITY: &'static str = "product_manufacturer_mapping";
    const COLUMNS: &'static str = "id, product_id, manufacturer_id, display_order";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            product_id: get(row, Self::ENTITY, "product_id")?,
            manufacturer_id: get(row, Self::ENTITY, "manufacturer_id")?,
            display_order: get(row, Self::ENTITY, "display_order")?,
        })
    }
}

impl FromRow for MediaFile {
    const ENTITY: &'static str = "media_file";
    const COLUMNS: &'static str = "id, name, mime_type, size, folder_id";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            name: get(row, Self::ENTITY, "name")?,
            mime_type: get(row, Self::ENTITY, "mime_type")?,
            size: get(row, Self::ENTITY, "size")?,
            folder_id: get(row, Self::ENTITY, "folder_id")?,
        })
    }
}

impl FromRow for GenericAttribute {
    const ENTITY: &'static str = "generic_attribute";
    const COLUMNS: &'static str = "id, entity_id, key_group, key, value, store_id";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            entity_id: get(row, Self::ENTITY, "entity_id")?,
            key_group: get(row, Self::ENTITY, "key_group")?,
            key: get(row, Self::ENTITY, "key")?,
            value: get(row, Self::ENTITY, "value")?,
            store_id: get(row, Self::ENTITY, "store_id")?,
        })
    }
}

impl FromRow for Address {
    const ENTITY: &'static str = "address";
    const COLUMNS: &'static str = "id, first_name, last_name, email, company, city, \
        address1, zip_postal_code, country_id";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            first_name: get(row, Self::ENTITY, "first_name")?,
            last_name: get(row, Self::ENTITY, "last_name")?,
            email: get(row, Self::ENTITY, "email")?,
            company: get(row, Self::ENTITY, "company")?,
            city: get(row, Self::ENTITY, "city")?,
            address1: get(row, Self::ENTITY, "address1")?,
            zip_postal_code: get(row, Self::ENTITY, "zip_postal_code")?,
            country_id: get(row, Self::ENTITY, "country_id")?,
        })
    }
}

impl FromRow for OrderItem {
    const ENTITY: &'static str = "order_item";
    const COLUMNS: &'static str = "id, order_id, product_id, quantity, \
        unit_price_incl_tax::float8 AS unit_price, price_incl_tax::float8 AS price";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            order_id: get(row, Self::ENTITY, "order_id")?,
            product_id: get(row, Self::ENTITY, "product_id")?,
            quantity: get(row, Self::ENTITY, "quantity")?,
            unit_price: get(row, Self::ENTITY, "unit_price")?,
            price: get(row, Self::ENTITY, "price")?,
        })
    }
}

impl FromRow for Shipment {
    const ENTITY: &'static str = "shipment";
    const COLUMNS: &'static str =
        "id, order_id, tracking_number, shipped_date_utc, delivery_date_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            order_id: get(row, Self::ENTITY, "order_id")?,
            tracking_number: get(row, Self::ENTITY, "tracking_number")?,
            shipped_on_utc: get(row, Self::ENTITY, "shipped_date_utc")?,
            delivered_on_utc: get(row, Self::ENTITY, "delivery_date_utc")?,
        })
    }
}

impl FromRow for RewardPointsHistory {
    const ENTITY: &'static str = "reward_points_history";
    const COLUMNS: &'static str =
        "id, customer_id, points, points_balance, message, created_on_utc";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            customer_id: get(row, Self::ENTITY, "customer_id")?,
            points: get(row, Self::ENTITY, "points")?,
            points_balance: get(row, Self::ENTITY, "points_balance")?,
            message: get(row, Self::ENTITY, "message")?,
            created_on_utc: get(row, Self::ENTITY, "created_on_utc")?,
        })
    }
}

impl FromRow for LocalizedProperty {
    const ENTITY: &'static str = "localized_property";
    const COLUMNS: &'static str =
        "entity_id, language_id, locale_key_group, locale_key, locale_value";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            entity_id: get(row, Self::ENTITY, "entity_id")?,
            language_id: get(row, Self::ENTITY, "language_id")?,
            locale_key_group: get(row, Self::ENTITY, "locale_key_group")?,
            locale_key: get(row, Self::ENTITY, "locale_key")?,
            locale_value: get(row, Self::ENTITY, "locale_value")?,
        })
    }
}

impl FromRow for UrlRecord {
    const ENTITY: &'static str = "url_record";
    const COLUMNS: &'static str = "entity_id, entity_name, slug, language_id, is_active";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            entity_id: get(row, Self::ENTITY, "entity_id")?,
            entity_name: get(row, Self::ENTITY, "entity_name")?,
            slug: get(row, Self::ENTITY, "slug")?,
            language_id: get(row, Self::ENTITY, "language_id")?,
            is_active: get(row, Self::ENTITY, "is_active")?,
        })
    }
}

impl FromRow for ReferenceRecord {
    const ENTITY: &'static str = "reference";
    const COLUMNS: &'static str = "id, name, code";

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get(row, Self::ENTITY, "id")?,
            name: get(row, Self::ENTITY, "name")?,
            code: get(row, Self::ENTITY, "code")?,
        })
    }
}

impl FromRow for Checkpoint {
    const ENTITY: &'static str = "export_checkpoint";
    const COLUMNS: &'static str =
        "profile_name, entity, last_id, records_exported, started_at, completed_at, status";

    fn from_row(row: &Row) -> Result<Self> {
        let entity: String = get(row, Self::ENTITY, "entity")?;
        let status: String = get(row, Self::ENTITY, "status")?;
        let records_exported: i64 = get(row, Self::ENTITY, "records_exported")?;

        Ok(Self {
            profile_name: get(row, Self::ENTITY, "profile_name")?,
            entity: entity
                .parse::<EntityKind>()
                .map_err(|e| invalid_row(Self::ENTITY, e))?,
            last_id: get(row, Self::ENTITY, "last_id")?,
            records_exported: u64::try_from(records_exported).unwrap_or(0),
            started_at: get(row, Self::ENTITY, "started_at")?,
            completed_at: get(row, Self::ENTITY, "completed_at")?,
            status: status
                .parse::<ExportStatus>()
                .map_err(|e| invalid_row(Self::ENTITY, e))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_lists_alias_casts() {
        assert!(Order::COLUMNS.contains("order_total::float8 AS order_total"));
        assert!(OrderItem::COLUMNS.contains("AS unit_price"));
        assert!(!Category::COLUMNS.contains('*'));
    }

    #[test]
    fn test_invalid_row_message() {
        let err = invalid_row("category", "name: unexpected null".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid row for category: name: unexpected null"
        );
    }
}
