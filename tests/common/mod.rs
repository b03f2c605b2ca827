//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::Utc;
use courier::config::CourierConfig;
use courier::domain::{Category, EntityId, Order, OrderItem};
use tempfile::TempDir;

pub fn categories(count: EntityId) -> Vec<Category> {
    (1..=count)
        .map(|id| Category {
            id,
            name: format!("Category {id}"),
            parent_id: None,
            media_file_id: None,
            published: true,
            updated_on_utc: Utc::now(),
        })
        .collect()
}

pub fn orders(count: EntityId) -> Vec<Order> {
    (1..=count)
        .map(|id| Order {
            id,
            order_number: format!("SO-{id:05}"),
            customer_id: 100 + id % 3,
            store_id: 1,
            billing_address_id: None,
            shipping_address_id: None,
            order_total: 10.0 * id as f64,
            currency_code: "EUR".to_string(),
            created_on_utc: Utc::now(),
        })
        .collect()
}

pub fn order_items(orders: EntityId) -> Vec<OrderItem> {
    (1..=orders)
        .flat_map(|order_id| {
            (0..2).map(move |n| OrderItem {
                id: order_id * 10 + n,
                order_id,
                product_id: 500 + n,
                quantity: 1,
                unit_price: 5.0,
                price: 5.0,
            })
        })
        .collect()
}

/// Profile `feed` writing below `dir`; `entity` and extra TOML are spliced in
pub fn config(dir: &TempDir, entity: &str, page_size: usize, extra: &str) -> CourierConfig {
    let toml = format!(
        r#"
[application]
log_level = "info"

[database]
connection_string = "postgres://localhost/shop"

[export]
profile_name = "feed"
entity = "{entity}"
page_size = {page_size}
output_dir = "{out}"

[deployment]
public_root = "{public}"

[logging]
local_enabled = false
{extra}
"#,
        out = dir.path().join("out").display(),
        public = dir.path().join("public").display(),
    );
    toml::from_str(&toml).unwrap()
}
