use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::record::{Attributes, Binder};
use super::SyncStatus;

/// Product attributes as read from the ERP product feed.
///
/// Monetary and weight values keep the exact source string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAttrs {
    pub ten_id: i64,
    pub ten_code: Option<String>,
    pub group_id: Option<i64>,
    pub web_name: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub stock_control: bool,
    pub price: Option<String>,
    pub blocked: bool,
    pub manufacturer: Option<String>,
    pub reference: Option<String>,
    pub catalog: Option<String>,
    pub priority: i64,
    pub split_sale_format: bool,
    pub weight: Option<String>,
    pub tax_rate: Option<String>,
    pub surcharge_rate: Option<String>,
    pub ean: Option<String>,
    pub upc: Option<String>,
}

impl Attributes for ProductAttrs {
    type Key = i64;

    const TABLE: &'static str = "products";
    const KEY_COLUMNS: &'static [&'static str] = &["ten_id"];
    const COLUMNS: &'static [&'static str] = &[
        "ten_id",
        "ten_code",
        "group_id",
        "web_name",
        "short_description",
        "long_description",
        "stock_control",
        "price",
        "blocked",
        "manufacturer",
        "reference",
        "catalog",
        "priority",
        "split_sale_format",
        "weight",
        "tax_rate",
        "surcharge_rate",
        "ean",
        "upc",
    ];

    fn key(&self) -> i64 {
        self.ten_id
    }

    fn lookup_id(&self) -> i64 {
        self.ten_id
    }

    fn key_from_row(row: &SqliteRow) -> Result<i64, sqlx::Error> {
        row.try_get("ten_id")
    }

    fn bind_columns(&self, row: &mut Binder<'_, '_>) {
        row.push_bind(self.ten_id)
            .push_bind(self.ten_code.clone())
            .push_bind(self.group_id)
            .push_bind(self.web_name.clone())
            .push_bind(self.short_description.clone())
            .push_bind(self.long_description.clone())
            .push_bind(self.stock_control)
            .push_bind(self.price.clone())
            .push_bind(self.blocked)
            .push_bind(self.manufacturer.clone())
            .push_bind(self.reference.clone())
            .push_bind(self.catalog.clone())
            .push_bind(self.priority)
            .push_bind(self.split_sale_format)
            .push_bind(self.weight.clone())
            .push_bind(self.tax_rate.clone())
            .push_bind(self.surcharge_rate.clone())
            .push_bind(self.ean.clone())
            .push_bind(self.upc.clone());
    }
}

/// A stored product as seen by the catalog push.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub ten_id: i64,
    pub ten_code: Option<String>,
    pub woo_id: Option<i64>,
    pub web_name: Option<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub stock_control: bool,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub stock: Option<i64>,
    pub stock_pushed: Option<i64>,
    pub sync_status: SyncStatus,
}

impl Product {
    /// The storefront SKU is the ERP product code.
    pub fn sku(&self) -> Option<&str> {
        self.ten_code
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
