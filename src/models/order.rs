use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::record::{Attributes, Binder};

/// Order header as read from the storefront.
///
/// Totals keep the exact decimal strings the storefront sends; nested
/// address and meta blocks are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAttrs {
    pub woo_id: i64,
    #[serde(skip)]
    pub customer_id: i64,
    pub woo_customer_id: i64,
    pub parent_id: Option<i64>,
    pub number: Option<String>,
    pub order_key: Option<String>,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub prices_include_tax: bool,
    pub discount_total: Option<String>,
    pub discount_tax: Option<String>,
    pub shipping_total: Option<String>,
    pub shipping_tax: Option<String>,
    pub cart_tax: Option<String>,
    pub total: Option<String>,
    pub total_tax: Option<String>,
    pub payment_method: Option<String>,
    pub payment_method_title: Option<String>,
    pub transaction_id: Option<String>,
    pub customer_ip_address: Option<String>,
    pub customer_user_agent: Option<String>,
    pub created_via: Option<String>,
    pub customer_note: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub date_completed: Option<String>,
    pub date_paid: Option<String>,
    pub billing: Option<Value>,
    pub shipping: Option<Value>,
    pub meta_data: Option<Value>,
    pub cart_hash: Option<String>,
    pub payment_url: Option<String>,
}

impl Attributes for OrderAttrs {
    type Key = i64;

    const TABLE: &'static str = "orders";
    const KEY_COLUMNS: &'static [&'static str] = &["woo_id"];
    const COLUMNS: &'static [&'static str] = &[
        "woo_id",
        "customer_id",
        "woo_customer_id",
        "parent_id",
        "number",
        "order_key",
        "status",
        "currency",
        "prices_include_tax",
        "discount_total",
        "discount_tax",
        "shipping_total",
        "shipping_tax",
        "cart_tax",
        "total",
        "total_tax",
        "payment_method",
        "payment_method_title",
        "transaction_id",
        "customer_ip_address",
        "customer_user_agent",
        "created_via",
        "customer_note",
        "date_created",
        "date_modified",
        "date_completed",
        "date_paid",
        "billing",
        "shipping",
        "meta_data",
        "cart_hash",
        "payment_url",
    ];

    fn key(&self) -> i64 {
        self.woo_id
    }

    fn lookup_id(&self) -> i64 {
        self.woo_id
    }

    fn key_from_row(row: &SqliteRow) -> Result<i64, sqlx::Error> {
        row.try_get("woo_id")
    }

    fn bind_columns(&self, row: &mut Binder<'_, '_>) {
        row.push_bind(self.woo_id)
            .push_bind(self.customer_id)
            .push_bind(self.woo_customer_id)
            .push_bind(self.parent_id)
            .push_bind(self.number.clone())
            .push_bind(self.order_key.clone())
            .push_bind(self.status.clone())
            .push_bind(self.currency.clone())
            .push_bind(self.prices_include_tax)
            .push_bind(self.discount_total.clone())
            .push_bind(self.discount_tax.clone())
            .push_bind(self.shipping_total.clone())
            .push_bind(self.shipping_tax.clone())
            .push_bind(self.cart_tax.clone())
            .push_bind(self.total.clone())
            .push_bind(self.total_tax.clone())
            .push_bind(self.payment_method.clone())
            .push_bind(self.payment_method_title.clone())
            .push_bind(self.transaction_id.clone())
            .push_bind(self.customer_ip_address.clone())
            .push_bind(self.customer_user_agent.clone())
            .push_bind(self.created_via.clone())
            .push_bind(self.customer_note.clone())
            .push_bind(self.date_created.clone())
            .push_bind(self.date_modified.clone())
            .push_bind(self.date_completed.clone())
            .push_bind(self.date_paid.clone())
            .push_bind(json_text(&self.billing))
            .push_bind(json_text(&self.shipping))
            .push_bind(json_text(&self.meta_data))
            .push_bind(self.cart_hash.clone())
            .push_bind(self.payment_url.clone());
    }
}

/// A line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineAttrs {
    /// Internal order id, attached once the header has been written.
    #[serde(skip)]
    pub order_id: Option<i64>,
    pub woo_order_id: i64,
    pub woo_line_id: i64,
    pub product_id: Option<i64>,
    pub variation_id: Option<i64>,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub quantity: i64,
    pub tax_class: Option<String>,
    pub subtotal: Option<String>,
    pub subtotal_tax: Option<String>,
    pub total: Option<String>,
    pub total_tax: Option<String>,
    pub price: Option<String>,
    pub global_unique_id: Option<String>,
    pub image_id: Option<i64>,
    pub image_src: Option<String>,
    pub taxes: Option<Value>,
    pub meta_data: Option<Value>,
}

impl Attributes for OrderLineAttrs {
    type Key = (i64, i64);

    const TABLE: &'static str = "order_lines";
    const KEY_COLUMNS: &'static [&'static str] = &["woo_order_id", "woo_line_id"];
    const COLUMNS: &'static [&'static str] = &[
        "woo_order_id",
        "woo_line_id",
        "order_id",
        "product_id",
        "variation_id",
        "sku",
        "name",
        "quantity",
        "tax_class",
        "subtotal",
        "subtotal_tax",
        "total",
        "total_tax",
        "price",
        "global_unique_id",
        "image_id",
        "image_src",
        "taxes",
        "meta_data",
    ];

    fn key(&self) -> Self::Key {
        (self.woo_order_id, self.woo_line_id)
    }

    fn lookup_id(&self) -> i64 {
        self.woo_order_id
    }

    fn key_from_row(row: &SqliteRow) -> Result<Self::Key, sqlx::Error> {
        Ok((row.try_get("woo_order_id")?, row.try_get("woo_line_id")?))
    }

    fn bind_columns(&self, row: &mut Binder<'_, '_>) {
        row.push_bind(self.woo_order_id)
            .push_bind(self.woo_line_id)
            .push_bind(self.order_id)
            .push_bind(self.product_id)
            .push_bind(self.variation_id)
            .push_bind(self.sku.clone())
            .push_bind(self.name.clone())
            .push_bind(self.quantity)
            .push_bind(self.tax_class.clone())
            .push_bind(self.subtotal.clone())
            .push_bind(self.subtotal_tax.clone())
            .push_bind(self.total.clone())
            .push_bind(self.total_tax.clone())
            .push_bind(self.price.clone())
            .push_bind(self.global_unique_id.clone())
            .push_bind(self.image_id)
            .push_bind(self.image_src.clone())
            .push_bind(json_text(&self.taxes))
            .push_bind(json_text(&self.meta_data));
    }
}

fn json_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::to_string)
}
