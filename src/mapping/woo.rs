//! Mappers for storefront records.

use serde_json::Value;

use super::fields::{decimal, flag, int, object, raw, text};
use super::Mapped;
use crate::models::{AddressAttrs, AddressKind, CustomerAttrs, OrderAttrs, OrderLineAttrs};

/// Maps a storefront customer. Missing names and email fall back to the
/// billing block.
pub fn map_customer(record: &Value) -> Option<Mapped<CustomerAttrs>> {
    let woo_id = int(record, "id").filter(|id| *id > 0)?;
    let billing = record.get("billing").cloned().unwrap_or(Value::Null);

    Mapped::new(CustomerAttrs {
        woo_id,
        email: text(record, "email").or_else(|| text(&billing, "email")),
        first_name: text(record, "first_name").or_else(|| text(&billing, "first_name")),
        last_name: text(record, "last_name").or_else(|| text(&billing, "last_name")),
        phone: text(&billing, "phone"),
    })
}

/// Maps the billing and shipping blocks of a storefront customer.
///
/// `customer_id` is left at zero; the linker attaches the internal id.
pub fn map_addresses(record: &Value) -> Vec<Mapped<AddressAttrs>> {
    let Some(woo_customer_id) = int(record, "id").filter(|id| *id > 0) else {
        return Vec::new();
    };
    let customer_email = text(record, "email");

    [AddressKind::Billing, AddressKind::Shipping]
        .into_iter()
        .filter_map(|kind| {
            let block = Value::Object(object(record, kind.as_str())?.clone());
            Mapped::new(AddressAttrs {
                customer_id: 0,
                woo_customer_id,
                kind,
                first_name: text(&block, "first_name"),
                last_name: text(&block, "last_name"),
                company: text(&block, "company"),
                address_1: text(&block, "address_1"),
                address_2: text(&block, "address_2"),
                city: text(&block, "city"),
                postcode: text(&block, "postcode"),
                state: text(&block, "state"),
                country: text(&block, "country"),
                email: text(&block, "email").or_else(|| customer_email.clone()),
                phone: text(&block, "phone"),
            })
        })
        .collect()
}

/// Maps an order header. `customer_id` is left at zero for the linker.
pub fn map_order(record: &Value) -> Option<Mapped<OrderAttrs>> {
    let woo_id = int(record, "id").filter(|id| *id > 0)?;

    Mapped::new(OrderAttrs {
        woo_id,
        customer_id: 0,
        woo_customer_id: int(record, "customer_id").unwrap_or(0),
        parent_id: int(record, "parent_id").filter(|id| *id > 0),
        number: text(record, "number"),
        order_key: text(record, "order_key"),
        status: text(record, "status"),
        currency: text(record, "currency"),
        prices_include_tax: flag(record, "prices_include_tax"),
        discount_total: decimal(record, "discount_total"),
        discount_tax: decimal(record, "discount_tax"),
        shipping_total: decimal(record, "shipping_total"),
        shipping_tax: decimal(record, "shipping_tax"),
        cart_tax: decimal(record, "cart_tax"),
        total: decimal(record, "total"),
        total_tax: decimal(record, "total_tax"),
        payment_method: text(record, "payment_method"),
        payment_method_title: text(record, "payment_method_title"),
        transaction_id: text(record, "transaction_id"),
        customer_ip_address: text(record, "customer_ip_address"),
        customer_user_agent: text(record, "customer_user_agent"),
        created_via: text(record, "created_via"),
        customer_note: text(record, "customer_note"),
        date_created: text(record, "date_created"),
        date_modified: text(record, "date_modified"),
        date_completed: text(record, "date_completed"),
        date_paid: text(record, "date_paid"),
        billing: raw(record, "billing"),
        shipping: raw(record, "shipping"),
        meta_data: raw(record, "meta_data"),
        cart_hash: text(record, "cart_hash"),
        payment_url: text(record, "payment_url"),
    })
}

/// Maps the `line_items` of an order. Lines without an id are dropped;
/// the returned count says how many.
pub fn map_order_lines(order: &Value) -> (Vec<Mapped<OrderLineAttrs>>, usize) {
    let Some(woo_order_id) = int(order, "id").filter(|id| *id > 0) else {
        return (Vec::new(), 0);
    };
    let Some(items) = order.get("line_items").and_then(Value::as_array) else {
        return (Vec::new(), 0);
    };

    let mut dropped = 0;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let Some(woo_line_id) = int(item, "id").filter(|id| *id > 0) else {
            dropped += 1;
            continue;
        };
        let image = item.get("image").cloned().unwrap_or(Value::Null);

        let mapped = Mapped::new(OrderLineAttrs {
            order_id: None,
            woo_order_id,
            woo_line_id,
            product_id: int(item, "product_id"),
            variation_id: int(item, "variation_id"),
            sku: text(item, "sku"),
            name: text(item, "name"),
            quantity: int(item, "quantity").unwrap_or(0),
            tax_class: text(item, "tax_class"),
            subtotal: decimal(item, "subtotal"),
            subtotal_tax: decimal(item, "subtotal_tax"),
            total: decimal(item, "total"),
            total_tax: decimal(item, "total_tax"),
            price: decimal(item, "price"),
            global_unique_id: text(item, "global_unique_id"),
            image_id: int(&image, "id"),
            image_src: text(&image, "src"),
            taxes: raw(item, "taxes"),
            meta_data: raw(item, "meta_data"),
        });
        match mapped {
            Some(line) => lines.push(line),
            None => dropped += 1,
        }
    }
    (lines, dropped)
}
