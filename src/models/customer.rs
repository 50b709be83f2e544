use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use super::record::{Attributes, Binder};

/// Customer attributes as read from the storefront.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerAttrs {
    pub woo_id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl Attributes for CustomerAttrs {
    type Key = i64;

    const TABLE: &'static str = "customers";
    const KEY_COLUMNS: &'static [&'static str] = &["woo_id"];
    const COLUMNS: &'static [&'static str] =
        &["woo_id", "email", "first_name", "last_name", "phone"];

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
            .push_bind(self.email.clone())
            .push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.phone.clone());
    }
}

/// A stored customer as seen by the ERP export.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub woo_id: i64,
    pub ten_id: Option<String>,
    pub ten_shipping_address_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl Customer {
    /// Lowercased, trimmed email used for cross-system matching.
    pub fn match_email(&self) -> Option<String> {
        self.email.as_deref().and_then(normalize_email)
    }
}

pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Billing,
    Shipping,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Billing => "billing",
            AddressKind::Shipping => "shipping",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AddressKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "billing" => Ok(AddressKind::Billing),
            "shipping" => Ok(AddressKind::Shipping),
            _ => Err(format!(
                "Invalid address kind '{}'. Valid options: billing, shipping",
                s
            )),
        }
    }
}

/// Billing or shipping address of a storefront customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressAttrs {
    #[serde(skip)]
    pub customer_id: i64,
    pub woo_customer_id: i64,
    pub kind: AddressKind,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Attributes for AddressAttrs {
    type Key = (i64, AddressKind);

    const TABLE: &'static str = "customer_addresses";
    const KEY_COLUMNS: &'static [&'static str] = &["woo_customer_id", "kind"];
    const COLUMNS: &'static [&'static str] = &[
        "woo_customer_id",
        "kind",
        "customer_id",
        "first_name",
        "last_name",
        "company",
        "address_1",
        "address_2",
        "city",
        "postcode",
        "state",
        "country",
        "email",
        "phone",
    ];

    fn key(&self) -> Self::Key {
        (self.woo_customer_id, self.kind)
    }

    fn lookup_id(&self) -> i64 {
        self.woo_customer_id
    }

    fn key_from_row(row: &SqliteRow) -> Result<Self::Key, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let kind = AddressKind::from_str(&kind).map_err(|e| sqlx::Error::Decode(e.into()))?;
        Ok((row.try_get("woo_customer_id")?, kind))
    }

    fn bind_columns(&self, row: &mut Binder<'_, '_>) {
        row.push_bind(self.woo_customer_id)
            .push_bind(self.kind.as_str())
            .push_bind(self.customer_id)
            .push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.company.clone())
            .push_bind(self.address_1.clone())
            .push_bind(self.address_2.clone())
            .push_bind(self.city.clone())
            .push_bind(self.postcode.clone())
            .push_bind(self.state.clone())
            .push_bind(self.country.clone())
            .push_bind(self.email.clone())
            .push_bind(self.phone.clone());
    }
}

/// A stored address as exported alongside its customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub id: i64,
    pub customer_id: i64,
    pub kind: AddressKind,
    pub ten_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Ana@Example.COM "),
            Some("ana@example.com".to_string())
        );
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn test_address_kind_roundtrip() {
        assert_eq!(
            AddressKind::from_str("Shipping").unwrap(),
            AddressKind::Shipping
        );
        assert_eq!(AddressKind::Billing.to_string(), "billing");
        assert!(AddressKind::from_str("home").is_err());
    }

    #[test]
    fn test_address_link_is_not_hashed_content() {
        let attrs = AddressAttrs {
            customer_id: 42,
            woo_customer_id: 7,
            kind: AddressKind::Billing,
            first_name: Some("Ana".to_string()),
            last_name: None,
            company: None,
            address_1: None,
            address_2: None,
            city: None,
            postcode: None,
            state: None,
            country: None,
            email: None,
            phone: None,
        };
        let value = serde_json::to_value(&attrs).unwrap();
        assert!(value.get("customer_id").is_none());
        assert_eq!(value["kind"], "billing");
    }
}
