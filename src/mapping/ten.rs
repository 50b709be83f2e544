//! Mappers for ERP records.

use serde_json::{json, Value};

use super::fields::{decimal, flag, int, text, text_any};
use super::Mapped;
use crate::models::{normalize_email, Address, CategoryAttrs, Customer, ProductAttrs};

/// Maps a web-category row. Rows without a positive `IdNumero` are dropped.
pub fn map_category(record: &Value) -> Option<Mapped<CategoryAttrs>> {
    let ten_id = int(record, "IdNumero").filter(|id| *id > 0)?;

    Mapped::new(CategoryAttrs {
        ten_id,
        ten_code: text(record, "Codigo"),
        name: text(record, "Nombre"),
        web_name: text(record, "WebNombre"),
        parent_ten_id: int(record, "CategoriaPadre"),
        last_user: int(record, "tenUltimoUsuario"),
        last_changed_at: text(record, "tenUltimoCambio"),
        created_user: int(record, "tenAltaUsuario"),
        created_on: text(record, "tenAltaFecha"),
        web_sync: flag(record, "WebSincronizar"),
        blocked: flag(record, "tenBloqueado"),
        weight: decimal(record, "USR_Peso"),
    })
}

/// Maps a product record. Records without a positive `Id` are dropped.
pub fn map_product(record: &Value) -> Option<Mapped<ProductAttrs>> {
    let ten_id = int(record, "Id").filter(|id| *id > 0)?;

    Mapped::new(ProductAttrs {
        ten_id,
        ten_code: text(record, "Codigo"),
        group_id: int(record, "IdGrupoProductos"),
        web_name: text(record, "Web-Nombre"),
        short_description: text(record, "Web-DescripcionCorta"),
        long_description: text(record, "Web-DescripcionLarga"),
        stock_control: flag(record, "Web-ControlStock"),
        price: decimal(record, "Precio"),
        blocked: flag(record, "Bloqueado"),
        manufacturer: text(record, "Fabricante"),
        reference: text(record, "Referencia"),
        catalog: text(record, "Catalogo"),
        priority: int(record, "Prioridad").unwrap_or(0),
        split_sale_format: flag(record, "FraccionarFormatoVenta"),
        weight: decimal(record, "Peso"),
        tax_rate: decimal(record, "PorcImpost"),
        surcharge_rate: decimal(record, "PorcRecargo"),
        ean: text_any(record, &["EAN", "Ean"]),
        upc: text_any(record, &["UPC", "Upc"]),
    })
}

/// One row of the ERP stock feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub ten_id: i64,
    pub quantity: i64,
}

/// Maps a stock row. Rows without a positive `IdProducto` are invalid.
pub fn map_stock(record: &Value) -> Option<StockLevel> {
    let ten_id = int(record, "IdProducto").filter(|id| *id > 0)?;
    let quantity = match record.get("Stock") {
        Some(Value::Number(n)) => stock_to_int(&n.to_string()),
        Some(Value::String(s)) => stock_to_int(s),
        _ => 0,
    };
    Some(StockLevel { ten_id, quantity })
}

/// Whole units in stock: comma decimals accepted, floored, never negative.
/// Non-numeric input counts as zero.
pub fn stock_to_int(raw: &str) -> i64 {
    let normalized = raw.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value.floor().max(0.0) as i64,
        _ => 0,
    }
}

/// A customer as the ERP knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErpCustomer {
    pub ten_id: String,
    /// Normalized email used for matching.
    pub email: String,
    /// Id of the first ERP address, when positive.
    pub shipping_address_id: Option<String>,
}

/// Maps an ERP customer. Customers without id or email cannot be matched.
pub fn map_erp_customer(record: &Value) -> Option<ErpCustomer> {
    let ten_id = text(record, "Id")?;
    let email = text(record, "Email").as_deref().and_then(normalize_email)?;
    let shipping_address_id = record
        .get("Direcciones")
        .and_then(Value::as_array)
        .and_then(|addresses| addresses.first())
        .and_then(|first| int(first, "Id"))
        .filter(|id| *id > 0)
        .map(|id| id.to_string());

    Some(ErpCustomer {
        ten_id,
        email,
        shipping_address_id,
    })
}

/// `Customers/Set` body for one customer. Each address carries its
/// internal row id as `Codigo` so the response can be matched back.
pub fn customer_payload(customer: &Customer, addresses: &[Address]) -> Value {
    let first_name = customer.first_name.clone().unwrap_or_default();
    let last_name = customer.last_name.clone().unwrap_or_default();
    let phone = customer.phone.clone().unwrap_or_default();

    let mut lines: Vec<Value> = addresses
        .iter()
        .map(|address| {
            let mut line = json!({
                "Codigo": address.id.to_string(),
                "Nombre": address.first_name.clone().unwrap_or_else(|| first_name.clone()),
                "Apellidos": address.last_name.clone().unwrap_or_else(|| last_name.clone()),
                "Direccion": address.address_1.clone().unwrap_or_default(),
                "Direccion2": address.address_2.clone().unwrap_or_default(),
                "CodigoPostal": address.postcode.clone().unwrap_or_default(),
                "Poblacion": address.city.clone().unwrap_or_default(),
                "Provincia": address.state.clone().unwrap_or_default(),
                "Pais": address.country.clone().unwrap_or_default(),
                "Telefono": address.phone.clone().unwrap_or_else(|| phone.clone()),
                "Fax": "",
                "AditionalData": {},
            });
            if let Some(ten_id) = address.ten_id.as_deref().and_then(valid_erp_id) {
                line["IdTen"] = Value::String(ten_id.to_string());
            }
            line
        })
        .collect();

    if lines.is_empty() {
        lines.push(json!({
            "Codigo": customer.id.to_string(),
            "Nombre": first_name,
            "Apellidos": last_name,
            "Direccion": "",
            "Direccion2": "",
            "CodigoPostal": "",
            "Poblacion": "",
            "Provincia": "",
            "Pais": "",
            "Telefono": phone,
            "Fax": "",
            "AditionalData": {},
        }));
    }

    let mut payload = json!({
        "Codigo": customer.woo_id.to_string(),
        "Email": customer.email.clone().unwrap_or_default(),
        "Nombre": first_name,
        "Apellidos": last_name,
        "NombreFiscal": "",
        "NIF": "",
        "IdDireccionEnvio": customer.ten_shipping_address_id.clone().unwrap_or_else(|| "0".to_string()),
        "IdGrupoClientes": "0",
        "RegimenImpuesto": "0",
        "Persona": 0,
        "IdTarifa": 0,
        "Vendedor": "WEB",
        "FormaPago": "",
        "Telefono": phone,
        "Telefono2": "",
        "Web": "",
        "CalculoIVAFactura": "",
        "EnviarEmails": "0",
        "ConsentimientoDatos": "0",
        "AditionalData": {},
        "Direcciones": lines,
    });
    if let Some(ten_id) = customer.ten_id.as_deref().and_then(valid_erp_id) {
        payload["IdTen"] = Value::String(ten_id.to_string());
    }
    payload
}

/// Per-customer result of `Customers/Set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerResult {
    pub ten_id: Option<String>,
    pub exceptions: Vec<String>,
    pub addresses: Vec<AddressResult>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressResult {
    pub code: Option<String>,
    pub ten_id: Option<String>,
}

impl CustomerResult {
    pub fn parse(record: &Value) -> Self {
        let addresses = record
            .get("Direcciones")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| AddressResult {
                        code: text(item, "Codigo"),
                        ten_id: text(item, "IdTen"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            ten_id: text(record, "IdTen"),
            exceptions: exceptions(record),
            addresses,
        }
    }

    /// The created customer id, unless missing or a sentinel.
    pub fn valid_ten_id(&self) -> Option<&str> {
        self.ten_id.as_deref().and_then(valid_erp_id)
    }

    /// Id of the first address the ERP accepted.
    pub fn first_address_id(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find_map(|a| a.ten_id.as_deref().and_then(valid_erp_id))
    }

    /// ERP address ids keyed by the internal address id sent as `Codigo`.
    pub fn address_ids(&self) -> Vec<(i64, String)> {
        self.addresses
            .iter()
            .filter_map(|a| {
                let code = a.code.as_deref()?.trim().parse().ok()?;
                let ten_id = a.ten_id.as_deref().and_then(valid_erp_id)?;
                Some((code, ten_id.to_string()))
            })
            .collect()
    }
}

fn exceptions(record: &Value) -> Vec<String> {
    match record.get("Exceptions") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// ERP ids use "0" and "-1" as "none".
fn valid_erp_id(id: &str) -> Option<&str> {
    let id = id.trim();
    (!id.is_empty() && id != "0" && id != "-1").then_some(id)
}
