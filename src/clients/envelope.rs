use serde::Deserialize;
use serde_json::Value;

use super::ClientError;

/// The list shapes the ERP answers with: a bare array, or an array under
/// one of a fixed set of keys.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope {
    Bare(Vec<Value>),
    Products {
        #[serde(rename = "Products", alias = "products")]
        rows: Vec<Value>,
    },
    Rows {
        #[serde(rename = "Rows", alias = "rows")]
        rows: Vec<Value>,
    },
    Stocks {
        #[serde(rename = "Stocks", alias = "stocks")]
        rows: Vec<Value>,
    },
    Customers {
        #[serde(rename = "Customers", alias = "customers")]
        rows: Vec<Value>,
    },
    Data {
        #[serde(rename = "Data", alias = "data")]
        rows: Vec<Value>,
    },
    Result {
        #[serde(rename = "Result", alias = "result")]
        rows: Vec<Value>,
    },
}

impl ListEnvelope {
    pub fn parse(context: &str, body: Value) -> Result<Self, ClientError> {
        serde_json::from_value(body).map_err(|_| {
            ClientError::shape(context, "expected a list or a known list wrapper")
        })
    }

    pub fn into_rows(self) -> Vec<Value> {
        match self {
            ListEnvelope::Bare(rows)
            | ListEnvelope::Products { rows }
            | ListEnvelope::Rows { rows }
            | ListEnvelope::Stocks { rows }
            | ListEnvelope::Customers { rows }
            | ListEnvelope::Data { rows }
            | ListEnvelope::Result { rows } => rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(body: Value) -> Vec<Value> {
        ListEnvelope::parse("test", body).unwrap().into_rows()
    }

    #[test]
    fn test_bare_list() {
        assert_eq!(rows(json!([{"Id": 1}, {"Id": 2}])).len(), 2);
    }

    #[test]
    fn test_wrapped_lists() {
        assert_eq!(rows(json!({"Products": [{"Id": 1}], "Count": 1})).len(), 1);
        assert_eq!(rows(json!({"rows": [{"Id": 1}, {"Id": 2}]})).len(), 2);
        assert_eq!(rows(json!({"Stocks": []})).len(), 0);
        assert_eq!(rows(json!({"result": [{"x": 1}]})).len(), 1);
    }

    #[test]
    fn test_unknown_shape_is_an_error() {
        let err = ListEnvelope::parse("Products/Get", json!({"Error": "denied"})).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedShape { .. }));
        assert!(ListEnvelope::parse("x", json!({"Data": null})).is_err());
        assert!(ListEnvelope::parse("x", json!("ok")).is_err());
    }
}
