//! In-memory stand-ins for the ERP and the storefront.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::clients::{
    CategoryPayload, ClientError, CustomerQuery, ErpApi, OrderQuery, ProductPayload, ProductQuery,
    RemoteCategory, RemoteProduct, StoreApi,
};

fn rejected(context: &str) -> ClientError {
    ClientError::Status {
        context: context.to_string(),
        status: 400,
        body: "rejected".to_string(),
    }
}

#[derive(Default)]
pub struct FakeErp {
    pub categories: Vec<Value>,
    pub products: Vec<Value>,
    pub stocks: Vec<Value>,
    pub customers: Vec<Value>,
    /// Answers for `Customers/Set`, used in order before the default one.
    pub customer_results: Mutex<VecDeque<Value>>,
    pub created: Mutex<Vec<Value>>,
}

impl FakeErp {
    pub fn created(&self) -> Vec<Value> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErpApi for FakeErp {
    async fn categories(&self, limit: usize) -> Result<Vec<Value>, ClientError> {
        Ok(self.categories.iter().take(limit).cloned().collect())
    }

    async fn products(&self, _query: &ProductQuery) -> Result<Vec<Value>, ClientError> {
        Ok(self.products.clone())
    }

    async fn stocks(&self) -> Result<Vec<Value>, ClientError> {
        Ok(self.stocks.clone())
    }

    async fn customers(
        &self,
        _modified_after: chrono::NaiveDateTime,
    ) -> Result<Vec<Value>, ClientError> {
        Ok(self.customers.clone())
    }

    /// Defaults to accepting the customer as `9<Codigo>` and each address
    /// as `5<Codigo>`.
    async fn create_customer(&self, payload: &Value) -> Result<Value, ClientError> {
        self.created.lock().unwrap().push(payload.clone());
        if let Some(result) = self.customer_results.lock().unwrap().pop_front() {
            return Ok(result);
        }

        let code = payload["Codigo"].as_str().unwrap_or_default();
        let addresses: Vec<Value> = payload["Direcciones"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|a| {
                        let code = a["Codigo"].as_str().unwrap_or_default();
                        json!({"Codigo": code, "IdTen": format!("5{}", code), "Exceptions": []})
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({
            "Codigo": code,
            "IdTen": format!("9{}", code),
            "Direcciones": addresses,
            "Exceptions": []
        }))
    }
}

#[derive(Default)]
pub struct StoreState {
    pub categories: Vec<RemoteCategory>,
    pub products: Vec<RemoteProduct>,
    pub next_id: i64,
    /// Mutating calls in order, e.g. `POST products/categories slug`.
    pub writes: Vec<String>,
    pub product_updates: Vec<(i64, ProductPayload)>,
    pub reads: usize,
}

#[derive(Default)]
pub struct FakeStore {
    pub customers: Vec<Value>,
    pub orders: Vec<Value>,
    /// Category slugs whose creation is refused.
    pub reject_slugs: Vec<String>,
    /// Created categories come back without an id.
    pub omit_created_ids: bool,
    pub state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn with_categories(categories: Vec<RemoteCategory>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            state.next_id = categories.iter().map(|c| c.id).max().unwrap_or(0) + 100;
            state.categories = categories;
        }
        store
    }

    pub fn with_products(products: Vec<RemoteProduct>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            state.next_id = products.iter().map(|p| p.id).max().unwrap_or(0) + 100;
            state.products = products;
        }
        store
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn category(&self, id: i64) -> Option<RemoteCategory> {
        let state = self.state.lock().unwrap();
        state.categories.iter().find(|c| c.id == id).cloned()
    }

    fn next_id(state: &mut StoreState) -> i64 {
        state.next_id = state.next_id.max(1000) + 1;
        state.next_id
    }
}

#[async_trait]
impl StoreApi for FakeStore {
    async fn customers(&self, query: &CustomerQuery) -> Result<Vec<Value>, ClientError> {
        self.state.lock().unwrap().reads += 1;
        Ok(self
            .customers
            .iter()
            .filter(|c| match &query.email {
                Some(email) => c["email"].as_str() == Some(email.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn orders(&self, _query: &OrderQuery) -> Result<Vec<Value>, ClientError> {
        self.state.lock().unwrap().reads += 1;
        Ok(self.orders.clone())
    }

    async fn categories_by_slug(&self, slug: &str) -> Result<Vec<RemoteCategory>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state
            .categories
            .iter()
            .filter(|c| c.slug == slug)
            .cloned()
            .collect())
    }

    async fn create_category(
        &self,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .writes
            .push(format!("POST products/categories {}", payload.slug));
        if self.reject_slugs.contains(&payload.slug) {
            return Err(rejected("products/categories"));
        }
        if self.omit_created_ids {
            return Ok(RemoteCategory::default());
        }

        let category = RemoteCategory {
            id: Self::next_id(&mut state),
            parent: payload.parent,
            slug: payload.slug.clone(),
            name: payload.name.clone(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        payload: &CategoryPayload,
    ) -> Result<RemoteCategory, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("PUT products/categories/{}", id));
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| rejected("products/categories"))?;
        category.parent = payload.parent;
        category.name = payload.name.clone();
        category.slug = payload.slug.clone();
        Ok(category.clone())
    }

    async fn products_by_sku(&self, sku: &str) -> Result<Vec<RemoteProduct>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state
            .products
            .iter()
            .filter(|p| p.sku == sku)
            .cloned()
            .collect())
    }

    async fn product(&self, id: i64) -> Result<RemoteProduct, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        state
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| rejected("products"))
    }

    async fn create_product(
        &self,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push("POST products".to_string());
        let product = RemoteProduct {
            id: Self::next_id(&mut state),
            sku: payload.sku.clone().unwrap_or_default(),
            description: payload.description.clone().unwrap_or_default(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: i64,
        payload: &ProductPayload,
    ) -> Result<RemoteProduct, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(format!("PUT products/{}", id));
        state.product_updates.push((id, payload.clone()));
        state
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| rejected("products"))
    }
}
