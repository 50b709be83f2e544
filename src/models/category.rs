use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::record::{Attributes, Binder};
use super::SyncStatus;

/// Category attributes as read from the ERP web-category table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAttrs {
    pub ten_id: i64,
    pub ten_code: Option<String>,
    pub name: Option<String>,
    pub web_name: Option<String>,
    pub parent_ten_id: Option<i64>,
    pub last_user: Option<i64>,
    pub last_changed_at: Option<String>,
    pub created_user: Option<i64>,
    pub created_on: Option<String>,
    pub web_sync: bool,
    pub blocked: bool,
    pub weight: Option<String>,
}

impl Attributes for CategoryAttrs {
    type Key = i64;

    const TABLE: &'static str = "categories";
    const KEY_COLUMNS: &'static [&'static str] = &["ten_id"];
    const COLUMNS: &'static [&'static str] = &[
        "ten_id",
        "ten_code",
        "name",
        "web_name",
        "parent_ten_id",
        "last_user",
        "last_changed_at",
        "created_user",
        "created_on",
        "web_sync",
        "blocked",
        "weight",
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
            .push_bind(self.name.clone())
            .push_bind(self.web_name.clone())
            .push_bind(self.parent_ten_id)
            .push_bind(self.last_user)
            .push_bind(self.last_changed_at.clone())
            .push_bind(self.created_user)
            .push_bind(self.created_on.clone())
            .push_bind(self.web_sync)
            .push_bind(self.blocked)
            .push_bind(self.weight.clone());
    }
}

/// A stored category as seen by the hierarchy resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub ten_id: i64,
    pub ten_code: Option<String>,
    pub woo_id: Option<i64>,
    pub woo_parent_id: Option<i64>,
    pub name: Option<String>,
    pub web_name: Option<String>,
    pub parent_ten_id: Option<i64>,
    pub blocked: bool,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
}

impl Category {
    /// Name shown in the storefront: web name, then ERP name, then code.
    pub fn display_name(&self) -> String {
        [&self.web_name, &self.name, &self.ten_code]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// Source id of the parent, `None` for roots.
    pub fn parent(&self) -> Option<i64> {
        self.parent_ten_id.filter(|id| *id > 0)
    }
}
