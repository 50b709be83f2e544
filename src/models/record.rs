use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::sqlite::SqliteRow;
use sqlx::Sqlite;
use std::fmt::Debug;
use std::hash::Hash;

use super::SyncStatus;

/// Value binder handed to [`Attributes::bind_columns`] while building a
/// multi-row `INSERT`.
pub type Binder<'qb, 'args> = Separated<'qb, 'args, Sqlite, &'static str>;

/// Columns every syncable table carries next to its attribute columns.
pub const TRACKING_COLUMNS: [&str; 6] = [
    "content_hash",
    "sync_status",
    "last_error",
    "fetched_at",
    "created_at",
    "updated_at",
];

/// A mapped attribute set that lives in one row of one table.
///
/// Serialization produces the hashed content, so linkage fields (internal
/// row ids) are marked `#[serde(skip)]` on implementors and only appear in
/// [`Attributes::bind_columns`].
pub trait Attributes: Serialize + Clone + Send + Sync {
    type Key: Eq + Hash + Clone + Debug + Send + Sync;

    const TABLE: &'static str;
    /// Natural-key columns. The first one is an integer used for lookups.
    const KEY_COLUMNS: &'static [&'static str];
    /// Attribute columns in bind order, natural key included.
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    /// Value of the first natural-key column.
    fn lookup_id(&self) -> i64;

    fn key_from_row(row: &SqliteRow) -> Result<Self::Key, sqlx::Error>;

    fn bind_columns(&self, row: &mut Binder<'_, '_>);
}

/// A mapped record ready for classification and writing.
#[derive(Debug, Clone)]
pub struct ImportRow<A> {
    pub attrs: A,
    pub hash: String,
    pub status: SyncStatus,
    pub fetched_at: DateTime<Utc>,
}

impl<A: Attributes> ImportRow<A> {
    pub fn new(attrs: A, hash: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            attrs,
            hash,
            status: SyncStatus::Pending,
            fetched_at,
        }
    }

    pub fn key(&self) -> A::Key {
        self.attrs.key()
    }
}

/// What the store currently holds for a natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingState {
    pub hash: Option<String>,
    pub status: SyncStatus,
}
