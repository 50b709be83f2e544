//! Attribute mappers.
//!
//! Each mapper turns one raw API record into a typed attribute set plus the
//! content hash used for change detection. Mappers never touch the store.

mod fields;
mod hash;
mod slug;
pub mod ten;
pub mod woo;

pub use hash::{canonical_json, content_hash};
pub use slug::slugify;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Attributes, ImportRow};

/// A mapped attribute set and its content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped<A> {
    pub attrs: A,
    pub hash: String,
}

impl<A: Serialize> Mapped<A> {
    /// Hashes `attrs`. Serialization failures drop the record.
    pub fn new(attrs: A) -> Option<Self> {
        match content_hash(&attrs) {
            Ok(hash) => Some(Self { attrs, hash }),
            Err(e) => {
                tracing::warn!(error = %e, "failed to hash mapped attributes");
                None
            }
        }
    }
}

impl<A: Attributes> Mapped<A> {
    pub fn into_row(self, fetched_at: DateTime<Utc>) -> ImportRow<A> {
        ImportRow::new(self.attrs, self.hash, fetched_at)
    }
}
