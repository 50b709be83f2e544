mod category;
mod customer;
mod order;
mod product;
pub mod record;
mod sync_status;

pub use category::{Category, CategoryAttrs};
pub use customer::{
    normalize_email, Address, AddressAttrs, AddressKind, Customer, CustomerAttrs,
};
pub use order::{OrderAttrs, OrderLineAttrs};
pub use product::{Product, ProductAttrs};
pub use record::{Attributes, ExistingState, ImportRow};
pub use sync_status::{StatusFilter, SyncStatus};
