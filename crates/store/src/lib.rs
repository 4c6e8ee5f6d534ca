//! Relational storage for the cafeteria: catalog, promotions, orders,
//! payments and status history.
//!
//! [`Store`] is implemented by [`InMemoryStore`] for tests and database-less
//! runs, and by [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Category, NewOrder, Order, OrderLine, OrderPricing, Payment, Product, ProductDraft, Promotion,
    PromotionDraft, StatusChange,
};
pub use postgres::PostgresStore;
pub use query::{OrderQuery, ProductFilter};
pub use store::{CatalogStore, OrderStore, PaymentStore, PromotionStore, Store};
