//! Shared application state.

use domain::{CartService, CatalogService, OrderService, PaymentService};
use store::Store;

use crate::session::SessionStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentService<S>,
    pub sessions: SessionStore,

    /// Where customers without an identity are redirected.
    pub login_url: String,

    /// Bearer token accepted on staff routes. `None` locks them.
    pub admin_token: Option<String>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, login_url: impl Into<String>, admin_token: Option<String>) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store),
            sessions: SessionStore::new(),
            login_url: login_url.into(),
            admin_token,
        }
    }
}
