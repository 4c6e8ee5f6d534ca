//! Cart operations backed by the catalog.

use common::ProductId;
use store::Store;

use crate::commands::{AddToCart, UpdateCartItem};
use crate::error::DomainError;

use super::{Cart, CartChange, CartError, CartView};

/// Applies cart operations against the current catalog.
///
/// Each operation takes the session's cart by value and hands back the new
/// one. On error the caller still has the cart it started from.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, cart))]
    pub async fn add(&self, mut cart: Cart, cmd: AddToCart) -> Result<Cart, DomainError> {
        let product = self
            .store
            .get_product(cmd.product_id)
            .await?
            .ok_or(CartError::ProductUnavailable(cmd.product_id))?;

        let quantity = cart.add(&product, cmd.quantity)?;
        tracing::debug!(product_id = %cmd.product_id, quantity, "Cart item added");
        metrics::counter!("cafeteria_cart_actions_total", "action" => "add").increment(1);

        Ok(cart)
    }

    #[tracing::instrument(skip(self, cart))]
    pub async fn update(
        &self,
        mut cart: Cart,
        cmd: UpdateCartItem,
    ) -> Result<(Cart, CartChange), DomainError> {
        if cart.quantity(cmd.product_id).is_none() {
            return Ok((cart, CartChange::Unchanged));
        }

        let product = self.store.get_product(cmd.product_id).await?;
        let change = cart.update(cmd.product_id, product.as_ref(), cmd.quantity);
        metrics::counter!("cafeteria_cart_actions_total", "action" => "update").increment(1);

        Ok((cart, change))
    }

    pub fn remove(&self, mut cart: Cart, product_id: ProductId) -> (Cart, bool) {
        let removed = cart.remove(product_id);
        if removed {
            metrics::counter!("cafeteria_cart_actions_total", "action" => "remove").increment(1);
        }
        (cart, removed)
    }

    /// Resolves the cart against the catalog for display.
    pub async fn view(&self, cart: &Cart) -> Result<CartView, DomainError> {
        if cart.is_empty() {
            return Ok(CartView::default());
        }
        let products = self.store.get_products(&cart.product_ids()).await?;
        Ok(CartView::build(cart, &products))
    }
}
