//! The customer's cart: product quantities accumulated before an order is
//! placed.
//!
//! A [`Cart`] is a plain value. It lives in the caller's session and is passed
//! through each operation; nothing here touches durable storage.

mod service;

pub use service::CartService;

use std::collections::BTreeMap;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::Product;
use thiserror::Error;

/// Errors raised by cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("Only {available} units of product {product_id} are in stock")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    #[error("The cart is empty")]
    EmptyCart,
}

/// Effect of an update on a cart entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// The entry now holds this quantity.
    Updated(u32),
    /// The entry was dropped because its product is gone or out of stock.
    Removed,
    /// The product was not in the cart.
    Unchanged,
}

/// Mapping of product to requested quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: BTreeMap<ProductId, u32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn quantity(&self, product_id: ProductId) -> Option<u32> {
        self.items.get(&product_id).copied()
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.items.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Adds `quantity` units of `product`.
    ///
    /// The quantity requested on its own must fit in the current stock; the
    /// accumulated quantity is then clamped to it. Returns the new quantity.
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.is_orderable() {
            return Err(CartError::ProductUnavailable(product.id));
        }
        if quantity > product.stock {
            return Err(CartError::InsufficientStock {
                product_id: product.id,
                available: product.stock,
            });
        }

        let entry = self.items.entry(product.id).or_insert(0);
        *entry = entry.saturating_add(quantity).min(product.stock);
        Ok(*entry)
    }

    /// Sets the quantity of a product already in the cart, clamped to
    /// `[1, stock]`.
    ///
    /// `product` is the current catalog record, if it still exists. Entries
    /// whose product is gone or has no stock left are removed.
    pub fn update(
        &mut self,
        product_id: ProductId,
        product: Option<&Product>,
        quantity: u32,
    ) -> CartChange {
        if !self.items.contains_key(&product_id) {
            return CartChange::Unchanged;
        }

        match product {
            Some(product) if product.stock > 0 => {
                let clamped = quantity.clamp(1, product.stock);
                self.items.insert(product_id, clamped);
                CartChange::Updated(clamped)
            }
            _ => {
                self.items.remove(&product_id);
                CartChange::Removed
            }
        }
    }

    /// Drops a product from the cart. Returns true if it was there.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        self.items.remove(&product_id).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// A cart entry resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
    pub stock: u32,
}

/// What the customer sees when looking at their cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Money,
}

impl CartView {
    /// Resolves a cart against catalog records, skipping products that no
    /// longer exist.
    pub fn build(cart: &Cart, products: &[Product]) -> Self {
        let lines: Vec<CartLine> = cart
            .iter()
            .filter_map(|(product_id, quantity)| {
                let product = products.iter().find(|p| p.id == product_id)?;
                Some(CartLine {
                    product_id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity,
                    subtotal: product.price.multiply(quantity),
                    stock: product.stock,
                })
            })
            .collect();
        let total = lines.iter().map(|l| l.subtotal).sum();

        Self { lines, total }
    }
}
