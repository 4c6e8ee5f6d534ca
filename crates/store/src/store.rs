use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, PaymentMethod, ProductId, PromotionId};

use crate::{
    Category, NewOrder, Order, OrderPricing, OrderQuery, Payment, Product, ProductDraft,
    ProductFilter, Promotion, PromotionDraft, Result, StatusChange,
};

/// Categories and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_category(&self, name: &str) -> Result<Category>;

    /// Returns all categories ordered by id.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn create_product(&self, draft: ProductDraft) -> Result<Product>;

    /// Replaces every editable field of a product.
    ///
    /// Fails with `NotFound` if the product doesn't exist.
    async fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product>;

    /// Deletes a product. Order lines keep their snapshot of it.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Fetches the given products; unknown ids are silently absent.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Lists products ordered by name.
    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>>;
}

/// Discount rules.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    async fn create_promotion(&self, draft: PromotionDraft) -> Result<Promotion>;

    async fn update_promotion(&self, id: PromotionId, draft: PromotionDraft)
    -> Result<Promotion>;

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>>;

    /// Lists promotions in ascending id order, optionally only active ones.
    ///
    /// The ordering is what makes first-match promotion selection
    /// deterministic.
    async fn list_promotions(&self, active_only: bool) -> Result<Vec<Promotion>>;
}

/// Orders, their lines and their status history.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Places an order atomically.
    ///
    /// Inserts the order and its lines, records the initial `pending` history
    /// entry and decrements each product's stock. Either everything commits or
    /// nothing does; a line asking for more than the remaining stock fails the
    /// whole placement with `InsufficientStock`.
    async fn place_order(&self, order: NewOrder) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Overwrites the stored pricing of an order.
    async fn update_pricing(&self, id: OrderId, pricing: OrderPricing) -> Result<Order>;

    /// Moves an order from `expected` to `next` and appends a history entry.
    ///
    /// This is the only way order status changes. Fails with
    /// `StatusConflict` if the order is no longer in `expected`.
    async fn change_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order>;

    /// Returns the status history of an order, oldest first.
    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>>;
}

/// Payment records.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_payment(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Creates or updates the payment of an order with `method`, resetting it
    /// to unpaid.
    async fn select_payment_method(
        &self,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<Payment>;

    /// Marks the payment as paid and releases the order to `pending`.
    ///
    /// The payment update and the status change (with its history entry)
    /// commit together. Fails with `NotFound` if no method was selected,
    /// `AlreadyPaid` if the payment was confirmed before, and
    /// `StatusConflict` if the order is not `pending`.
    async fn confirm_payment(
        &self,
        order_id: OrderId,
        reference: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Order)>;
}

/// Everything the cafeteria needs from durable storage.
pub trait Store: CatalogStore + PromotionStore + OrderStore + PaymentStore + Clone + 'static {}

impl<T> Store for T where T: CatalogStore + PromotionStore + OrderStore + PaymentStore + Clone + 'static
{}
