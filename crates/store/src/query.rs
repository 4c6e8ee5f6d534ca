use common::{CustomerId, OrderStatus};

/// Builder for constructing order listings.
///
/// Allows filtering orders by customer and status, ordering by creation
/// time, and paging.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by customer.
    pub customer_id: Option<CustomerId>,

    /// Keep only orders in one of these statuses.
    pub statuses: Option<Vec<OrderStatus>>,

    /// Drop orders in any of these statuses.
    pub excluded_statuses: Vec<OrderStatus>,

    /// Newest first when true, oldest first otherwise.
    pub newest_first: bool,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query (oldest first).
    pub fn new() -> Self {
        Self::default()
    }

    /// The "my orders" listing: a customer's orders, newest first, without
    /// the cancelled ones.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            excluded_statuses: vec![OrderStatus::Cancelled],
            newest_first: true,
            ..Default::default()
        }
    }

    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    pub fn statuses(mut self, statuses: Vec<OrderStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn exclude_status(mut self, status: OrderStatus) -> Self {
        if !self.excluded_statuses.contains(&status) {
            self.excluded_statuses.push(status);
        }
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if an order with this customer and status passes the
    /// filters.
    pub fn matches(&self, customer_id: CustomerId, status: OrderStatus) -> bool {
        if let Some(customer) = self.customer_id
            && customer != customer_id
        {
            return false;
        }
        if let Some(ref statuses) = self.statuses
            && !statuses.contains(&status)
        {
            return false;
        }
        !self.excluded_statuses.contains(&status)
    }
}

/// Filter for catalog listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter {
    /// Only active products with stock left (the menu).
    pub orderable_only: bool,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn menu() -> Self {
        Self {
            orderable_only: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_listing_hides_cancelled_orders() {
        let customer = CustomerId::new();
        let query = OrderQuery::for_customer(customer);

        assert!(query.newest_first);
        assert!(query.matches(customer, OrderStatus::Pending));
        assert!(query.matches(customer, OrderStatus::Delivered));
        assert!(!query.matches(customer, OrderStatus::Cancelled));
        assert!(!query.matches(CustomerId::new(), OrderStatus::Pending));
    }

    #[test]
    fn status_filter_keeps_listed_statuses() {
        let query = OrderQuery::new().statuses(vec![OrderStatus::Pending, OrderStatus::Ready]);
        let customer = CustomerId::new();

        assert!(query.matches(customer, OrderStatus::Pending));
        assert!(query.matches(customer, OrderStatus::Ready));
        assert!(!query.matches(customer, OrderStatus::Preparing));
    }

    #[test]
    fn exclude_status_does_not_duplicate() {
        let query = OrderQuery::new()
            .exclude_status(OrderStatus::Cancelled)
            .exclude_status(OrderStatus::Cancelled);
        assert_eq!(query.excluded_statuses, vec![OrderStatus::Cancelled]);
    }
}
