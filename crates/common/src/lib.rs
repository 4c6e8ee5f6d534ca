//! Shared vocabulary for the cafeteria service crates.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, PaymentMethod, UnknownLabel};
pub use types::{CategoryId, CustomerId, OrderId, ProductId, PromotionId, SessionId};
