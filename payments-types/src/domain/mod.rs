//! Domain models for the storefront payments service.

pub mod gateway;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod secret;

pub use gateway::{CustomerDetails, ItemDetail, TransactionDetails, TransactionRequest};
pub use notification::{
    GatewayNotification, GatewayStatus, NotificationOutcome, parse_gateway_time,
};
pub use order::{Order, OrderId, OrderItem, OrderStatus};
pub use payment::{GatewaySession, Payment, PaymentId, PaymentStatus, mint_gateway_order_id};
pub use product::{Product, ProductId};
pub use secret::ServerKey;
