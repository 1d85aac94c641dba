pub mod basket;
pub mod checkout;
pub mod memory;
pub mod models;
pub mod repository;
pub mod status;

pub use basket::{BasketError, BasketManager, BasketView};
pub use checkout::{CheckoutError, CheckoutOrchestrator};
pub use memory::{MemoryBaskets, MemoryOrders};
pub use models::{Basket, BasketItem, Order, OrderItem, OrderStatus};
pub use repository::{BasketRepository, OrderRepository};
pub use status::{allowed_transitions, is_terminal, OrderStatusManager, StatusError};
