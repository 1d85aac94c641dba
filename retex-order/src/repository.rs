use async_trait::async_trait;
use uuid::Uuid;

use retex_core::BoxError;

use crate::models::{Basket, Order, OrderStatus};

/// Durable basket access. One open basket per buyer; `open_basket`
/// returns it or creates an empty one.
#[async_trait]
pub trait BasketRepository: Send + Sync {
    async fn open_basket(&self, buyer_id: Uuid) -> Result<Basket, BoxError>;

    async fn save_basket(&self, basket: &Basket) -> Result<(), BoxError>;

    /// Claim the basket for fulfillment. Compare-and-set: exactly one
    /// caller gets `true`; a basket already consumed (or unknown) yields
    /// `false`. A consumed basket is never reused; the next `open_basket`
    /// starts a fresh one.
    async fn consume_basket(&self, basket_id: Uuid) -> Result<bool, BoxError>;
}

/// Durable order access.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the whole checkout result as one unit.
    async fn create_orders(&self, orders: &[Order]) -> Result<(), BoxError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError>;

    async fn list_orders(&self, buyer_id: Uuid) -> Result<Vec<Order>, BoxError>;

    /// A shop's placed suborders, newest first.
    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>, BoxError>;

    /// Compare-and-set on the status row: applies `to` only while the
    /// stored status still equals `from`. Returns false when a concurrent
    /// transition won the race.
    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, BoxError>;
}
