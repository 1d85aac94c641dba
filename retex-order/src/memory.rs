use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use retex_core::BoxError;

use crate::models::{Basket, Order, OrderStatus};
use crate::repository::{BasketRepository, OrderRepository};

/// In-memory basket store keyed by buyer.
pub struct MemoryBaskets {
    inner: Mutex<HashMap<Uuid, Basket>>,
}

impl MemoryBaskets {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemoryBaskets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasketRepository for MemoryBaskets {
    async fn open_basket(&self, buyer_id: Uuid) -> Result<Basket, BoxError> {
        let mut baskets = self.inner.lock().await;
        let basket = baskets
            .entry(buyer_id)
            .or_insert_with(|| Basket::new(buyer_id));
        Ok(basket.clone())
    }

    async fn save_basket(&self, basket: &Basket) -> Result<(), BoxError> {
        let mut baskets = self.inner.lock().await;
        baskets.insert(basket.buyer_id, basket.clone());
        Ok(())
    }

    async fn consume_basket(&self, basket_id: Uuid) -> Result<bool, BoxError> {
        let mut baskets = self.inner.lock().await;
        // Dropping the entry closes the basket; the next open starts
        // fresh. Only the first caller finds the entry and wins the claim.
        let buyer_id = baskets
            .iter()
            .find(|(_, b)| b.id == basket_id)
            .map(|(buyer_id, _)| *buyer_id);
        match buyer_id {
            Some(buyer_id) => {
                baskets.remove(&buyer_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory order store.
pub struct MemoryOrders {
    inner: Mutex<HashMap<Uuid, Order>>,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemoryOrders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn create_orders(&self, orders: &[Order]) -> Result<(), BoxError> {
        let mut store = self.inner.lock().await;
        for order in orders {
            store.insert(order.id, order.clone());
        }
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        let store = self.inner.lock().await;
        Ok(store.get(&id).cloned())
    }

    async fn list_orders(&self, buyer_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let store = self.inner.lock().await;
        let mut orders: Vec<Order> = store
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let store = self.inner.lock().await;
        let mut orders: Vec<Order> = store
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, BoxError> {
        let mut store = self.inner.lock().await;
        match store.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(format!("order {} not found", id).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consume_basket_claims_once() {
        let baskets = MemoryBaskets::new();
        let basket = baskets.open_basket(Uuid::new_v4()).await.unwrap();

        assert!(baskets.consume_basket(basket.id).await.unwrap());
        // The claim is gone; a second consumer must lose.
        assert!(!baskets.consume_basket(basket.id).await.unwrap());

        let reopened = baskets.open_basket(basket.buyer_id).await.unwrap();
        assert_ne!(reopened.id, basket.id);
    }
}
