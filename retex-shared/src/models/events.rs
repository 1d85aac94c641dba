use uuid::Uuid;

use crate::pii::Redacted;

/// Emitted once per suborder created by a checkout. The shop-facing
/// invoice is rendered from this payload.
#[derive(Debug, serde::Serialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub buyer_id: Uuid,
    pub total: i64,
    pub item_count: usize,
    pub delivery_address: Redacted<String>,
    pub timestamp: i64,
}

/// Emitted once per checkout, aggregating the per-shop breakdown.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct CheckoutCompletedEvent {
    pub buyer_id: Uuid,
    pub order_ids: Vec<Uuid>,
    pub total: i64,
    pub timestamp: i64,
}

/// Emitted on every accepted status transition.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub from: String,
    pub to: String,
    pub timestamp: i64,
}
