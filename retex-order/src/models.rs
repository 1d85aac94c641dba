use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use retex_catalog::ParameterValue;
use retex_shared::Address;

/// Suborder lifecycle after checkout. The permitted edges live in the
/// transition table in `status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Confirmed,
    Assembled,
    Sent,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Assembled => "assembled",
            OrderStatus::Sent => "sent",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(OrderStatus::Processing),
            "confirmed" => Some(OrderStatus::Confirmed),
            "assembled" => Some(OrderStatus::Assembled),
            "sent" => Some(OrderStatus::Sent),
            "delivered" => Some(OrderStatus::Delivered),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Processing,
        OrderStatus::Confirmed,
        OrderStatus::Assembled,
        OrderStatus::Sent,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable per-shop snapshot produced by checkout. Nothing in here
/// references live offer state; later catalog changes never alter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub shop_id: Uuid,
    pub address: Address,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total(&self) -> i64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Snapshot of one basket line at the instant of checkout: product
/// identity, price and parameters as they were right then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_model: String,
    pub unit_price: i64,
    pub quantity: i64,
    pub parameters: Vec<ParameterValue>,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

/// A buyer's open, multi-shop draft order. Exactly one per buyer is open
/// at a time; checkout consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub items: Vec<BasketItem>,
}

/// One basket line. The shop is resolved from the offer at add time so
/// the basket can be partitioned without re-reading the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasketItem {
    pub offer_id: Uuid,
    pub shop_id: Uuid,
    pub quantity: i64,
}

impl Basket {
    pub fn new(buyer_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            consumed: false,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Re-adding the same offer increments the existing line instead of
    /// duplicating it.
    pub fn add(&mut self, offer_id: Uuid, shop_id: Uuid, quantity: i64) {
        match self.items.iter_mut().find(|i| i.offer_id == offer_id) {
            Some(item) => item.quantity += quantity,
            None => self.items.push(BasketItem { offer_id, shop_id, quantity }),
        }
    }

    /// Removes the line if present; absent lines are a no-op.
    pub fn remove(&mut self, offer_id: Uuid) {
        self.items.retain(|i| i.offer_id != offer_id);
    }

    /// Shops touched by this basket, in first-appearance order.
    pub fn shops(&self) -> Vec<Uuid> {
        let mut shops = Vec::new();
        for item in &self.items {
            if !shops.contains(&item.shop_id) {
                shops.push(item.shop_id);
            }
        }
        shops
    }

    pub fn items_for_shop(&self, shop_id: Uuid) -> Vec<&BasketItem> {
        self.items.iter().filter(|i| i.shop_id == shop_id).collect()
    }
}
