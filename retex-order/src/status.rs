use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use retex_core::identity::Principal;
use retex_core::{BoxError, NotificationDispatcher};
use retex_shared::models::events::OrderStatusChangedEvent;

use crate::models::OrderStatus;
use crate::repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order is in terminal status {0}")]
    TerminalState(OrderStatus),

    #[error("status transitions are a shop operation")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(BoxError),
}

/// The forward path is processing -> confirmed -> assembled -> sent ->
/// delivered, one step at a time. Cancellation is open until the order
/// ships; a sent order can only be delivered.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Processing => &[OrderStatus::Confirmed, OrderStatus::Canceled],
        OrderStatus::Confirmed => &[OrderStatus::Assembled, OrderStatus::Canceled],
        OrderStatus::Assembled => &[OrderStatus::Sent, OrderStatus::Canceled],
        OrderStatus::Sent => &[OrderStatus::Delivered],
        OrderStatus::Delivered => &[],
        OrderStatus::Canceled => &[],
    }
}

pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Applies status transitions with compare-and-set semantics so two
/// concurrent updates cannot both land on the same order.
pub struct OrderStatusManager {
    orders: Arc<dyn OrderRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl OrderStatusManager {
    pub fn new(orders: Arc<dyn OrderRepository>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { orders, dispatcher }
    }

    pub async fn set_status(
        &self,
        caller: &Principal,
        order_id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderStatus, StatusError> {
        if !caller.is_shop() {
            return Err(StatusError::Forbidden);
        }

        let order = self
            .orders
            .get_order(order_id)
            .await
            .map_err(StatusError::Storage)?
            .ok_or(StatusError::OrderNotFound(order_id))?;

        let from = order.status;
        Self::check(from, to)?;

        let applied = self
            .orders
            .transition_status(order_id, from, to)
            .await
            .map_err(StatusError::Storage)?;
        if !applied {
            // Lost the race: report against the status that actually won.
            let current = self
                .orders
                .get_order(order_id)
                .await
                .map_err(StatusError::Storage)?
                .ok_or(StatusError::OrderNotFound(order_id))?
                .status;
            Self::check(current, to)?;
            // The concurrent writer applied the same transition we wanted.
            return Ok(to);
        }

        let event = OrderStatusChangedEvent {
            order_id,
            shop_id: order.shop_id,
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
            timestamp: Utc::now().timestamp(),
        };
        if let Err(e) = self.dispatcher.order_status_changed(&event).await {
            warn!(%order_id, error = %e, "status-changed dispatch failed");
        }

        info!(%order_id, %from, %to, "order status changed");
        Ok(to)
    }

    fn check(from: OrderStatus, to: OrderStatus) -> Result<(), StatusError> {
        if is_terminal(from) {
            return Err(StatusError::TerminalState(from));
        }
        if !allowed_transitions(from).contains(&to) {
            return Err(StatusError::InvalidTransition { from, to });
        }
        Ok(())
    }
}
