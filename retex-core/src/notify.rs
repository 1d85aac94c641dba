use async_trait::async_trait;
use std::sync::Mutex;

use retex_shared::models::events::{
    CheckoutCompletedEvent, OrderPlacedEvent, OrderStatusChangedEvent,
};

use crate::BoxError;

/// Outbound notification boundary. The core calls it fire-and-forget:
/// dispatch failures are logged by the caller and never roll back the
/// checkout or status transaction that produced the event.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), BoxError>;

    async fn checkout_completed(&self, event: &CheckoutCompletedEvent) -> Result<(), BoxError>;

    async fn order_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), BoxError>;
}

/// Everything a recording dispatcher has seen, in dispatch order.
#[derive(Debug, Clone)]
pub enum DispatchedEvent {
    OrderPlaced(OrderPlacedEvent),
    CheckoutCompleted(CheckoutCompletedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}

/// In-memory dispatcher that records events instead of delivering them.
pub struct RecordingDispatcher {
    events: Mutex<Vec<DispatchedEvent>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    pub fn events(&self) -> Vec<DispatchedEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DispatchedEvent::OrderPlaced(event.clone()));
        Ok(())
    }

    async fn checkout_completed(&self, event: &CheckoutCompletedEvent) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DispatchedEvent::CheckoutCompleted(event.clone()));
        Ok(())
    }

    async fn order_status_changed(&self, event: &OrderStatusChangedEvent) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DispatchedEvent::OrderStatusChanged(event.clone()));
        Ok(())
    }
}
