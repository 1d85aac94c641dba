use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use retex_catalog::{CatalogRepository, OfferDetail, ReserveError, StockLine};
use retex_core::identity::Principal;
use retex_core::{AddressBook, BoxError, NotificationDispatcher};
use retex_shared::models::events::{CheckoutCompletedEvent, OrderPlacedEvent};
use retex_shared::Redacted;

use crate::models::{Order, OrderItem, OrderStatus};
use crate::repository::{BasketRepository, OrderRepository};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("basket is empty")]
    EmptyBasket,

    #[error("delivery address is missing or not owned by the buyer")]
    InvalidAddress,

    #[error("offer {0} is no longer available")]
    OfferUnavailable(Uuid),

    #[error("insufficient stock for offer {offer_id}: available {available}, requested {requested}")]
    InsufficientStock { offer_id: Uuid, available: i64, requested: i64 },

    #[error("shop '{0}' is not accepting orders")]
    ShopUnavailable(String),

    #[error("checkout is a buyer operation")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(BoxError),
}

/// Turns a buyer's basket into immutable per-shop orders. The whole
/// operation is all-or-nothing: if any line cannot be satisfied, no stock
/// moves and no order is created.
pub struct CheckoutOrchestrator {
    catalog: Arc<dyn CatalogRepository>,
    baskets: Arc<dyn BasketRepository>,
    orders: Arc<dyn OrderRepository>,
    addresses: Arc<dyn AddressBook>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        baskets: Arc<dyn BasketRepository>,
        orders: Arc<dyn OrderRepository>,
        addresses: Arc<dyn AddressBook>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { catalog, baskets, orders, addresses, dispatcher }
    }

    /// Check out the caller's open basket. With no explicit address the
    /// buyer's default is used; without either, checkout refuses.
    pub async fn checkout(
        &self,
        caller: &Principal,
        address_id: Option<Uuid>,
    ) -> Result<Vec<Order>, CheckoutError> {
        if !caller.is_buyer() {
            return Err(CheckoutError::Forbidden);
        }
        let buyer_id = caller.user_id;

        let basket = self
            .baskets
            .open_basket(buyer_id)
            .await
            .map_err(CheckoutError::Storage)?;
        if basket.is_empty() {
            return Err(CheckoutError::EmptyBasket);
        }

        let address = match address_id {
            Some(id) => self
                .addresses
                .get_address(id)
                .await
                .map_err(CheckoutError::Storage)?
                .filter(|a| a.buyer_id == buyer_id)
                .ok_or(CheckoutError::InvalidAddress)?,
            None => self
                .addresses
                .default_for(buyer_id)
                .await
                .map_err(CheckoutError::Storage)?
                .ok_or(CheckoutError::InvalidAddress)?,
        };

        // Re-read every offer live. Prices or stock cached at add-to-basket
        // time may be stale.
        let mut details: HashMap<Uuid, OfferDetail> = HashMap::new();
        for item in &basket.items {
            let detail = self
                .catalog
                .get_offer_detail(item.offer_id)
                .await
                .map_err(CheckoutError::Storage)?
                .ok_or(CheckoutError::OfferUnavailable(item.offer_id))?;
            if !detail.shop_accepting {
                return Err(CheckoutError::ShopUnavailable(detail.shop_name));
            }
            details.insert(item.offer_id, detail);
        }

        // The serialization point: check-then-decrement for every line as
        // one atomic unit.
        let lines: Vec<StockLine> = basket
            .items
            .iter()
            .map(|i| StockLine { offer_id: i.offer_id, quantity: i.quantity })
            .collect();
        self.catalog.reserve_stock(&lines).await.map_err(|e| match e {
            ReserveError::OfferMissing(id) => CheckoutError::OfferUnavailable(id),
            ReserveError::InsufficientStock { offer_id, available, requested } => {
                CheckoutError::InsufficientStock { offer_id, available, requested }
            }
            ReserveError::Storage(e) => CheckoutError::Storage(e),
        })?;

        // Snapshot each line at this instant; later catalog changes must
        // never reach into placed orders.
        let now = Utc::now();
        let mut orders = Vec::new();
        for shop_id in basket.shops() {
            let items = basket
                .items_for_shop(shop_id)
                .into_iter()
                .filter_map(|item| {
                    details.get(&item.offer_id).map(|detail| OrderItem {
                        id: Uuid::new_v4(),
                        product_id: detail.offer.product_id,
                        product_name: detail.product_name.clone(),
                        product_model: detail.product_model.clone(),
                        unit_price: detail.offer.price,
                        quantity: item.quantity,
                        parameters: detail.offer.parameters.clone(),
                    })
                })
                .collect();
            orders.push(Order {
                id: Uuid::new_v4(),
                buyer_id,
                shop_id,
                address: address.clone(),
                status: OrderStatus::Processing,
                created_at: now,
                items,
            });
        }

        // Claim the basket before writing orders. A concurrent checkout of
        // the same basket loses the claim; its reservation is returned and
        // it reports an empty basket, because the winner owns the lines.
        match self.baskets.consume_basket(basket.id).await {
            Ok(true) => {}
            Ok(false) => {
                self.release_lines(&lines).await;
                return Err(CheckoutError::EmptyBasket);
            }
            Err(e) => {
                self.release_lines(&lines).await;
                return Err(CheckoutError::Storage(e));
            }
        }

        if let Err(e) = self.orders.create_orders(&orders).await {
            // Compensate: put the stock back and reopen the basket so the
            // buyer loses nothing.
            self.release_lines(&lines).await;
            if let Err(e) = self.baskets.save_basket(&basket).await {
                warn!(basket_id = %basket.id, error = %e, "failed to reopen basket after checkout failure");
            }
            return Err(CheckoutError::Storage(e));
        }

        self.dispatch_events(buyer_id, &address.summary(), &orders).await;

        info!(
            %buyer_id,
            orders = orders.len(),
            total = orders.iter().map(Order::total).sum::<i64>(),
            "checkout completed"
        );
        Ok(orders)
    }

    /// Best-effort compensation for a reservation whose checkout did not
    /// complete. A failure here is logged; there is nothing left to undo.
    async fn release_lines(&self, lines: &[StockLine]) {
        if let Err(e) = self.catalog.release_stock(lines).await {
            warn!(error = %e, "failed to release reserved stock");
        }
    }

    /// Fire-and-forget: one event per suborder plus the aggregate.
    /// Dispatcher failures never roll back the checkout.
    async fn dispatch_events(&self, buyer_id: Uuid, address_line: &str, orders: &[Order]) {
        let timestamp = Utc::now().timestamp();
        for order in orders {
            let event = OrderPlacedEvent {
                order_id: order.id,
                shop_id: order.shop_id,
                buyer_id,
                total: order.total(),
                item_count: order.items.len(),
                delivery_address: Redacted(address_line.to_string()),
                timestamp,
            };
            if let Err(e) = self.dispatcher.order_placed(&event).await {
                warn!(order_id = %order.id, error = %e, "order-placed dispatch failed");
            }
        }

        let aggregate = CheckoutCompletedEvent {
            buyer_id,
            order_ids: orders.iter().map(|o| o.id).collect(),
            total: orders.iter().map(Order::total).sum(),
            timestamp,
        };
        if let Err(e) = self.dispatcher.checkout_completed(&aggregate).await {
            warn!(%buyer_id, error = %e, "checkout-completed dispatch failed");
        }
    }
}
