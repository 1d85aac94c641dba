use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use retex_catalog::CatalogRepository;
use retex_core::identity::Principal;
use retex_core::BoxError;

use crate::models::Basket;
use crate::repository::BasketRepository;

#[derive(Debug, thiserror::Error)]
pub enum BasketError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("offer {0} not found")]
    OfferNotFound(Uuid),

    #[error("baskets belong to buyers")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(BoxError),
}

/// Read-only basket projection grouped by shop, priced from the live
/// catalog. Lines whose offer has vanished drop out of the view; checkout
/// is where that failure surfaces.
#[derive(Debug, Serialize)]
pub struct BasketView {
    pub basket_id: Uuid,
    pub shops: Vec<BasketShopView>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct BasketShopView {
    pub shop_id: Uuid,
    pub shop_name: String,
    pub items: Vec<BasketLineView>,
    pub subtotal: i64,
}

#[derive(Debug, Serialize)]
pub struct BasketLineView {
    pub offer_id: Uuid,
    pub product_name: String,
    pub product_model: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

/// Mutates a buyer's open basket. Stock is deliberately not checked here:
/// stock is a shared, externally mutable resource, so validation belongs
/// to checkout, where it can be made atomic.
pub struct BasketManager {
    baskets: Arc<dyn BasketRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl BasketManager {
    pub fn new(baskets: Arc<dyn BasketRepository>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { baskets, catalog }
    }

    pub async fn add_item(
        &self,
        caller: &Principal,
        offer_id: Uuid,
        quantity: i64,
    ) -> Result<Basket, BasketError> {
        if !caller.is_buyer() {
            return Err(BasketError::Forbidden);
        }
        if quantity < 1 {
            return Err(BasketError::InvalidQuantity(quantity));
        }

        let detail = self
            .catalog
            .get_offer_detail(offer_id)
            .await
            .map_err(BasketError::Storage)?
            .ok_or(BasketError::OfferNotFound(offer_id))?;

        let mut basket = self
            .baskets
            .open_basket(caller.user_id)
            .await
            .map_err(BasketError::Storage)?;
        basket.add(offer_id, detail.offer.shop_id, quantity);
        self.baskets
            .save_basket(&basket)
            .await
            .map_err(BasketError::Storage)?;
        Ok(basket)
    }

    pub async fn remove_item(
        &self,
        caller: &Principal,
        offer_id: Uuid,
    ) -> Result<Basket, BasketError> {
        if !caller.is_buyer() {
            return Err(BasketError::Forbidden);
        }

        let mut basket = self
            .baskets
            .open_basket(caller.user_id)
            .await
            .map_err(BasketError::Storage)?;
        basket.remove(offer_id);
        self.baskets
            .save_basket(&basket)
            .await
            .map_err(BasketError::Storage)?;
        Ok(basket)
    }

    pub async fn get_basket(&self, caller: &Principal) -> Result<BasketView, BasketError> {
        if !caller.is_buyer() {
            return Err(BasketError::Forbidden);
        }

        let basket = self
            .baskets
            .open_basket(caller.user_id)
            .await
            .map_err(BasketError::Storage)?;

        let mut shops = Vec::new();
        let mut total = 0;
        for shop_id in basket.shops() {
            let mut items = Vec::new();
            let mut subtotal = 0;
            let mut shop_name = String::new();
            for item in basket.items_for_shop(shop_id) {
                let Some(detail) = self
                    .catalog
                    .get_offer_detail(item.offer_id)
                    .await
                    .map_err(BasketError::Storage)?
                else {
                    continue;
                };
                let line_total = detail.offer.price * item.quantity;
                subtotal += line_total;
                shop_name = detail.shop_name.clone();
                items.push(BasketLineView {
                    offer_id: item.offer_id,
                    product_name: detail.product_name,
                    product_model: detail.product_model,
                    quantity: item.quantity,
                    unit_price: detail.offer.price,
                    line_total,
                });
            }
            if items.is_empty() {
                continue;
            }
            total += subtotal;
            shops.push(BasketShopView { shop_id, shop_name, items, subtotal });
        }

        Ok(BasketView { basket_id: basket.id, shops, total })
    }
}
