use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use retex_core::BoxError;

use crate::feed::ImportBatch;
use crate::importer::ImportSummary;
use crate::models::{Category, Offer, OfferDetail, Product, Shop, StockLine};
use crate::repository::{CatalogRepository, ReserveError};

#[derive(Default)]
struct CatalogState {
    shops: HashMap<Uuid, Shop>,
    categories: Vec<Category>,
    shop_categories: HashSet<(Uuid, Uuid)>,
    products: Vec<Product>,
    offers: HashMap<Uuid, Offer>,
}

/// In-memory catalog. One mutex guards the whole state, so every
/// repository operation is a single critical section; this is what makes
/// `apply_import` and `reserve_stock` atomic here the way a database
/// transaction makes them atomic in the durable store.
pub struct MemoryCatalog {
    inner: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self { inner: Mutex::new(CatalogState::default()) }
    }

    /// Seed a shop directly, for tests and fixtures.
    pub async fn insert_shop(&self, shop: Shop) {
        let mut state = self.inner.lock().await;
        state.shops.insert(shop.id, shop);
    }

    /// Seed an offer directly, for tests and fixtures.
    pub async fn insert_offer(&self, offer: Offer) {
        let mut state = self.inner.lock().await;
        state.offers.insert(offer.id, offer);
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, BoxError> {
        let state = self.inner.lock().await;
        Ok(state.shops.get(&id).cloned())
    }

    async fn set_shop_state(&self, id: Uuid, accepting: bool) -> Result<(), BoxError> {
        let mut state = self.inner.lock().await;
        let shop = state
            .shops
            .get_mut(&id)
            .ok_or_else(|| format!("shop {} not found", id))?;
        shop.accepting_orders = accepting;
        Ok(())
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, BoxError> {
        let state = self.inner.lock().await;
        Ok(state.offers.get(&id).cloned())
    }

    async fn get_offer_detail(&self, id: Uuid) -> Result<Option<OfferDetail>, BoxError> {
        let state = self.inner.lock().await;
        let Some(offer) = state.offers.get(&id) else {
            return Ok(None);
        };
        let product = state
            .products
            .iter()
            .find(|p| p.id == offer.product_id)
            .ok_or_else(|| format!("offer {} references missing product", id))?;
        let shop = state
            .shops
            .get(&offer.shop_id)
            .ok_or_else(|| format!("offer {} references missing shop", id))?;

        Ok(Some(OfferDetail {
            offer: offer.clone(),
            product_name: product.name.clone(),
            product_model: product.model.clone(),
            shop_name: shop.name.clone(),
            shop_accepting: shop.accepting_orders,
        }))
    }

    async fn offers_for_shop(&self, shop_id: Uuid) -> Result<Vec<Offer>, BoxError> {
        let state = self.inner.lock().await;
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| o.shop_id == shop_id)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.external_id);
        Ok(offers)
    }

    async fn apply_import(
        &self,
        shop_id: Uuid,
        batch: ImportBatch,
    ) -> Result<ImportSummary, BoxError> {
        let mut state = self.inner.lock().await;
        let state = &mut *state;
        let mut summary = ImportSummary::default();

        let shop = state.shops.entry(shop_id).or_insert_with(|| Shop {
            id: shop_id,
            name: batch.shop_name.clone(),
            url: None,
            accepting_orders: true,
        });
        // The feed is authoritative for the shop's display name.
        shop.name = batch.shop_name.clone();

        let mut category_ids: HashMap<String, Uuid> = HashMap::new();
        for name in &batch.categories {
            let id = match state.categories.iter().find(|c| c.name == *name) {
                Some(category) => category.id,
                None => {
                    let id = Uuid::new_v4();
                    state.categories.push(Category { id, name: name.clone() });
                    summary.categories_created += 1;
                    id
                }
            };
            state.shop_categories.insert((shop_id, id));
            category_ids.insert(name.clone(), id);
        }

        for spec in &batch.offers {
            let category_id = category_ids
                .get(&spec.category)
                .copied()
                .ok_or_else(|| format!("category '{}' missing from batch", spec.category))?;

            let product_id = match state.products.iter_mut().find(|p| p.model == spec.model) {
                Some(product) => {
                    if product.name != spec.name || product.category_id != category_id {
                        product.name = spec.name.clone();
                        product.category_id = category_id;
                        summary.products_updated += 1;
                    }
                    product.id
                }
                None => {
                    let id = Uuid::new_v4();
                    state.products.push(Product {
                        id,
                        category_id,
                        name: spec.name.clone(),
                        model: spec.model.clone(),
                    });
                    summary.products_created += 1;
                    id
                }
            };

            let existing = state
                .offers
                .values_mut()
                .find(|o| o.shop_id == shop_id && o.product_id == product_id);
            match existing {
                Some(offer) => {
                    // Import is authoritative for these fields, incremental
                    // for parameters.
                    offer.external_id = spec.external_id;
                    offer.quantity = spec.quantity;
                    offer.price = spec.price;
                    offer.price_rrc = spec.price_rrc;
                    offer.merge_parameters(&spec.parameters);
                    summary.offers_updated += 1;
                }
                None => {
                    let offer = Offer {
                        id: Uuid::new_v4(),
                        shop_id,
                        product_id,
                        external_id: spec.external_id,
                        quantity: spec.quantity,
                        price: spec.price,
                        price_rrc: spec.price_rrc,
                        parameters: spec.parameters.clone(),
                    };
                    state.offers.insert(offer.id, offer);
                    summary.offers_created += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), ReserveError> {
        let mut state = self.inner.lock().await;

        // First pass: validate every line before touching anything.
        for line in lines {
            let offer = state
                .offers
                .get(&line.offer_id)
                .ok_or(ReserveError::OfferMissing(line.offer_id))?;
            if offer.quantity < line.quantity {
                return Err(ReserveError::InsufficientStock {
                    offer_id: line.offer_id,
                    available: offer.quantity,
                    requested: line.quantity,
                });
            }
        }

        for line in lines {
            if let Some(offer) = state.offers.get_mut(&line.offer_id) {
                offer.quantity -= line.quantity;
            }
        }

        Ok(())
    }

    async fn release_stock(&self, lines: &[StockLine]) -> Result<(), BoxError> {
        let mut state = self.inner.lock().await;
        for line in lines {
            if let Some(offer) = state.offers.get_mut(&line.offer_id) {
                offer.quantity += line.quantity;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn seeded_offer(catalog: &MemoryCatalog, quantity: i64) -> Uuid {
        let offer = Offer {
            id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            external_id: 1,
            quantity,
            price: 5000,
            price_rrc: 5990,
            parameters: Vec::new(),
        };
        let id = offer.id;
        catalog.insert_offer(offer).await;
        id
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let catalog = MemoryCatalog::new();
        let offer_id = seeded_offer(&catalog, 10).await;

        catalog
            .reserve_stock(&[StockLine { offer_id, quantity: 4 }])
            .await
            .unwrap();

        let offer = catalog.get_offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.quantity, 6);
    }

    #[tokio::test]
    async fn test_reserve_all_or_nothing() {
        let catalog = MemoryCatalog::new();
        let plenty = seeded_offer(&catalog, 10).await;
        let scarce = seeded_offer(&catalog, 3).await;

        let result = catalog
            .reserve_stock(&[
                StockLine { offer_id: plenty, quantity: 2 },
                StockLine { offer_id: scarce, quantity: 5 },
            ])
            .await;

        match result {
            Err(ReserveError::InsufficientStock { offer_id, available, requested }) => {
                assert_eq!(offer_id, scarce);
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }

        // The satisfiable line was not decremented either.
        let offer = catalog.get_offer(plenty).await.unwrap().unwrap();
        assert_eq!(offer.quantity, 10);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_overdraw() {
        let catalog = Arc::new(MemoryCatalog::new());
        let offer_id = seeded_offer(&catalog, 3).await;

        let a = {
            let catalog = catalog.clone();
            tokio::spawn(async move {
                catalog
                    .reserve_stock(&[StockLine { offer_id, quantity: 2 }])
                    .await
            })
        };
        let b = {
            let catalog = catalog.clone();
            tokio::spawn(async move {
                catalog
                    .reserve_stock(&[StockLine { offer_id, quantity: 2 }])
                    .await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let offer = catalog.get_offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.quantity, 1);
    }

    #[tokio::test]
    async fn test_release_restores_reserved_quantity() {
        let catalog = MemoryCatalog::new();
        let offer_id = seeded_offer(&catalog, 10).await;
        let lines = [StockLine { offer_id, quantity: 4 }];

        catalog.reserve_stock(&lines).await.unwrap();
        catalog.release_stock(&lines).await.unwrap();

        let offer = catalog.get_offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.quantity, 10);
    }

    #[tokio::test]
    async fn test_concurrent_imports_of_one_shop_converge() {
        use crate::feed::{ImportBatch, OfferSpec};

        let catalog = Arc::new(MemoryCatalog::new());
        let shop_id = Uuid::new_v4();
        let batch = |quantity: i64, price: i64| ImportBatch {
            shop_name: "TechnoTrade".to_string(),
            categories: vec!["Storage".to_string()],
            offers: vec![OfferSpec {
                external_id: 1,
                model: "ssd-1tb".to_string(),
                name: "Vertex SSD 1TB".to_string(),
                category: "Storage".to_string(),
                price,
                price_rrc: price,
                quantity,
                parameters: Vec::new(),
            }],
        };

        let a = {
            let catalog = catalog.clone();
            let batch = batch(10, 5000);
            tokio::spawn(async move { catalog.apply_import(shop_id, batch).await })
        };
        let b = {
            let catalog = catalog.clone();
            let batch = batch(7, 5200);
            tokio::spawn(async move { catalog.apply_import(shop_id, batch).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Whole feeds serialize; the catalog holds exactly one of the two,
        // never a mix.
        let offers = catalog.offers_for_shop(shop_id).await.unwrap();
        assert_eq!(offers.len(), 1);
        let committed = (offers[0].quantity, offers[0].price);
        assert!(committed == (10, 5000) || committed == (7, 5200));
    }
}
