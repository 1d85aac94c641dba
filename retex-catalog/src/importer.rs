use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use retex_core::identity::Principal;
use retex_core::{BoxError, FeedSource};

use crate::feed::Feed;
use crate::repository::CatalogRepository;

/// Import failures. Each aborts the whole operation; the catalog is never
/// left partially updated.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("feed source unreachable: {0}")]
    UnreachableSource(String),

    #[error("feed validation failed: {0}")]
    ValidationFailed(String),

    #[error("catalog import is a shop operation")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(BoxError),
}

/// What one feed application did to the catalog.
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories_created: u32,
    pub products_created: u32,
    pub products_updated: u32,
    pub offers_created: u32,
    pub offers_updated: u32,
}

const DEFAULT_MAX_FEED_BYTES: usize = 8 * 1024 * 1024;

/// Merges externally supplied feeds into a shop's catalog. Parsing and
/// validation happen up front; the repository applies the validated batch
/// in one transaction.
pub struct CatalogImporter {
    catalog: Arc<dyn CatalogRepository>,
    source: Arc<dyn FeedSource>,
    max_feed_bytes: usize,
}

impl CatalogImporter {
    pub fn new(catalog: Arc<dyn CatalogRepository>, source: Arc<dyn FeedSource>) -> Self {
        Self { catalog, source, max_feed_bytes: DEFAULT_MAX_FEED_BYTES }
    }

    /// Cap on the raw document size, checked before parsing.
    pub fn with_max_feed_bytes(mut self, limit: usize) -> Self {
        self.max_feed_bytes = limit;
        self
    }

    /// Fetch the feed document through the source collaborator, then
    /// import it. Fetch failures surface as `UnreachableSource`.
    pub async fn import_from_url(
        &self,
        caller: &Principal,
        shop_id: Uuid,
        url: &str,
    ) -> Result<ImportSummary, ImportError> {
        if !caller.is_shop() {
            return Err(ImportError::Forbidden);
        }
        let raw = self
            .source
            .fetch(url)
            .await
            .map_err(|e| ImportError::UnreachableSource(e.to_string()))?;
        self.import(caller, shop_id, &raw).await
    }

    /// Import a raw feed document into the shop's catalog.
    pub async fn import(
        &self,
        caller: &Principal,
        shop_id: Uuid,
        raw: &str,
    ) -> Result<ImportSummary, ImportError> {
        if !caller.is_shop() {
            return Err(ImportError::Forbidden);
        }
        if raw.len() > self.max_feed_bytes {
            return Err(ImportError::ValidationFailed(format!(
                "feed is {} bytes, limit is {}",
                raw.len(),
                self.max_feed_bytes
            )));
        }

        let batch = Feed::parse(raw)?.into_batch()?;
        let summary = self
            .catalog
            .apply_import(shop_id, batch)
            .await
            .map_err(ImportError::Storage)?;

        info!(
            %shop_id,
            categories_created = summary.categories_created,
            products_created = summary.products_created,
            products_updated = summary.products_updated,
            offers_created = summary.offers_created,
            offers_updated = summary.offers_updated,
            "catalog feed applied"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;
    use crate::models::ParameterValue;
    use retex_core::feed::StaticFeedSource;

    const FEED_V1: &str = r#"
shop: TechnoTrade
categories:
  - id: 224
    name: Storage
goods:
  - id: 4216292
    category: 224
    model: ssd-1tb
    name: Vertex SSD 1TB
    price: 5000
    price_rrc: 5990
    quantity: 10
    parameters:
      form_factor: "2.5"
      warranty_months: 36
"#;

    const FEED_V2: &str = r#"
shop: TechnoTrade
categories:
  - id: 224
    name: Storage
goods:
  - id: 4216292
    category: 224
    model: ssd-1tb
    name: Vertex SSD 1TB
    price: 5200
    price_rrc: 5990
    quantity: 7
    parameters:
      color: black
"#;

    fn importer(catalog: Arc<MemoryCatalog>) -> CatalogImporter {
        CatalogImporter::new(catalog, Arc::new(StaticFeedSource::new()))
    }

    #[tokio::test]
    async fn test_first_import_creates_catalog_rows() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        let summary = importer.import(&caller, shop_id, FEED_V1).await.unwrap();

        assert_eq!(summary.categories_created, 1);
        assert_eq!(summary.products_created, 1);
        assert_eq!(summary.offers_created, 1);
        assert_eq!(summary.offers_updated, 0);

        let offers = catalog.offers_for_shop(shop_id).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].quantity, 10);
        assert_eq!(offers[0].price, 5000);
    }

    #[tokio::test]
    async fn test_reimport_replaces_quantity_not_adds() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        importer.import(&caller, shop_id, FEED_V1).await.unwrap();
        let summary = importer.import(&caller, shop_id, FEED_V2).await.unwrap();

        assert_eq!(summary.categories_created, 0);
        assert_eq!(summary.products_created, 0);
        assert_eq!(summary.offers_created, 0);
        assert_eq!(summary.offers_updated, 1);

        let offers = catalog.offers_for_shop(shop_id).await.unwrap();
        assert_eq!(offers.len(), 1);
        // Replaced, not accumulated.
        assert_eq!(offers[0].quantity, 7);
        assert_eq!(offers[0].price, 5200);
    }

    #[tokio::test]
    async fn test_reimport_merges_parameters() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        importer.import(&caller, shop_id, FEED_V1).await.unwrap();
        importer.import(&caller, shop_id, FEED_V2).await.unwrap();

        let offers = catalog.offers_for_shop(shop_id).await.unwrap();
        // Parameters absent from the second feed are preserved, new ones
        // are appended.
        assert_eq!(
            offers[0].parameters,
            vec![
                ParameterValue::new("form_factor", "2.5"),
                ParameterValue::new("warranty_months", "36"),
                ParameterValue::new("color", "black"),
            ]
        );
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        importer.import(&caller, shop_id, FEED_V1).await.unwrap();
        let first = catalog.offers_for_shop(shop_id).await.unwrap();

        let summary = importer.import(&caller, shop_id, FEED_V1).await.unwrap();
        let second = catalog.offers_for_shop(shop_id).await.unwrap();

        assert_eq!(summary.products_created, 0);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].quantity, second[0].quantity);
        assert_eq!(first[0].parameters, second[0].parameters);
    }

    #[tokio::test]
    async fn test_shared_product_across_shops() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let caller = Principal::shop(Uuid::new_v4());
        let shop_a = Uuid::new_v4();
        let shop_b = Uuid::new_v4();

        importer.import(&caller, shop_a, FEED_V1).await.unwrap();
        let summary = importer.import(&caller, shop_b, FEED_V1).await.unwrap();

        // Same model: the product is reused, only the offer is new.
        assert_eq!(summary.products_created, 0);
        assert_eq!(summary.offers_created, 1);

        let offers_a = catalog.offers_for_shop(shop_a).await.unwrap();
        let offers_b = catalog.offers_for_shop(shop_b).await.unwrap();
        assert_eq!(offers_a[0].product_id, offers_b[0].product_id);
        assert_ne!(offers_a[0].id, offers_b[0].id);
    }

    #[tokio::test]
    async fn test_invalid_feed_leaves_catalog_unchanged() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        importer.import(&caller, shop_id, FEED_V1).await.unwrap();

        let bad = FEED_V2.replace("quantity: 7", "quantity: -7");
        let result = importer.import(&caller, shop_id, &bad).await;
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));

        let offers = catalog.offers_for_shop(shop_id).await.unwrap();
        assert_eq!(offers[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_duplicate_category_ids_touch_nothing() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone());
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        let bad = FEED_V1.replace(
            "  - id: 224\n    name: Storage",
            "  - id: 224\n    name: Storage\n  - id: 224\n    name: Peripherals",
        );
        let result = importer.import(&caller, shop_id, &bad).await;
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));

        // Validation precedes application; not even the shop row exists.
        assert!(catalog.get_shop(shop_id).await.unwrap().is_none());
        assert!(catalog.offers_for_shop(shop_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_feed_is_rejected() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog.clone()).with_max_feed_bytes(64);
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        let result = importer.import(&caller, shop_id, FEED_V1).await;
        assert!(matches!(result, Err(ImportError::ValidationFailed(_))));
        assert!(catalog.get_shop(shop_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = CatalogImporter::new(catalog, Arc::new(StaticFeedSource::new()));
        let caller = Principal::shop(Uuid::new_v4());

        let result = importer
            .import_from_url(&caller, Uuid::new_v4(), "https://feeds.example/none.yaml")
            .await;
        assert!(matches!(result, Err(ImportError::UnreachableSource(_))));
    }

    #[tokio::test]
    async fn test_buyer_cannot_import() {
        let catalog = Arc::new(MemoryCatalog::new());
        let importer = importer(catalog);
        let caller = Principal::buyer(Uuid::new_v4());

        let result = importer.import(&caller, Uuid::new_v4(), FEED_V1).await;
        assert!(matches!(result, Err(ImportError::Forbidden)));
    }

    #[tokio::test]
    async fn test_import_from_static_source() {
        let catalog = Arc::new(MemoryCatalog::new());
        let source =
            StaticFeedSource::new().with_document("https://feeds.example/techno.yaml", FEED_V1);
        let importer = CatalogImporter::new(catalog.clone(), Arc::new(source));
        let shop_id = Uuid::new_v4();
        let caller = Principal::shop(Uuid::new_v4());

        let summary = importer
            .import_from_url(&caller, shop_id, "https://feeds.example/techno.yaml")
            .await
            .unwrap();
        assert_eq!(summary.offers_created, 1);

        let shop = catalog.get_shop(shop_id).await.unwrap().unwrap();
        assert_eq!(shop.name, "TechnoTrade");
    }
}
