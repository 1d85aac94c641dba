use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use retex_core::BoxError;

use crate::feed::ImportBatch;
use crate::importer::ImportSummary;
use crate::models::{Offer, OfferDetail, Shop, StockLine};

/// Why a stock reservation was refused. `reserve_stock` is the
/// serialization point of checkout, so the refusal carries enough detail
/// for the caller to report it without another read.
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("offer {0} no longer exists")]
    OfferMissing(Uuid),

    #[error("insufficient stock for offer {offer_id}: available {available}, requested {requested}")]
    InsufficientStock { offer_id: Uuid, available: i64, requested: i64 },

    #[error("storage error: {0}")]
    Storage(BoxError),
}

/// Durable catalog access. Implementations guard every multi-row
/// operation transactionally; callers never see a partially applied
/// import or reservation.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_shop(&self, id: Uuid) -> Result<Option<Shop>, BoxError>;

    /// Toggle a shop's order intake.
    async fn set_shop_state(&self, id: Uuid, accepting: bool) -> Result<(), BoxError>;

    async fn get_offer(&self, id: Uuid) -> Result<Option<Offer>, BoxError>;

    /// Offer joined with product and shop, as checkout and basket views
    /// consume it.
    async fn get_offer_detail(&self, id: Uuid) -> Result<Option<OfferDetail>, BoxError>;

    async fn offers_for_shop(&self, shop_id: Uuid) -> Result<Vec<Offer>, BoxError>;

    /// Apply one validated feed atomically: either every upsert commits or
    /// the catalog is left unchanged.
    async fn apply_import(
        &self,
        shop_id: Uuid,
        batch: ImportBatch,
    ) -> Result<ImportSummary, BoxError>;

    /// Check-then-decrement for the whole line set as one atomic unit.
    /// Two concurrent reservations over the same offer can never both
    /// observe sufficient stock; quantity never goes negative.
    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), ReserveError>;

    /// Put a reservation back. Checkout calls this to compensate when a
    /// step after `reserve_stock` fails; lines whose offer has vanished
    /// in between are skipped.
    async fn release_stock(&self, lines: &[StockLine]) -> Result<(), BoxError>;
}
