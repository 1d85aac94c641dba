pub mod feed;
pub mod importer;
pub mod memory;
pub mod models;
pub mod repository;

pub use feed::{Feed, ImportBatch, OfferSpec};
pub use importer::{CatalogImporter, ImportError, ImportSummary};
pub use memory::MemoryCatalog;
pub use models::{
    merge_parameter_values, Category, Offer, OfferDetail, ParameterValue, Product, Shop, StockLine,
};
pub use repository::{CatalogRepository, ReserveError};
