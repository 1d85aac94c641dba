pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod order_repo;

pub use app_config::Config;
pub use catalog_repo::PgCatalog;
pub use database::DbClient;
pub use events::{EventProducer, KafkaDispatcher};
pub use order_repo::PgOrders;
