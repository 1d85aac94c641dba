pub mod address_book;
pub mod feed;
pub mod identity;
pub mod notify;

pub use address_book::AddressBook;
pub use feed::FeedSource;
pub use identity::{Principal, Role};
pub use notify::NotificationDispatcher;

/// Error shape shared by all repository and collaborator traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
