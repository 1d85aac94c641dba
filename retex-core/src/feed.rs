use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// The fetch collaborator failed to deliver the document. The importer
/// surfaces this as `UnreachableSource` to the caller.
#[derive(Debug, Error)]
#[error("feed source unreachable: {0}")]
pub struct FeedSourceError(pub String);

/// Delivers the raw catalog feed document for a shop. The HTTP fetch
/// itself belongs to the excluded boundary layer; implementations here
/// only hand the bytes over.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FeedSourceError>;
}

/// Canned-document source for tests and local runs.
pub struct StaticFeedSource {
    documents: HashMap<String, String>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self { documents: HashMap::new() }
    }

    pub fn with_document(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }
}

impl Default for StaticFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, url: &str) -> Result<String, FeedSourceError> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FeedSourceError(format!("no document at {}", url)))
    }
}
