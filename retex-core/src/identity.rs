use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::BoxError;

/// Account kind the identity layer resolved for the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Shop,
}

/// An authenticated caller as handed over by the session layer. The core
/// trusts this identity and never re-validates credentials; it only checks
/// that the role fits the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn buyer(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Buyer }
    }

    pub fn shop(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Shop }
    }

    pub fn is_buyer(&self) -> bool {
        self.role == Role::Buyer
    }

    pub fn is_shop(&self) -> bool {
        self.role == Role::Shop
    }
}

/// Resolves a session token into a principal. Implemented by the excluded
/// auth layer; the core only consumes the result.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Principal, BoxError>;
}

/// Token-table resolver for tests and local runs.
pub struct MockIdentityProvider {
    principals: HashMap<String, Principal>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self { principals: HashMap::new() }
    }

    pub fn register(&mut self, token: &str, principal: Principal) {
        self.principals.insert(token.to_string(), principal);
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Principal, BoxError> {
        self.principals
            .get(token)
            .cloned()
            .ok_or_else(|| format!("unknown token: {}", token).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_token_resolution() {
        let mut provider = MockIdentityProvider::new();
        let buyer_id = Uuid::new_v4();
        provider.register("t-1", Principal::buyer(buyer_id));

        let principal = provider.authenticate("t-1").await.unwrap();
        assert_eq!(principal.user_id, buyer_id);
        assert!(principal.is_buyer());

        assert!(provider.authenticate("t-2").await.is_err());
    }
}
