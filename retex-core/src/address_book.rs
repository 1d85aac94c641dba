use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use retex_shared::Address;

use crate::BoxError;

/// Read side of the address collaborator. Address CRUD and default
/// enforcement live outside the core; checkout only resolves a reference
/// and checks ownership.
#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, BoxError>;

    /// The buyer's default address, if one is marked.
    async fn default_for(&self, buyer_id: Uuid) -> Result<Option<Address>, BoxError>;
}

/// In-memory address book for tests.
pub struct MemoryAddressBook {
    addresses: Mutex<HashMap<Uuid, Address>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self { addresses: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, address: Address) {
        self.addresses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.id, address);
    }
}

impl Default for MemoryAddressBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressBook for MemoryAddressBook {
    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, BoxError> {
        let addresses = self.addresses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(addresses.get(&id).cloned())
    }

    async fn default_for(&self, buyer_id: Uuid) -> Result<Option<Address>, BoxError> {
        let addresses = self.addresses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(addresses
            .values()
            .find(|a| a.buyer_id == buyer_id && a.is_default)
            .cloned())
    }
}
