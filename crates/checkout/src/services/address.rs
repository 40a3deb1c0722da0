//! Address book trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub name: String,
    pub line1: String,
    pub city: String,
    pub pincode: String,
}

impl Address {
    /// Creates an address owned by `user_id`.
    pub fn new(user_id: UserId, name: impl Into<String>, line1: impl Into<String>) -> Self {
        Self {
            id: AddressId::new(),
            user_id,
            name: name.into(),
            line1: line1.into(),
            city: String::new(),
            pincode: String::new(),
        }
    }
}

/// Lookup of saved addresses.
#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn get_address(&self, address_id: AddressId) -> Result<Option<Address>>;
}

/// In-memory address book for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressBook {
    addresses: Arc<RwLock<HashMap<AddressId, Address>>>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an address and returns its id.
    pub fn add_address(&self, address: Address) -> AddressId {
        let id = address.id;
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, address);
        id
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn get_address(&self, address_id: AddressId) -> Result<Option<Address>> {
        let addresses = self.addresses.read().unwrap_or_else(PoisonError::into_inner);
        Ok(addresses.get(&address_id).cloned())
    }
}
