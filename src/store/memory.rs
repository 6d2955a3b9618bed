use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::{
    AccountRow, BondRow, CardDeckRow, DuelStore, ResponseCodeRow, StoreError, StoreSeed,
};

/// In-memory store. Catalog tables are immutable after construction;
/// accounts mutate under a plain mutex (the auth path is low-rate).
pub struct MemoryStore {
    response_codes: Vec<ResponseCodeRow>,
    card_decks: Vec<CardDeckRow>,
    bonds: Vec<BondRow>,
    accounts: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(seed: StoreSeed) -> Self {
        let accounts = seed
            .accounts
            .into_iter()
            .map(|row| (row.username, row.password))
            .collect();
        Self {
            response_codes: seed.response_codes,
            card_decks: seed.card_decks,
            bonds: seed.bonds,
            accounts: Mutex::new(accounts),
        }
    }

    pub fn with_default_seed() -> Self {
        Self::new(crate::store::default_seed())
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl DuelStore for MemoryStore {
    async fn load_response_codes(&self) -> Result<Vec<ResponseCodeRow>, StoreError> {
        Ok(self.response_codes.clone())
    }

    async fn load_card_decks(&self) -> Result<Vec<CardDeckRow>, StoreError> {
        Ok(self.card_decks.clone())
    }

    async fn load_bonds(&self) -> Result<Vec<BondRow>, StoreError> {
        Ok(self.bonds.clone())
    }

    async fn fetch_account(&self, username: &str) -> Result<Option<AccountRow>, StoreError> {
        Ok(self.accounts().get(username).map(|password| AccountRow {
            username: username.to_owned(),
            password: password.clone(),
        }))
    }

    async fn create_account(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts();
        if accounts.contains_key(username) {
            return Err(StoreError::AccountExists(username.to_owned()));
        }
        accounts.insert(username.to_owned(), password.to_owned());
        Ok(())
    }
}
