//! Read-through store abstraction.
//!
//! The relational backend holding credentials and the card/bond catalogs is
//! an external collaborator; the core consumes exactly the queries below.
//! The in-memory implementation backs the binary and every test.

pub mod memory;
pub mod seed;

pub use memory::MemoryStore;
pub use seed::{default_seed, StoreSeed};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account already exists: {0}")]
    AccountExists(String),
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// `ResponseInfo` row: numeric id → stable key and display text.
#[derive(Debug, Clone)]
pub struct ResponseCodeRow {
    pub id: i64,
    pub response_key: String,
    pub message: String,
}

/// `CardDeck` row. `cards_num` controls how many instances each room mints.
#[derive(Debug, Clone)]
pub struct CardDeckRow {
    pub id: i32,
    pub name: String,
    pub cards_num: u32,
    pub damage: f64,
    pub upgrade_target: Option<String>,
    pub level: u8,
}

/// `Bonds` row joined with its card-name slots (1..=7 names).
#[derive(Debug, Clone)]
pub struct BondRow {
    pub id: i32,
    pub name: String,
    pub level: u8,
    pub damage: f64,
    pub skill: String,
    pub description: String,
    pub card_names: Vec<String>,
}

/// `UserAccount` row.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub username: String,
    pub password: String,
}

/// The queries the core performs: three catalog loads at startup and the
/// two credential operations on the auth path.
#[async_trait]
pub trait DuelStore: Send + Sync {
    async fn load_response_codes(&self) -> Result<Vec<ResponseCodeRow>, StoreError>;

    async fn load_card_decks(&self) -> Result<Vec<CardDeckRow>, StoreError>;

    async fn load_bonds(&self) -> Result<Vec<BondRow>, StoreError>;

    async fn fetch_account(&self, username: &str) -> Result<Option<AccountRow>, StoreError>;

    /// Insert a new account; fails with [`StoreError::AccountExists`] on a
    /// username collision. Passwords are stored as the repository stores
    /// them; the core only compares equality.
    async fn create_account(&self, username: &str, password: &str) -> Result<(), StoreError>;
}
