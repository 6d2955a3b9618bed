//! Startup-loaded catalogs: card definitions, bonds, and response codes.
//! All lookups are read-only and concurrent after [`Catalogs::load`].

pub mod bonds;
pub mod cards;
pub mod responses;

pub use bonds::BondCatalog;
pub use cards::CardCatalog;
pub use responses::ResponseCatalog;

use crate::store::{DuelStore, StoreError};

pub struct Catalogs {
    pub cards: CardCatalog,
    pub bonds: BondCatalog,
    pub responses: ResponseCatalog,
}

impl Catalogs {
    /// Run the three startup queries and freeze the results.
    pub async fn load(store: &dyn DuelStore) -> Result<Self, StoreError> {
        let responses = ResponseCatalog::from_rows(store.load_response_codes().await?);
        let cards = CardCatalog::from_rows(store.load_card_decks().await?);
        let bonds = BondCatalog::from_rows(store.load_bonds().await?);
        tracing::info!(
            response_codes = responses.len(),
            card_decks = cards.decks().len(),
            bonds = bonds.len(),
            "Catalogs loaded"
        );
        Ok(Self {
            cards,
            bonds,
            responses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn load_populates_all_three_catalogs() {
        let store = MemoryStore::with_default_seed();
        let catalogs = Catalogs::load(&store).await.expect("load");
        assert!(!catalogs.responses.is_empty());
        assert!(!catalogs.bonds.is_empty());
        assert!(!catalogs.cards.decks().is_empty());
    }
}
