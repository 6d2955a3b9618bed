use std::collections::HashMap;

use crate::game::Card;
use crate::store::CardDeckRow;

/// Card definitions loaded at startup. Immutable thereafter; rooms mint
/// their private pools from these definitions.
pub struct CardCatalog {
    decks: Vec<CardDeckRow>,
    by_name: HashMap<String, usize>,
}

impl CardCatalog {
    pub fn from_rows(decks: Vec<CardDeckRow>) -> Self {
        let by_name = decks
            .iter()
            .enumerate()
            .map(|(index, deck)| (deck.name.clone(), index))
            .collect();
        Self { decks, by_name }
    }

    pub fn decks(&self) -> &[CardDeckRow] {
        &self.decks
    }

    pub fn deck_by_name(&self, name: &str) -> Option<&CardDeckRow> {
        self.by_name.get(name).map(|&index| &self.decks[index])
    }

    /// Mint fresh per-room pools: `cards_num` instances per definition,
    /// each with a new server-unique UID, split by level.
    pub fn mint_pools(&self) -> (Vec<Card>, Vec<Card>, Vec<Card>) {
        let mut level1 = Vec::new();
        let mut level2 = Vec::new();
        let mut level3 = Vec::new();
        for deck in &self.decks {
            let pool = match deck.level {
                1 => &mut level1,
                2 => &mut level2,
                3 => &mut level3,
                other => {
                    tracing::warn!(card = %deck.name, level = other, "Skipping card with unknown level");
                    continue;
                }
            };
            for _ in 0..deck.cards_num {
                pool.push(Card::mint(
                    deck.id,
                    deck.name.clone(),
                    deck.damage,
                    deck.upgrade_target.clone(),
                    deck.level,
                ));
            }
        }
        (level1, level2, level3)
    }
}
