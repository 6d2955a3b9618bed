use crate::game::Bond;
use crate::store::BondRow;

/// Bond definitions loaded at startup, id-ordered. Read-only thereafter.
pub struct BondCatalog {
    bonds: Vec<Bond>,
}

impl BondCatalog {
    pub fn from_rows(mut rows: Vec<BondRow>) -> Self {
        rows.sort_by_key(|row| row.id);
        let bonds = rows
            .into_iter()
            .map(|row| Bond {
                id: row.id,
                name: row.name,
                level: row.level,
                card_names: row.card_names,
                damage: row.damage,
                description: row.description,
                skill: row.skill,
            })
            .collect();
        Self { bonds }
    }

    pub fn all(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn get(&self, id: i32) -> Option<&Bond> {
        self.bonds.iter().find(|bond| bond.id == id)
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }
}
