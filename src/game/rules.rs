use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::game::{Bond, Card, CardUid};

/// One bond accepted by the greedy assignment, with the exact card instances
/// it consumed.
#[derive(Debug, Clone)]
pub struct FiredBond {
    pub bond: Bond,
    pub consumed_uids: Vec<CardUid>,
}

/// Result of resolving a play against the bond catalog.
#[derive(Debug, Clone)]
pub struct DamageOutcome {
    pub total_damage: f64,
    pub fired: Vec<FiredBond>,
    pub unused: Vec<Card>,
}

impl DamageOutcome {
    pub fn triggered_bonds(&self) -> Vec<Bond> {
        self.fired.iter().map(|f| f.bond.clone()).collect()
    }
}

/// Compute the damage of a play.
///
/// Candidates are every bond whose required name-multiset fits into the
/// played cards. They are walked in descending `damage`, ties broken by
/// ascending catalog id, and each is re-checked against the residual unused
/// multiset before it fires, so the accepted set is maximal: once the walk
/// finishes, no remaining bond can fire on the leftover cards. Each card
/// instance counts toward at most one bond; leftovers contribute their own
/// damage.
pub fn resolve_damage(played: &[Card], bonds: &[Bond]) -> DamageOutcome {
    if played.is_empty() {
        return DamageOutcome {
            total_damage: 0.0,
            fired: Vec::new(),
            unused: Vec::new(),
        };
    }

    let mut candidates: Vec<&Bond> = bonds
        .iter()
        .filter(|bond| !bond.card_names.is_empty() && fits(bond, played))
        .collect();
    candidates.sort_by(|a, b| {
        b.damage
            .partial_cmp(&a.damage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    // Residual instances per name, in original play order so instance
    // consumption is deterministic.
    let mut residual: HashMap<&str, VecDeque<&Card>> = HashMap::new();
    for card in played {
        residual.entry(card.name.as_str()).or_default().push_back(card);
    }

    let mut fired = Vec::new();
    let mut bond_damage = 0.0;
    for bond in candidates {
        if !fits_residual(bond, &residual) {
            continue;
        }
        let mut consumed = Vec::with_capacity(bond.card_names.len());
        for name in &bond.card_names {
            if let Some(card) = residual
                .get_mut(name.as_str())
                .and_then(VecDeque::pop_front)
            {
                consumed.push(card.uid.clone());
            }
        }
        bond_damage += bond.damage;
        fired.push(FiredBond {
            bond: bond.clone(),
            consumed_uids: consumed,
        });
    }

    let consumed: std::collections::HashSet<&str> = fired
        .iter()
        .flat_map(|f| f.consumed_uids.iter().map(String::as_str))
        .collect();
    let unused: Vec<Card> = played
        .iter()
        .filter(|c| !consumed.contains(c.uid.as_str()))
        .cloned()
        .collect();
    let base_damage: f64 = unused.iter().map(|c| c.damage).sum();

    DamageOutcome {
        total_damage: bond_damage + base_damage,
        fired,
        unused,
    }
}

fn fits(bond: &Bond, played: &[Card]) -> bool {
    let mut available: HashMap<&str, usize> = HashMap::new();
    for card in played {
        *available.entry(card.name.as_str()).or_default() += 1;
    }
    multiset_fits(bond, |name| available.get(name).copied().unwrap_or(0))
}

fn fits_residual(bond: &Bond, residual: &HashMap<&str, VecDeque<&Card>>) -> bool {
    multiset_fits(bond, |name| residual.get(name).map_or(0, VecDeque::len))
}

fn multiset_fits(bond: &Bond, available: impl Fn(&str) -> usize) -> bool {
    let mut required: HashMap<&str, usize> = HashMap::new();
    for name in &bond.card_names {
        *required.entry(name.as_str()).or_default() += 1;
    }
    required.iter().all(|(&name, &count)| available(name) >= count)
}

/// Group validated compose cards by name, in deterministic name order. Each
/// group of `g` cards yields `g / 3` compositions.
pub fn compose_groups(validated: Vec<Card>) -> BTreeMap<String, Vec<Card>> {
    let mut groups: BTreeMap<String, Vec<Card>> = BTreeMap::new();
    for card in validated {
        groups.entry(card.name.clone()).or_default().push(card);
    }
    groups
}
