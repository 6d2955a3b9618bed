use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque card-instance identifier. Unique for the lifetime of the process;
/// clients must not parse it.
pub type CardUid = String;

static CARD_UID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A card instance as it lives in a room pool or a player's hand.
///
/// Template identity is the catalog `id`; instance identity is `uid`.
/// Field casing on the wire follows the established client protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "UID")]
    pub uid: CardUid,
    #[serde(rename = "ID")]
    pub id: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Damage")]
    pub damage: f64,
    /// Name of the card this one composes into; `None` means not composable.
    #[serde(rename = "TargetName")]
    pub upgrade_target: Option<String>,
    #[serde(rename = "Level")]
    pub level: u8,
}

impl Card {
    /// Mint a fresh instance with a process-unique UID.
    pub fn mint(
        id: i32,
        name: impl Into<String>,
        damage: f64,
        upgrade_target: Option<String>,
        level: u8,
    ) -> Self {
        let counter = CARD_UID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        Self {
            uid: format!("card_{id}_{counter}"),
            id,
            name: name.into(),
            damage,
            upgrade_target,
            level,
        }
    }

    /// Whether the 3→1 compose rule applies to this card.
    pub fn is_composable(&self) -> bool {
        self.upgrade_target
            .as_deref()
            .is_some_and(|target| !target.is_empty())
    }

    /// Same catalog template (instance identity is the UID, not this).
    pub fn same_template(&self, other: &Card) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (uid {}, dmg {}, level {})",
            self.name, self.uid, self.damage, self.level
        )
    }
}
