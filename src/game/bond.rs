use serde::{Deserialize, Serialize};

/// A bond: a named multiset of card names that contributes a lump-sum damage
/// when every required name is present in a play.
///
/// The `level` wire field is lowercase for compatibility with deployed
/// clients; the remaining casing follows the card shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    #[serde(rename = "ID")]
    pub id: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "level")]
    pub level: u8,
    #[serde(rename = "CardNames")]
    pub card_names: Vec<String>,
    #[serde(rename = "Damage")]
    pub damage: f64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Skill")]
    pub skill: String,
}

impl Bond {
    /// Number of card instances this bond consumes when it fires.
    pub fn size(&self) -> usize {
        self.card_names.len()
    }
}
