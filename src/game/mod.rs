//! Game domain: cards, bonds, rooms, and the rule engine.

pub mod bond;
pub mod card;
pub mod room;
pub mod rooms;
pub mod rules;

pub use bond::Bond;
pub use card::{Card, CardUid};
pub use room::{Room, RoomError, RoomPlayer, RoomState, RoomStatus, TargetPolicy};
pub use rooms::RoomRegistry;
pub use rules::{compose_groups, resolve_damage, DamageOutcome, FiredBond};
