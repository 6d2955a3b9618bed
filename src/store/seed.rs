use crate::store::{AccountRow, BondRow, CardDeckRow, ResponseCodeRow};

/// Seed rows for an in-memory store instance.
#[derive(Debug, Clone, Default)]
pub struct StoreSeed {
    pub response_codes: Vec<ResponseCodeRow>,
    pub card_decks: Vec<CardDeckRow>,
    pub bonds: Vec<BondRow>,
    pub accounts: Vec<AccountRow>,
}

fn code(id: i64, key: &str, message: &str) -> ResponseCodeRow {
    ResponseCodeRow {
        id,
        response_key: key.to_owned(),
        message: message.to_owned(),
    }
}

fn deck(
    id: i32,
    name: &str,
    cards_num: u32,
    damage: f64,
    upgrade_target: Option<&str>,
    level: u8,
) -> CardDeckRow {
    CardDeckRow {
        id,
        name: name.to_owned(),
        cards_num,
        damage,
        upgrade_target: upgrade_target.map(str::to_owned),
        level,
    }
}

fn bond(id: i32, name: &str, level: u8, damage: f64, skill: &str, names: &[&str]) -> BondRow {
    BondRow {
        id,
        name: name.to_owned(),
        level,
        damage,
        skill: skill.to_owned(),
        description: format!("{name}: {skill}"),
        card_names: names.iter().map(|n| (*n).to_owned()).collect(),
    }
}

/// The default catalog: every response id the protocol emits, a small card
/// set spanning the three levels, and a handful of bonds.
pub fn default_seed() -> StoreSeed {
    StoreSeed {
        response_codes: vec![
            code(1001, "welcome", "Welcome to the duel server"),
            code(1101, "game_over", "Game over"),
            code(2001, "login_success", "Login successful"),
            code(2002, "login_decode_error", "Malformed login payload"),
            code(2003, "login_missing_fields", "Username and password are required"),
            code(2004, "login_backend_error", "Account lookup failed"),
            code(2005, "login_invalid", "Invalid username or password"),
            code(3001, "register_success", "Account created"),
            code(3002, "register_decode_error", "Malformed register payload"),
            code(3003, "register_missing_fields", "Username and password are required"),
            code(3004, "register_exists", "Account already exists"),
            code(3005, "register_failed", "Account creation failed"),
            code(4001, "ready_success", "Ready for matchmaking"),
            code(4002, "not_logged_in", "Not logged in"),
            code(4003, "session_missing", "Session not found"),
            code(5001, "game_start", "Game started"),
            code(5002, "bond_catalog", "Bond catalog"),
            code(5005, "play_rejected", "Play rejected"),
            code(5009, "play_empty", "No cards in play request"),
            code(6001, "reconnect_success", "Reconnected to game"),
            code(6002, "reconnect_failed", "Reconnection failed"),
            code(7001, "peer_offline", "Opponent went offline"),
            code(7002, "peer_reconnected", "Opponent reconnected"),
            code(8001, "state_update", "Game state update"),
            code(9001, "compose_update", "Compose state update"),
            code(9002, "compose_rejected", "Compose rejected"),
            code(9999, "unknown_command", "Unknown command"),
        ],
        card_decks: vec![
            deck(1, "Knight", 14, 1.0, Some("Knight Captain"), 1),
            deck(2, "Archer", 14, 1.0, Some("Longbowman"), 1),
            deck(3, "Mage", 10, 2.0, Some("Archmage"), 1),
            deck(4, "Footman", 12, 1.5, None, 1),
            deck(5, "Knight Captain", 8, 4.0, Some("Paladin"), 2),
            deck(6, "Longbowman", 8, 4.0, None, 2),
            deck(7, "Archmage", 6, 5.0, None, 2),
            deck(8, "Paladin", 4, 9.0, None, 3),
        ],
        bonds: vec![
            bond(
                1,
                "Shield Wall",
                1,
                12.0,
                "The line holds",
                &["Knight", "Knight", "Archer"],
            ),
            bond(2, "Arcane Volley", 1, 9.0, "Enchanted arrows", &["Mage", "Archer"]),
            bond(
                3,
                "Vanguard",
                2,
                20.0,
                "Front-line charge",
                &["Knight Captain", "Footman", "Footman"],
            ),
            bond(
                4,
                "Crusade",
                3,
                34.0,
                "Holy onslaught",
                &["Paladin", "Knight Captain"],
            ),
        ],
        accounts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_covers_every_protocol_code() {
        use crate::protocol::codes;
        let seed = default_seed();
        let ids: std::collections::HashSet<i64> =
            seed.response_codes.iter().map(|r| r.id).collect();
        for required in [
            codes::WELCOME,
            codes::GAME_OVER,
            codes::LOGIN_OK,
            codes::LOGIN_DECODE,
            codes::LOGIN_MISSING_FIELDS,
            codes::LOGIN_BACKEND,
            codes::LOGIN_INVALID,
            codes::REGISTER_OK,
            codes::REGISTER_DECODE,
            codes::REGISTER_MISSING_FIELDS,
            codes::REGISTER_EXISTS,
            codes::REGISTER_FAILED,
            codes::READY_OK,
            codes::NOT_LOGGED_IN,
            codes::SESSION_MISSING,
            codes::GAME_START,
            codes::BOND_CATALOG,
            codes::PLAY_REJECTED,
            codes::PLAY_EMPTY,
            codes::RECONNECT_OK,
            codes::RECONNECT_FAILED,
            codes::PEER_OFFLINE,
            codes::PEER_RECONNECTED,
            codes::PLAY_BROADCAST,
            codes::COMPOSE_BROADCAST,
            codes::COMPOSE_REJECTED,
            codes::UNKNOWN_COMMAND,
        ] {
            assert!(ids.contains(&required), "missing response id {required}");
        }
    }

    #[test]
    fn bonds_stay_within_seven_slots() {
        for bond in default_seed().bonds {
            assert!((1..=7).contains(&bond.card_names.len()));
        }
    }

    #[test]
    fn upgrade_targets_reference_known_decks() {
        let seed = default_seed();
        let names: std::collections::HashSet<&str> =
            seed.card_decks.iter().map(|d| d.name.as_str()).collect();
        for deck in &seed.card_decks {
            if let Some(target) = &deck.upgrade_target {
                assert!(names.contains(target.as_str()), "dangling target {target}");
            }
        }
    }
}
