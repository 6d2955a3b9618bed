use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::Card;

/// Inbound request envelope: `{"message": "<command>", "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// Outbound response envelope. `code` is the numeric id from the
/// response-code table; `data` is `null` on errors.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub code: i64,
    pub message: String,
    #[serde(rename = "responseKey")]
    pub response_key: String,
    pub data: Value,
}

/// Payload of `UserLogin` and `UserRegister`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Payload of `UserPlayCard`: the client echoes its game view and the server
/// trusts only the card identities, which are re-validated against the hand.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayCardRequest {
    #[serde(rename = "SelfCards", default)]
    pub self_cards: Vec<Card>,
}

/// Payload of `UserComposeCard`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeCardRequest {
    #[serde(rename = "Room_Id", default)]
    pub room_id: String,
    #[serde(rename = "SelfCards", default)]
    pub self_cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_tolerates_missing_data() {
        let env: Envelope = serde_json::from_str(r#"{"message":"UserReady"}"#).expect("decode");
        assert_eq!(env.message, "UserReady");
        assert!(env.data.is_null());
    }

    #[test]
    fn credentials_completeness() {
        let creds: Credentials =
            serde_json::from_str(r#"{"username":"alice","password":"pw"}"#).expect("decode");
        assert!(creds.is_complete());

        let partial: Credentials = serde_json::from_str(r#"{"username":"alice"}"#).expect("decode");
        assert!(!partial.is_complete());
    }

    #[test]
    fn play_request_reads_self_cards() {
        let raw = r#"{"Room_Id":"r","SelfCards":[
            {"UID":"card_1_1","ID":1,"Name":"Knight","Damage":1.0,"TargetName":null,"Level":1}
        ]}"#;
        let req: PlayCardRequest = serde_json::from_str(raw).expect("decode");
        assert_eq!(req.self_cards.len(), 1);
        assert_eq!(req.self_cards[0].name, "Knight");
    }

    #[test]
    fn response_uses_wire_key_casing() {
        let resp = Response {
            code: 2001,
            message: "ok".into(),
            response_key: "login_success".into(),
            data: Value::Null,
        };
        let value = serde_json::to_value(&resp).expect("serialize");
        assert!(value.get("responseKey").is_some());
        assert!(value.get("data").expect("data present").is_null());
    }
}
