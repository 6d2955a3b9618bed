use std::collections::HashMap;

use serde_json::Value;

use crate::protocol::Response;
use crate::store::ResponseCodeRow;

/// The response-code table, loaded once at startup. Every outbound frame is
/// built through this catalog so code, key, and text stay authoritative.
pub struct ResponseCatalog {
    rows: HashMap<i64, ResponseCodeRow>,
}

impl ResponseCatalog {
    pub fn from_rows(rows: Vec<ResponseCodeRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.id, row)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Success frame carrying a payload.
    pub fn success(&self, id: i64, data: Value) -> Response {
        self.build(id, data)
    }

    /// Error frame; `data` is always null.
    pub fn error(&self, id: i64) -> Response {
        self.build(id, Value::Null)
    }

    fn build(&self, id: i64, data: Value) -> Response {
        match self.rows.get(&id) {
            Some(row) => Response {
                code: id,
                message: row.message.clone(),
                response_key: row.response_key.clone(),
                data,
            },
            None => {
                tracing::error!(id, "Response id missing from the loaded table");
                Response {
                    code: id,
                    message: "unknown response code".to_owned(),
                    response_key: "unknown".to_owned(),
                    data,
                }
            }
        }
    }
}
