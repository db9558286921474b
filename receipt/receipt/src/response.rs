use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Keys copied from the acknowledgment response.
pub const ACK_RESULT_KEYS: [&str; 10] = [
    "post_id",
    "category",
    "message",
    "team_id",
    "channel_id",
    "channel_name",
    "type",
    "sender_id",
    "sender_name",
    "version",
];

/// Notification details returned by the server for a delivered acknowledgment.
///
/// Only keys of [`ACK_RESULT_KEYS`] found in the response are present.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AckResult(BTreeMap<&'static str, String>);

impl AckResult {
    /// Picks the allowed keys out of a response object.
    pub fn from_response(response: &Map<String, Value>) -> Self {
        let fields = ACK_RESULT_KEYS
            .iter()
            .filter_map(|&key| {
                let value = match response.get(key)? {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                };
                Some((key, value))
            })
            .collect();
        Self(fields)
    }

    /// Value of `key`, if the server returned it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when the server returned none of the allowed keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
