//! Token and service records as served by a remote cluster

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A token (service description) stored on one cluster.
///
/// Fields the engine reasons about are typed; every other field the remote
/// service returns is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Token {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Affinity hint: the cluster this token considers its primary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(
        rename = "last-update-time",
        default,
        skip_serializing_if = "Option::is_none",
        with = "update_time"
    )]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(rename = "last-update-user", default, skip_serializing_if = "Option::is_none")]
    pub last_update_user: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Token {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Set a field, routing well-known keys to their typed slots
    pub fn set_field(&mut self, key: &str, value: Value) {
        match key {
            "owner" => self.owner = value.as_str().map(str::to_string),
            "cluster" => self.cluster = value.as_str().map(str::to_string),
            "last-update-user" => self.last_update_user = value.as_str().map(str::to_string),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// Maintenance message, if the token is in maintenance mode
    pub fn maintenance_message(&self) -> Option<&str> {
        self.extra
            .get("maintenance")
            .and_then(|m| m.get("message"))
            .and_then(Value::as_str)
    }

    /// Whether this copy opted out of cross-cluster syncing
    pub fn sync_opt_out(&self) -> bool {
        match self
            .extra
            .get("metadata")
            .and_then(|m| m.get(SYNC_OPT_OUT_KEY))
        {
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// Metadata key marking a token copy as excluded from syncing
pub const SYNC_OPT_OUT_KEY: &str = "waiter-token-sync-opt-out";

/// A token together with the etag it was served with
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedToken {
    pub token: Token,
    pub etag: Option<String>,
}

/// A service running on a cluster on behalf of a token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    #[serde(rename = "service-id", default)]
    pub service_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    pub fn new(service_id: &str, status: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            status: Some(status.to_string()),
            extra: Map::new(),
        }
    }

    pub fn is_inactive(&self) -> bool {
        self.status.as_deref() == Some("Inactive")
    }
}

/// One row of a cluster's token listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenSummary {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(
        rename = "last-update-time",
        default,
        skip_serializing_if = "Option::is_none",
        with = "update_time"
    )]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `last-update-time` arrives either as epoch milliseconds or as RFC 3339 text
mod update_time {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(Raw::Millis(ms)) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
            Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
