use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SystemSetting {
    pub key: String,
    pub value_json: String,
}

impl SystemSetting {
    /// Key under which the persisted watch overrides live.
    pub const WATCH_SETTINGS: &'static str = "watch";

    pub fn new<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            key: key.into(),
            value_json: serde_json::to_string(value)?,
        })
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.value_json)
    }
}
