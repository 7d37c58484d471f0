//! Raw update events as delivered by the feed

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Feed-native field value
///
/// The feed sends strings on the wire, but recorded tapes and other
/// transports may carry bare JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// True when the value carries no information (empty or blank text)
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// One update for one item
///
/// A field may be missing from the map, or present with a null value; both
/// mean "not present".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub item: String,
    #[serde(default)]
    pub fields: HashMap<String, Option<FieldValue>>,
}

impl ItemUpdate {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), Some(value.into()));
        self
    }

    pub fn with_null(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), None);
        self
    }

    /// Value of `name`, or `None` when missing, null or blank
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .get(name)
            .and_then(Option::as_ref)
            .filter(|v| !v.is_blank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_presence() {
        let update = ItemUpdate::new("CHART:X:TICK")
            .with_field("BID", "1.5")
            .with_field("OFR", "")
            .with_null("LTP");

        assert_eq!(update.value("BID"), Some(&FieldValue::Text("1.5".into())));
        assert_eq!(update.value("OFR"), None);
        assert_eq!(update.value("LTP"), None);
        assert_eq!(update.value("TTV"), None);
    }

    #[test]
    fn test_deserialize_mixed_values() {
        let update: ItemUpdate = serde_json::from_str(
            r#"{"item":"CHART:X:TICK","fields":{"BID":"1.5","OFR":1.6,"LTP":null}}"#,
        )
        .unwrap();

        assert_eq!(update.value("BID"), Some(&FieldValue::Text("1.5".into())));
        assert_eq!(update.value("OFR"), Some(&FieldValue::Number(1.6)));
        assert_eq!(update.value("LTP"), None);
        assert!(update.fields.contains_key("LTP"));
    }
}
