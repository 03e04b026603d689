//! Query-string friendly deserializers.
//!
//! Query parameters arrive as strings and an empty value (`?page=`) should
//! mean "not provided" rather than a parse error.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub fn deserialize_optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

pub fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.trim().parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("true") | Some("1") | Some("yes") => Ok(Some(true)),
        Some("false") | Some("0") | Some("no") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "deserialize_optional_uuid")]
        id: Option<Uuid>,
        #[serde(default, deserialize_with = "deserialize_optional_bool")]
        flag: Option<bool>,
    }

    #[test]
    fn test_empty_values_are_none() {
        let probe: Probe = serde_json::from_str(r#"{"id":"","flag":""}"#).unwrap();
        assert!(probe.id.is_none());
        assert!(probe.flag.is_none());
    }

    #[test]
    fn test_values_parse() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"id":"{}","flag":"1"}}"#, id);
        let probe: Probe = serde_json::from_str(&json).unwrap();
        assert_eq!(probe.id, Some(id));
        assert_eq!(probe.flag, Some(true));
    }

    #[test]
    fn test_bad_bool_rejected() {
        assert!(serde_json::from_str::<Probe>(r#"{"flag":"maybe"}"#).is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert!(probe.id.is_none());
        assert!(probe.flag.is_none());
    }
}
