//! Deserializers for values posted from HTML forms, where an untouched
//! field arrives as `""` rather than being left out.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de::Error};
use serde_json::Value;

fn blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if blank(&value) {
        return Ok(None);
    }
    match value {
        Value::String(s) => s.trim().parse().map(Some).map_err(D::Error::custom),
        Value::Number(n) => n.to_string().parse().map(Some).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if blank(&value) {
        return Ok(None);
    }
    match value {
        Value::String(s) => s.trim().parse().map(Some).map_err(D::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected a positive id")),
        other => Err(D::Error::custom(format!("expected an id, got {}", other))),
    }
}

pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if blank(&value) {
        return Ok(None);
    }
    match value {
        // date inputs send YYYY-MM-DD; ISO timestamps keep only the date part
        Value::String(s) => {
            let s = s.trim();
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(Some)
                .map_err(D::Error::custom)
        }
        other => Err(D::Error::custom(format!("expected a date, got {}", other))),
    }
}
