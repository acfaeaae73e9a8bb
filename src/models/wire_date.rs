//! Translation between wire dates (`YYYY-MM-DD`) and local calendar dates.
//!
//! The server serializes its local dates as zero-padded ISO dates. Only the
//! canonical form is accepted on read, so a date read from the wire always
//! writes back to the exact same string.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serializer};
use thiserror::Error;

const WIRE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a YYYY-MM-DD date")]
pub struct WireDateError(pub String);

/// Parse a wire date into a local date.
pub fn to_local(wire: &str) -> Result<NaiveDate, WireDateError> {
    let date = NaiveDate::parse_from_str(wire, WIRE_FORMAT)
        .map_err(|_| WireDateError(wire.to_string()))?;
    // chrono accepts unpadded fields; those would not round-trip.
    if to_wire(date) != wire {
        return Err(WireDateError(wire.to_string()));
    }
    Ok(date)
}

/// Format a local date for the wire.
pub fn to_wire(date: NaiveDate) -> String {
    date.format(WIRE_FORMAT).to_string()
}

/// `#[serde(with = "wire_date")]` adapter for optional dates.
pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(date) => serializer.serialize_str(&to_wire(*date)),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| to_local(&raw).map_err(serde::de::Error::custom))
        .transpose()
}
