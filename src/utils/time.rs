//! Serde adapter storing an `OffsetDateTime` as unix milliseconds.
//!
//! History files carry creation times as integer milliseconds since the
//! epoch.  Sub-millisecond precision is dropped on the way out.

use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;

/// Deserialize unix milliseconds into an OffsetDateTime.
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = i64::deserialize(deserializer)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime as unix milliseconds.
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let millis = i64::try_from(datetime.unix_timestamp_nanos() / 1_000_000)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_i64(millis)
}

/// Current time truncated to whole milliseconds, so a value survives a
/// serialize/deserialize cycle unchanged.
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use time::macros::datetime;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "crate::utils::time")]
        at: OffsetDateTime,
    }

    #[test]
    fn writes_unix_millis() {
        let stamped = Stamped {
            at: datetime!(2024-01-02 03:04:05.678 UTC),
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert_eq!(json, r#"{"at":1704164645678}"#);
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stamped);
    }

    #[test]
    fn now_has_millisecond_precision() {
        assert_eq!(now_millis().nanosecond() % 1_000_000, 0);
    }
}
