#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Instant formatting shared by the cache, the summaries and the CSV export.

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};

/// Format used for every instant written to disk.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Human-facing format used in summaries and exports.
pub const FRIENDLY_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Formats an instant as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.format(ISO_FORMAT).to_string()
}

/// Parses an ISO8601 instant. Accepts the `Z` form written by this crate as
/// well as explicit offsets (`+00:00`), which older result files contain.
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Formats an instant in the given zone, e.g. `2024-01-05 03:07 PM`.
pub fn friendly_datetime<Tz: TimeZone>(dt: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.with_timezone(tz).format(FRIENDLY_FORMAT).to_string()
}

/// Formats an instant in the machine's local zone.
pub fn friendly_local_datetime(dt: &DateTime<Utc>) -> String {
    friendly_datetime(dt, &Local)
}

/// Renders a positive duration as `"<days> day + H:MM"`; the day part is left
/// out when it is zero.
pub fn friendly_timedelta(delta: TimeDelta) -> String {
    let total = delta.num_seconds().max(0);
    let days = total / 86_400;
    let secs = total % 86_400;
    let hours = secs / 3_600;
    let mins = (secs % 3_600) / 60;

    if days > 0 {
        format!("{days} day + {hours}:{mins:02}")
    } else {
        format!("{hours}:{mins:02}")
    }
}

/// Returns how late `commit` was relative to `deadline`, or `None` when it was
/// on time. Equal instants are on time.
pub fn lateness(commit: &DateTime<Utc>, deadline: &DateTime<Utc>) -> Option<String> {
    let delta = *commit - *deadline;
    (delta > TimeDelta::zero()).then(|| friendly_timedelta(delta))
}

/// Serde codec writing instants as `YYYY-MM-DDTHH:MM:SSZ`.
pub mod iso {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serializes with second precision and a `Z` suffix.
    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_iso(dt))
    }

    /// Deserializes any RFC 3339 instant.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_iso(&raw)
            .ok_or_else(|| de::Error::custom(format!("`{raw}` is not an ISO8601 instant")))
    }

    /// Same codec for optional instants.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de};

        /// Serializes `Some` with the outer codec, `None` as null.
        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        /// Deserializes null or an RFC 3339 instant.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::super::parse_iso(&raw).map(Some).ok_or_else(|| {
                    de::Error::custom(format!("`{raw}` is not an ISO8601 instant"))
                }),
                None => Ok(None),
            }
        }
    }
}
