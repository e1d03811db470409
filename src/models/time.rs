use std::fmt;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TimeError;

/// A timestamp with an explicit UTC offset. This is the only time
/// representation calendar backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AbsoluteTime(DateTime<FixedOffset>);

impl AbsoluteTime {
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self(instant)
    }

    /// Parses an RFC 3339 string. The offset is required and honored.
    pub fn parse(value: &str) -> Result<Self, TimeError> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(Self)
            .map_err(|_| TimeError::InvalidTimeFormat(value.to_string()))
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    pub fn offset_seconds(&self) -> i32 {
        self.0.offset().local_minus_utc()
    }

    pub fn duration_until(&self, later: &AbsoluteTime) -> Duration {
        later.0.signed_duration_since(self.0)
    }
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for AbsoluteTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AbsoluteTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AbsoluteTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}
