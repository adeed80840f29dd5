//! Shared serialization/deserialization utilities
//!
//! This module provides common serde helpers used across configuration
//! and request types.

/// Helper module for Duration serialization as seconds
///
/// This module serializes `std::time::Duration` as a u64 representing seconds,
/// which is more human-readable in TOML/JSON configuration files.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "hm_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Optional integer that may arrive as a JSON number or a numeric string
///
/// Web forms post `"8443"` as readily as `8443`; `null` and `""` both mean
/// "not given". Non-numeric strings are kept as an error value so the caller
/// can report a validation failure instead of a deserialization failure.
pub mod lenient_int {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    /// Parsed field: absent, a number, or unparseable input
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub enum Lenient {
        #[default]
        Absent,
        Value(i64),
        Invalid(String),
    }

    impl Lenient {
        /// Value if present, `Err` with the raw text if unparseable
        pub fn into_option(self) -> Result<Option<i64>, String> {
            match self {
                Lenient::Absent => Ok(None),
                Lenient::Value(v) => Ok(Some(v)),
                Lenient::Invalid(raw) => Err(raw),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Lenient, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(match raw {
            None => Lenient::Absent,
            Some(Raw::Number(n)) => Lenient::Value(n),
            Some(Raw::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Lenient::Absent
                } else {
                    match trimmed.parse::<i64>() {
                        Ok(n) => Lenient::Value(n),
                        Err(_) => Lenient::Invalid(s),
                    }
                }
            }
        })
    }
}
