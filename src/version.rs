//! Migration version prefixes.
//!
//! A migration filename starts with a version prefix that decides its order:
//!
//! - **Counter**: three decimal digits, e.g. `001-init.sh`
//! - **Timestamp**: five lowercase base36 characters, e.g. `1f72f-init.sh`.
//!   The first three encode days since 2020-01-01 (UTC), the last two the
//!   10-minute slot of that day.
//!
//! Counters sort before timestamps, so a project that starts with counters
//! and later switches to timestamps keeps its history in order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Epoch for timestamp versions: 2020-01-01.
const EPOCH: (i32, u32, u32) = (2020, 1, 1);

/// Width of a counter prefix.
pub const COUNTER_WIDTH: usize = 3;

/// Width of a timestamp prefix (3 day chars + 2 slot chars).
pub const TIMESTAMP_WIDTH: usize = 5;

const DAY_WIDTH: usize = 3;
const SLOT_WIDTH: usize = 2;
const SLOT_MINUTES: u32 = 10;
const SLOTS_PER_DAY: u32 = 24 * 60 / SLOT_MINUTES;
const MAX_COUNTER: u32 = 999;
const MAX_DAYS: u32 = 36 * 36 * 36 - 1;

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Ordering token parsed from a migration filename prefix.
///
/// The derived `Ord` relies on variant order: every `Counter` sorts before
/// every `Timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    Counter(u32),
    Timestamp { days: u32, slot: u32 },
}

/// How `create` allocates the next version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    #[default]
    Timestamp,
    Counter,
}

impl Version {
    /// Parse a bare prefix (`"001"`, `"1f72f"`).
    ///
    /// Returns `None` for anything that is not exactly a counter or a
    /// timestamp prefix.
    pub fn parse(prefix: &str) -> Option<Self> {
        match prefix.len() {
            COUNTER_WIDTH if prefix.bytes().all(|b| b.is_ascii_digit()) => {
                prefix.parse().ok().map(Version::Counter)
            }
            TIMESTAMP_WIDTH if prefix.bytes().all(is_base36_lower) => {
                let days = decode_base36(&prefix[..DAY_WIDTH])?;
                let slot = decode_base36(&prefix[DAY_WIDTH..]).filter(|s| *s < SLOTS_PER_DAY)?;
                Some(Version::Timestamp { days, slot })
            }
            _ => None,
        }
    }

    /// Split a migration filename into its version and id.
    ///
    /// The id is the filename without its extension (`001-first` for
    /// `001-first.sh`). Returns `None` if the prefix is invalid or the name
    /// after the dash is empty.
    pub fn from_filename(filename: &str) -> Option<(Self, String)> {
        let (prefix, rest) = filename.split_once('-')?;
        let version = Version::parse(prefix)?;

        let id = match filename.rfind('.') {
            Some(pos) if pos > prefix.len() => &filename[..pos],
            _ => filename,
        };
        let name = &id[prefix.len() + 1..];
        if name.is_empty() || rest.starts_with('.') {
            return None;
        }
        Some((version, id.to_string()))
    }

    /// Version for the 10-minute slot containing `at`.
    ///
    /// Returns `None` for instants before the epoch or past the last
    /// representable day.
    pub fn timestamp_at(at: DateTime<Utc>) -> Option<Self> {
        let epoch = NaiveDate::from_ymd_opt(EPOCH.0, EPOCH.1, EPOCH.2)?;
        let days = (at.date_naive() - epoch).num_days();
        let days = u32::try_from(days).ok().filter(|d| *d <= MAX_DAYS)?;
        let slot = at.time().num_seconds_from_midnight() / 60 / SLOT_MINUTES;
        Some(Version::Timestamp { days, slot })
    }

    /// Version for the current UTC time.
    pub fn now() -> Option<Self> {
        Self::timestamp_at(Utc::now())
    }

    /// The next attainable version of the same kind, if any.
    pub fn next(&self) -> Option<Self> {
        match *self {
            Version::Counter(n) if n < MAX_COUNTER => Some(Version::Counter(n + 1)),
            Version::Counter(_) => None,
            Version::Timestamp { days, slot } if slot + 1 < SLOTS_PER_DAY => {
                Some(Version::Timestamp {
                    days,
                    slot: slot + 1,
                })
            }
            Version::Timestamp { days, .. } if days < MAX_DAYS => Some(Version::Timestamp {
                days: days + 1,
                slot: 0,
            }),
            Version::Timestamp { .. } => None,
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, Version::Counter(_))
    }

    /// Build a migration filename from this version, a sanitized name and
    /// an extension (with or without the leading dot).
    pub fn filename(&self, name: &str, extension: &str) -> String {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            format!("{}-{}", self, name)
        } else {
            format!("{}-{}.{}", self, name, extension)
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Counter(n) => write!(f, "{:0width$}", n, width = COUNTER_WIDTH),
            Version::Timestamp { days, slot } => write!(
                f,
                "{}{}",
                encode_base36(*days, DAY_WIDTH),
                encode_base36(*slot, SLOT_WIDTH)
            ),
        }
    }
}

impl FromStr for Version {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s.trim()).ok_or_else(|| MigrateError::InvalidVersion(s.to_string()))
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn is_base36_lower(b: u8) -> bool {
    b.is_ascii_digit() || b.is_ascii_lowercase()
}

/// Zero-padded lowercase base36. Values wider than `width` keep all digits.
fn encode_base36(mut n: u32, width: usize) -> String {
    let mut digits = Vec::with_capacity(width);
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

fn decode_base36(s: &str) -> Option<u32> {
    s.chars().try_fold(0u32, |acc, c| {
        let digit = c.to_digit(36)?;
        acc.checked_mul(36)?.checked_add(digit)
    })
}
