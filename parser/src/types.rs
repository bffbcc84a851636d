use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-replay player slot identifier as reported by the replay container.
/// The telemetry emitter uses the same numbering for its slot index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(v: u32) -> Self {
        PlayerId(v)
    }
}

/// Team identifier. The container reports non-negative ids, but winner fields
/// use negative values to mean "no winner", so the raw type is signed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub i64);

impl TeamId {
    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TeamId {
    fn from(v: i64) -> Self {
        TeamId(v)
    }
}

impl From<u32> for TeamId {
    fn from(v: u32) -> Self {
        TeamId(v as i64)
    }
}

/// Lower-cases a name and strips everything that is not an ASCII letter or digit.
///
/// Player names go through several hands (battle.net, the map script, the
/// container decoder) and this is the common form used for fuzzy comparisons.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Integer parsing with the leniency of the telemetry emitter's consumers:
/// leading whitespace is skipped, an optional sign is accepted and parsing
/// stops at the first non-digit. `"12abc"` is 12, `"abc"` is `None`.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
