//! Model of what the replay-container decoder hands to this crate.
//!
//! Decoding the binary `.w3g` container is somebody else's job. The types here
//! describe its output, which is also the JSON shape the decoder library dumps,
//! so fixtures and the CLI can feed the pipeline through [`JsonReplayDecoder`].

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::{PlayerId, TeamId};

/// Turns raw replay bytes into a [`DecodedReplay`].
pub trait ReplayDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedReplay, DecodeError>;
}

impl<D: ReplayDecoder + ?Sized> ReplayDecoder for &D {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedReplay, DecodeError> {
        (**self).decode(bytes)
    }
}

/// Decoder for replays that were already decoded and dumped as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReplayDecoder;

impl ReplayDecoder for JsonReplayDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedReplay, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodedReplay {
    pub players: Vec<ContainerPlayer>,
    /// Game length in milliseconds
    pub duration: u64,
    pub map: Option<MapReference>,
    pub creator: Option<String>,
    pub gamename: Option<String>,
    pub randomseed: Option<u64>,
    /// Primary winner field. Negative when the container could not tell.
    pub winning_team_id: Option<i64>,
    /// Alternate winner field some decoder versions populate instead.
    pub winner_team_id: Option<i64>,
    /// Embedded mission/custom action records, in stream order.
    #[serde(alias = "w3mmd")]
    pub raw_actions: Vec<ActionRecord>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapReference {
    pub path: Option<String>,
    pub file: Option<String>,
}

impl MapReference {
    pub fn name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.file.as_deref().filter(|f| !f.is_empty()))
    }
}

/// A player as the container sees it.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerPlayer {
    pub id: PlayerId,
    pub name: String,
    pub teamid: TeamId,
    /// `"win"` / `"loss"` on decoders that surface per-player results
    pub result: Option<String>,
    /// `"winner"` / `"loser"` on decoders that surface per-player status
    pub status: Option<String>,
    pub won: Option<bool>,
}

impl ContainerPlayer {
    pub fn reports_win(&self) -> bool {
        matches_label(self.result.as_deref(), "win")
            || matches_label(self.status.as_deref(), "winner")
            || self.won == Some(true)
    }

    pub fn reports_loss(&self) -> bool {
        matches_label(self.result.as_deref(), "loss")
            || matches_label(self.status.as_deref(), "loser")
            || self.won == Some(false)
    }

    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Player {}", self.id)
        } else {
            self.name.clone()
        }
    }
}

fn matches_label(field: Option<&str>, expected: &str) -> bool {
    field.is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

/// One decoded mission/custom action record.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRecord {
    pub cache: Option<ActionCache>,
    pub value: Option<MissionValue>,
}

impl ActionRecord {
    /// The cache key, only when the decoder produced it as a string.
    pub fn cache_key(&self) -> Option<&str> {
        self.cache.as_ref()?.key.as_ref()?.as_str()
    }

    pub fn mission_key(&self) -> Option<&str> {
        self.cache.as_ref()?.mission_key.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.cache.as_ref()?.filename.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionCache {
    pub filename: Option<String>,
    pub mission_key: Option<String>,
    /// Left untyped: decoders are not consistent about emitting a string here.
    pub key: Option<serde_json::Value>,
}

/// Value attached to a mission record. Usually numeric, occasionally text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MissionValue {
    Number(f64),
    Text(String),
    /// Anything else a decoder emits (booleans, objects, arrays). Never a signal.
    Other(serde_json::Value),
}

impl MissionValue {
    /// Numeric comparison `value > 0`, coercing numeric text.
    pub fn is_positive(&self) -> bool {
        match self {
            MissionValue::Number(n) => *n > 0.0,
            MissionValue::Text(s) => s.trim().parse::<f64>().is_ok_and(|n| n > 0.0),
            MissionValue::Other(_) => false,
        }
    }

    /// Lower-cased textual form. Integral numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            MissionValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                format!("{}", *n as i64)
            }
            MissionValue::Number(n) => n.to_string(),
            MissionValue::Text(s) => s.to_lowercase(),
            MissionValue::Other(_) => String::new(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MissionValue::Number(n) if n.is_finite() => Some(*n as i64),
            MissionValue::Number(_) => None,
            MissionValue::Text(s) => crate::types::parse_int_prefix(s),
            MissionValue::Other(_) => None,
        }
    }
}
