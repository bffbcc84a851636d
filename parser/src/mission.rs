//! Mission records (the non-telemetry key/value pairs maps write into the
//! action stream) and the keyword heuristics run over them.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use crate::config::ParserConfig;
use crate::container::{ActionRecord, ContainerPlayer, MissionValue};
use crate::types::normalize_name;

/// `mission_key -> key -> value`, in first-seen order.
pub type MissionLookup = IndexMap<String, IndexMap<String, MissionValue>>;

/// One mission record as it appeared in the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionEntry {
    pub filename: Option<String>,
    pub mission_key: String,
    pub key: String,
    pub value: MissionValue,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MissionData {
    pub raw: Vec<MissionEntry>,
    pub lookup: MissionLookup,
}

impl MissionData {
    /// Collects every keyed mission record except telemetry custom messages.
    pub fn from_actions(actions: &[ActionRecord], config: &ParserConfig) -> Self {
        let mut data = MissionData::default();
        for action in actions {
            let (Some(mission_key), Some(key)) = (action.mission_key(), action.cache_key()) else {
                continue;
            };
            if key.starts_with(&config.custom_message_marker) {
                continue;
            }
            let value = action.value.clone().unwrap_or(MissionValue::Number(0.0));
            trace!(mission_key, key, ?value, "mission record");
            data.lookup
                .entry(mission_key.to_string())
                .or_default()
                .insert(key.to_string(), value.clone());
            data.raw.push(MissionEntry {
                filename: action.filename().map(str::to_string),
                mission_key: mission_key.to_string(),
                key: key.to_string(),
                value,
            });
        }
        data
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// `winner`/`win` in the key, or a `result` key whose value reads as a win,
/// backed by a positive or win-like value.
pub fn is_winner_signal(key: &str, value: &MissionValue) -> bool {
    let key = key.to_lowercase();
    let text = value.to_text();
    let key_matches =
        key.contains("win") || (key == "result" && (text.contains("win") || text == "1"));
    key_matches && (value.is_positive() || text.contains("win"))
}

/// `loser`/`loss` in the key with a positive value.
pub fn is_loser_signal(key: &str, value: &MissionValue) -> bool {
    let key = key.to_lowercase();
    (key.contains("loser") || key.contains("loss")) && value.is_positive()
}

/// Loser check used when looking at a single player's own records: also
/// accepts a `result` key reading as a loss.
pub fn is_player_loser_signal(key: &str, value: &MissionValue) -> bool {
    let key = key.to_lowercase();
    let text = value.to_text();
    let key_matches = key.contains("loser")
        || key.contains("loss")
        || (key == "result" && text.contains("loss"));
    key_matches && (value.is_positive() || text.contains("loss"))
}

/// The spellings a mission key may use to refer to one player.
#[derive(Debug, Clone)]
pub struct PlayerKeys {
    normalized_name: String,
    id: String,
}

impl PlayerKeys {
    pub fn new(player: &ContainerPlayer) -> Self {
        Self {
            normalized_name: normalize_name(player.name.trim()),
            id: player.id.to_string(),
        }
    }

    /// Candidate keys in priority order; an empty normalized name is left out.
    pub fn candidates(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(5);
        if !self.normalized_name.is_empty() {
            keys.push(self.normalized_name.clone());
        }
        keys.push(format!("player{}", self.id));
        keys.push(format!("p{}", self.id));
        keys.push(format!("slot{}", self.id));
        keys.push(self.id.clone());
        keys
    }

    fn name_equal_or_contained(&self, mission_key: &str) -> bool {
        !self.normalized_name.is_empty()
            && !mission_key.is_empty()
            && (self.normalized_name == mission_key
                || mission_key.contains(&self.normalized_name)
                || self.normalized_name.contains(mission_key))
    }

    fn slot_pattern(&self, mission_key: &str) -> bool {
        mission_key == format!("player{}", self.id)
            || mission_key == format!("p{}", self.id)
            || mission_key == format!("slot{}", self.id)
    }

    /// Loose association used by the winner search: name in either direction,
    /// slot spellings, or the bare id anywhere in the key.
    pub fn matches_winner_key(&self, mission_key: &str) -> bool {
        let nk = normalize_name(mission_key);
        self.name_equal_or_contained(&nk) || self.slot_pattern(&nk) || nk.contains(&self.id)
    }

    /// Association used by the loser search, a little tighter than the winner one.
    pub fn matches_loser_key(&self, mission_key: &str) -> bool {
        let nk = normalize_name(mission_key);
        let name_hit = !self.normalized_name.is_empty()
            && (nk == self.normalized_name || nk.contains(&self.normalized_name));
        name_hit || nk == format!("player{}", self.id) || nk == format!("p{}", self.id)
    }

    /// Whether a mission key belongs to this player when scanning its own records.
    pub fn scopes(&self, mission_key: &str) -> bool {
        let nk = normalize_name(mission_key);
        !nk.is_empty()
            && self
                .candidates()
                .iter()
                .any(|c| nk == *c || nk.contains(c.as_str()) || c.contains(nk.as_str()))
    }

    /// Exact spelling only; used when lifting stats off mission records.
    pub fn names_exactly(&self, mission_key: &str) -> bool {
        let nk = normalize_name(mission_key);
        self.candidates().iter().any(|c| nk == *c)
    }
}

/// Generic combat stats some maps publish through mission records.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStats {
    pub kills: Option<i64>,
    pub deaths: Option<i64>,
    pub assists: Option<i64>,
    pub gold: Option<i64>,
    pub damage_dealt: Option<i64>,
    pub damage_taken: Option<i64>,
}

impl MissionStats {
    pub fn is_empty(&self) -> bool {
        *self == MissionStats::default()
    }

    fn slot_for(&mut self, key: &str) -> Option<&mut Option<i64>> {
        match normalize_name(key).as_str() {
            "kills" => Some(&mut self.kills),
            "deaths" => Some(&mut self.deaths),
            "assists" => Some(&mut self.assists),
            "gold" => Some(&mut self.gold),
            "damage" | "damagedealt" => Some(&mut self.damage_dealt),
            "damagetaken" => Some(&mut self.damage_taken),
            _ => None,
        }
    }
}

/// Stats published under a mission key that names `player` exactly.
/// The first value seen for a stat is kept.
pub fn stats_for_player(lookup: &MissionLookup, player: &ContainerPlayer) -> MissionStats {
    let keys = PlayerKeys::new(player);
    let mut stats = MissionStats::default();
    for (mission_key, entries) in lookup {
        if !keys.names_exactly(mission_key) {
            continue;
        }
        for (key, value) in entries {
            if let Some(slot) = stats.slot_for(key) {
                if slot.is_none() {
                    *slot = value.as_i64();
                }
            }
        }
    }
    stats
}
