//! The canonical match record handed to storage.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::container::{ContainerPlayer, DecodedReplay, MapReference};
use crate::mission::MissionStats;
use crate::outcome::PlayerFlag;
use crate::telemetry::{Inventory, TelemetryCounters, TelemetryPlayer};
use crate::types::{PlayerId, TeamId};

const UNKNOWN: &str = "Unknown";

/// Counters only the telemetry knows about. Zero when no telemetry record
/// was matched to the player.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IttStats {
    pub self_healing: i64,
    pub ally_healing: i64,
    pub gold_acquired: i64,
    pub meat_eaten: i64,
    pub kills_elk: i64,
    pub kills_hawk: i64,
    pub kills_snake: i64,
    pub kills_wolf: i64,
    pub kills_bear: i64,
    pub kills_panther: i64,
}

impl From<&TelemetryCounters> for IttStats {
    fn from(c: &TelemetryCounters) -> Self {
        IttStats {
            self_healing: c.self_healing,
            ally_healing: c.ally_healing,
            gold_acquired: c.gold_acquired,
            meat_eaten: c.meat_eaten,
            kills_elk: c.kills_elk,
            kills_hawk: c.kills_hawk,
            kills_snake: c.kills_snake,
            kills_wolf: c.kills_wolf,
            kills_bear: c.kills_bear,
            kills_panther: c.kills_panther,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub pid: PlayerId,
    pub teamid: TeamId,
    pub flag: PlayerFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assists: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_dealt: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_taken: Option<i64>,
    #[serde(flatten)]
    pub itt: IttStats,
    #[serde(flatten)]
    pub inventory: Option<Inventory>,
    /// Whether a telemetry record was matched to this player
    #[serde(skip)]
    pub has_telemetry: bool,
}

impl PlayerRecord {
    /// Merges container identity, mission stats and the matched telemetry
    /// record. Telemetry wins where both report a value.
    pub fn assemble(
        player: &ContainerPlayer,
        flag: PlayerFlag,
        stats: MissionStats,
        telemetry: Option<&TelemetryPlayer>,
    ) -> Self {
        let mut record = PlayerRecord {
            name: player.display_name(),
            pid: player.id,
            teamid: player.teamid,
            flag,
            class: None,
            kills: stats.kills,
            deaths: stats.deaths,
            assists: stats.assists,
            gold: stats.gold,
            damage_dealt: stats.damage_dealt,
            damage_taken: stats.damage_taken,
            itt: IttStats::default(),
            inventory: None,
            has_telemetry: false,
        };
        if let Some(t) = telemetry {
            record.class = t.troll_class.clone();
            record.damage_dealt = Some(t.counters.damage_troll);
            record.itt = IttStats::from(&t.counters);
            record.inventory = t.inventory.clone();
            record.has_telemetry = true;
        }
        record
    }

    pub fn has_stats(&self) -> bool {
        self.damage_dealt.is_some() || self.kills.is_some() || self.deaths.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub game_id: u64,
    pub datetime: Option<String>,
    /// Seconds
    pub duration: u64,
    pub gamename: String,
    pub map: String,
    pub creator_name: String,
    pub ownername: String,
    pub category: Option<String>,
    pub players: Vec<PlayerRecord>,
}

impl GameRecord {
    pub fn assemble(
        replay: &DecodedReplay,
        game_id: u64,
        datetime: Option<String>,
        fallback_category: Option<&str>,
        players: Vec<PlayerRecord>,
    ) -> Self {
        let teams: Vec<TeamId> = players.iter().map(|p| p.teamid).collect();
        let category = derive_category(&teams).or_else(|| fallback_category.map(str::to_string));
        let creator = replay
            .creator
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();
        GameRecord {
            game_id,
            datetime,
            duration: duration_seconds(replay.duration),
            gamename: replay
                .gamename
                .clone()
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| match replay.randomseed {
                    Some(seed) => format!("Replay {seed}"),
                    None => "Replay unknown".to_string(),
                }),
            map: replay
                .map
                .as_ref()
                .and_then(MapReference::name)
                .unwrap_or(UNKNOWN)
                .to_string(),
            creator_name: creator.clone(),
            ownername: creator,
            category,
            players,
        }
    }
}

/// Milliseconds to whole seconds, rounding half up.
pub fn duration_seconds(millis: u64) -> u64 {
    millis / 1000 + u64::from(millis % 1000 >= 500)
}

/// Names the game mode from its team sizes: `2v2` for two equal teams,
/// `ffa` for three or more solo teams, otherwise the sizes largest first
/// (`3v2`, `3v3v2`). A single team says nothing about the mode.
pub fn derive_category(teams: &[TeamId]) -> Option<String> {
    let mut sizes: BTreeMap<TeamId, usize> = BTreeMap::new();
    for team in teams {
        *sizes.entry(*team).or_default() += 1;
    }
    let mut sizes: Vec<usize> = sizes.into_values().collect();
    if sizes.len() < 2 {
        return None;
    }
    if sizes.len() >= 3 && sizes.iter().all(|s| *s == 1) {
        return Some("ffa".to_string());
    }
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    Some(
        sizes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("v"),
    )
}
