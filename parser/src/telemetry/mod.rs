//! Telemetry the Island Troll Tribes map embeds in replays as chunked custom
//! messages, and the parsers that turn it back into typed records.

pub mod payload;
pub mod scanner;
pub mod schema;

use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

use crate::config::ParserConfig;
use crate::container::ActionRecord;
use crate::types::TeamId;

pub use payload::{ReconstructedPayload, reconstruct, unescape};
pub use scanner::{FragmentMap, scan_actions};
pub use schema::{LineError, ParsedPayload, PlayerLayout, PlayerLine, parse_payload};

/// Numeric per-player counters reported by every schema revision.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryCounters {
    pub damage_troll: i64,
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

/// Inventory snapshot. Item ids and charges are kept in lockstep.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    items: Vec<i64>,
    item_charges: Vec<i64>,
}

impl Inventory {
    pub fn push(&mut self, item: i64, charges: i64) {
        self.items.push(item);
        self.item_charges.push(charges);
    }

    pub fn items(&self) -> &[i64] {
        &self.items
    }

    pub fn item_charges(&self) -> &[i64] {
        &self.item_charges
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One `player:` line of the telemetry payload, independent of its layout.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPlayer {
    pub slot_index: u32,
    pub name: String,
    pub troll_class: Option<String>,
    pub team: Option<TeamId>,
    /// Upper-cased, e.g. `WIN`, `LOSS`, `LEAVE`, `DRAW`
    pub result: Option<String>,
    #[serde(flatten)]
    pub counters: TelemetryCounters,
    #[serde(flatten)]
    pub inventory: Option<Inventory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum BuildingStatus {
    Start,
    Finish,
    Cancel,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CraftStatus {
    Success,
    Fail,
}

/// `build:team|seconds|buildingId|STATUS`, schema 7 and later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingEvent {
    pub team: TeamId,
    pub elapsed_seconds: i64,
    pub building_id: i64,
    pub status: BuildingStatus,
}

/// `craft:team|seconds|itemId|STATUS`, schema 8 and later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftEvent {
    pub team: TeamId,
    pub elapsed_seconds: i64,
    pub item_id: i64,
    pub status: CraftStatus,
}

/// Everything recovered from a replay's embedded telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IttMetadata {
    pub version: Option<String>,
    pub schema: Option<u32>,
    pub payload: String,
    pub players: Vec<TelemetryPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_events: Option<Vec<BuildingEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub craft_events: Option<Vec<CraftEvent>>,
}

impl IttMetadata {
    /// Scan -> reconstruct -> parse. `None` when the replay has no telemetry.
    pub fn extract(actions: &[ActionRecord], config: &ParserConfig) -> Option<Self> {
        let fragments = scan_actions(actions, config);
        Self::from_fragments(&fragments, config)
    }

    pub fn from_fragments(fragments: &FragmentMap, config: &ParserConfig) -> Option<Self> {
        let Some(reconstructed) = reconstruct(fragments, config) else {
            debug!(fragments = fragments.len(), "no telemetry chunk count in replay");
            return None;
        };
        let parsed = parse_payload(&reconstructed.payload, reconstructed.schema);
        info!(
            version = reconstructed.version.as_deref(),
            schema = reconstructed.schema,
            players = parsed.players.len(),
            dropped_lines = parsed.dropped_lines,
            "telemetry metadata extracted"
        );
        Some(IttMetadata {
            version: reconstructed.version,
            schema: reconstructed.schema,
            payload: reconstructed.payload,
            players: parsed.players,
            building_events: parsed.building_events,
            craft_events: parsed.craft_events,
        })
    }
}
