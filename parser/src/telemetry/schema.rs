use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use super::{
    BuildingEvent, BuildingStatus, CraftEvent, CraftStatus, Inventory, TelemetryCounters,
    TelemetryPlayer,
};
use crate::types::{TeamId, parse_int_prefix};

const PLAYER_PREFIX: &str = "player:";
const BUILD_PREFIX: &str = "build:";
const CRAFT_PREFIX: &str = "craft:";

/// First schema revision that emits `build:` lines.
pub const BUILD_EVENTS_SCHEMA: u32 = 7;
/// First schema revision that emits `craft:` lines.
pub const CRAFT_EVENTS_SCHEMA: u32 = 8;

/// Positional layouts a `player:` line has used over the schema revisions.
/// Later layouts are supersets of earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlayerLayout {
    /// Pre-3 layout: no class column
    Legacy,
    /// Schema 3+: class column, result shifted one to the right
    Classed,
    /// Schema 4+: `Classed` plus a trailing inventory column
    Itemized,
}

struct LayoutRule {
    layout: PlayerLayout,
    min_fields: usize,
    min_schema: u32,
    parse: fn(&[&str]) -> PlayerLine,
}

/// Checked top to bottom, first rule whose field count and schema gate both pass wins.
const LAYOUT_TABLE: [LayoutRule; 3] = [
    LayoutRule {
        layout: PlayerLayout::Itemized,
        min_fields: 18,
        min_schema: 4,
        parse: parse_itemized,
    },
    LayoutRule {
        layout: PlayerLayout::Classed,
        min_fields: 17,
        min_schema: 3,
        parse: parse_classed,
    },
    LayoutRule {
        layout: PlayerLayout::Legacy,
        min_fields: 16,
        min_schema: 0,
        parse: parse_legacy,
    },
];

/// Column positions shared by all layouts. Column 0 is the slot, 1 the name.
struct Columns {
    team: usize,
    result: usize,
    counters: usize,
}

const LEGACY_COLUMNS: Columns = Columns {
    team: 2,
    result: 4,
    counters: 5,
};
const CLASSED_COLUMNS: Columns = Columns {
    team: 2,
    result: 5,
    counters: 6,
};
const CLASS_COLUMN: usize = 3;
const INVENTORY_COLUMN: usize = 17;

/// Fields every layout carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonFields {
    pub slot_index: u32,
    pub name: String,
    pub team: Option<TeamId>,
    pub result: Option<String>,
    pub counters: TelemetryCounters,
}

/// A decoded `player:` line, tagged with the layout it was read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerLine {
    Legacy {
        common: CommonFields,
    },
    Classed {
        common: CommonFields,
        class: Option<String>,
    },
    Itemized {
        common: CommonFields,
        class: Option<String>,
        inventory: Inventory,
    },
}

impl PlayerLine {
    pub fn layout(&self) -> PlayerLayout {
        match self {
            PlayerLine::Legacy { .. } => PlayerLayout::Legacy,
            PlayerLine::Classed { .. } => PlayerLayout::Classed,
            PlayerLine::Itemized { .. } => PlayerLayout::Itemized,
        }
    }

    /// Parses the part of a `player:` line after the prefix.
    pub fn parse(rest: &str, schema: u32) -> Option<Self> {
        let fields: Vec<&str> = rest.split('|').collect();
        let rule = LAYOUT_TABLE
            .iter()
            .find(|rule| fields.len() >= rule.min_fields && schema >= rule.min_schema)?;
        trace!(layout = ?rule.layout, fields = fields.len(), "player line");
        Some((rule.parse)(&fields))
    }
}

impl From<PlayerLine> for TelemetryPlayer {
    fn from(line: PlayerLine) -> Self {
        let (common, troll_class, inventory) = match line {
            PlayerLine::Legacy { common } => (common, None, None),
            PlayerLine::Classed { common, class } => (common, class, None),
            PlayerLine::Itemized {
                common,
                class,
                inventory,
            } => (common, class, Some(inventory)),
        };
        TelemetryPlayer {
            slot_index: common.slot_index,
            name: common.name,
            troll_class,
            team: common.team,
            result: common.result,
            counters: common.counters,
            inventory,
        }
    }
}

fn counter(fields: &[&str], index: usize) -> i64 {
    fields
        .get(index)
        .and_then(|f| parse_int_prefix(f))
        .unwrap_or(0)
}

fn text(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .filter(|f| !f.is_empty())
        .map(|f| f.to_string())
}

fn common_fields(fields: &[&str], columns: &Columns) -> CommonFields {
    let c = columns.counters;
    CommonFields {
        slot_index: fields
            .first()
            .and_then(|f| parse_int_prefix(f))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        name: fields.get(1).map(|f| f.to_string()).unwrap_or_default(),
        team: fields
            .get(columns.team)
            .and_then(|f| parse_int_prefix(f))
            .map(TeamId),
        result: text(fields, columns.result).map(|r| r.to_uppercase()),
        counters: TelemetryCounters {
            damage_troll: counter(fields, c),
            self_healing: counter(fields, c + 1),
            ally_healing: counter(fields, c + 2),
            gold_acquired: counter(fields, c + 3),
            meat_eaten: counter(fields, c + 4),
            kills_elk: counter(fields, c + 5),
            kills_hawk: counter(fields, c + 6),
            kills_snake: counter(fields, c + 7),
            kills_wolf: counter(fields, c + 8),
            kills_bear: counter(fields, c + 9),
            kills_panther: counter(fields, c + 10),
        },
    }
}

fn parse_legacy(fields: &[&str]) -> PlayerLine {
    PlayerLine::Legacy {
        common: common_fields(fields, &LEGACY_COLUMNS),
    }
}

fn parse_classed(fields: &[&str]) -> PlayerLine {
    PlayerLine::Classed {
        common: common_fields(fields, &CLASSED_COLUMNS),
        class: text(fields, CLASS_COLUMN),
    }
}

fn parse_itemized(fields: &[&str]) -> PlayerLine {
    PlayerLine::Itemized {
        common: common_fields(fields, &CLASSED_COLUMNS),
        class: text(fields, CLASS_COLUMN),
        inventory: parse_inventory(fields.get(INVENTORY_COLUMN).copied().unwrap_or_default()),
    }
}

/// `id,id:charges,...`. A bare id has one charge, an empty slot (id 0) none.
fn parse_inventory(field: &str) -> Inventory {
    let mut inventory = Inventory::default();
    for entry in field.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, charges) = match entry.split_once(':') {
            Some((id, charges)) => (id, Some(charges)),
            None => (entry, None),
        };
        let item = parse_int_prefix(id).unwrap_or(0);
        let default_charges = if item != 0 { 1 } else { 0 };
        let charges = charges
            .and_then(parse_int_prefix)
            .unwrap_or(default_charges);
        inventory.push(item, charges);
    }
    inventory
}

/// Why a single event line was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    #[error("field `{field}` is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
}

struct EventFields<S> {
    team: TeamId,
    elapsed_seconds: i64,
    subject_id: i64,
    status: S,
}

fn strict_int(field: &'static str, value: &str) -> Result<i64, LineError> {
    value.trim().parse().map_err(|_| LineError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

fn parse_event_fields<S: FromStr>(rest: &str) -> Result<EventFields<S>, LineError> {
    let fields: Vec<&str> = rest.split('|').collect();
    let &[team, elapsed, subject, status] = fields.as_slice() else {
        return Err(LineError::FieldCount(fields.len()));
    };
    let status_upper = status.trim().to_uppercase();
    Ok(EventFields {
        team: TeamId(strict_int("team", team)?),
        elapsed_seconds: strict_int("elapsed", elapsed)?,
        subject_id: strict_int("subject", subject)?,
        status: status_upper
            .parse()
            .map_err(|_| LineError::UnknownStatus(status_upper.clone()))?,
    })
}

pub fn parse_building_event(rest: &str) -> Result<BuildingEvent, LineError> {
    let fields = parse_event_fields::<BuildingStatus>(rest)?;
    Ok(BuildingEvent {
        team: fields.team,
        elapsed_seconds: fields.elapsed_seconds,
        building_id: fields.subject_id,
        status: fields.status,
    })
}

pub fn parse_craft_event(rest: &str) -> Result<CraftEvent, LineError> {
    let fields = parse_event_fields::<CraftStatus>(rest)?;
    Ok(CraftEvent {
        team: fields.team,
        elapsed_seconds: fields.elapsed_seconds,
        item_id: fields.subject_id,
        status: fields.status,
    })
}

/// Output of [`parse_payload`]. Event lists are `None` when no line survived,
/// never `Some(vec![])`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    pub players: Vec<TelemetryPlayer>,
    pub building_events: Option<Vec<BuildingEvent>>,
    pub craft_events: Option<Vec<CraftEvent>>,
    /// Candidate lines that were skipped as malformed
    pub dropped_lines: usize,
}

/// Splits a reconstructed payload into player records and event lists.
///
/// Without a declared schema nothing is parsed.
pub fn parse_payload(payload: &str, schema: Option<u32>) -> ParsedPayload {
    let Some(schema) = schema else {
        debug!("telemetry payload has no schema version, skipping");
        return ParsedPayload::default();
    };

    let mut parsed = ParsedPayload::default();
    let mut buildings = Vec::new();
    let mut crafts = Vec::new();
    for line in payload.split('\n') {
        if let Some(rest) = line.strip_prefix(PLAYER_PREFIX) {
            match PlayerLine::parse(rest, schema) {
                Some(player) => parsed.players.push(player.into()),
                None => {
                    debug!(schema, line, "player line matches no layout");
                    parsed.dropped_lines += 1;
                }
            }
        } else if let Some(rest) = line.strip_prefix(BUILD_PREFIX) {
            if schema < BUILD_EVENTS_SCHEMA {
                continue;
            }
            match parse_building_event(rest) {
                Ok(event) => buildings.push(event),
                Err(e) => {
                    debug!(line, error = %e, "skipping building event");
                    parsed.dropped_lines += 1;
                }
            }
        } else if let Some(rest) = line.strip_prefix(CRAFT_PREFIX) {
            if schema < CRAFT_EVENTS_SCHEMA {
                continue;
            }
            match parse_craft_event(rest) {
                Ok(event) => crafts.push(event),
                Err(e) => {
                    debug!(line, error = %e, "skipping craft event");
                    parsed.dropped_lines += 1;
                }
            }
        }
    }

    parsed.building_events = (!buildings.is_empty()).then_some(buildings);
    parsed.craft_events = (!crafts.is_empty()).then_some(crafts);
    parsed
}
