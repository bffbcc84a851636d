//! One pass from replay bytes to a [`GameRecord`].

use std::collections::BTreeMap;
use std::convert::Infallible;

use derive_builder::Builder;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::ParserConfig;
use crate::container::{DecodedReplay, ReplayDecoder};
use crate::error::{Error, Result};
use crate::game::{GameRecord, PlayerRecord};
use crate::matcher::IdentityMatcher;
use crate::mission::{MissionData, MissionEntry, MissionLookup, stats_for_player};
use crate::outcome::{
    FlagContext, OutcomeContext, PlayerFlag, WinnerSource, derive_flag,
    promote_drawers_on_losing_teams, resolve_winning_team,
};
use crate::telemetry::IttMetadata;
use crate::types::TeamId;

/// Caller-supplied values the replay itself cannot provide.
#[derive(Debug, Default, Clone, PartialEq, Eq, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct ParseOptions {
    /// Game id assigned by the scheduler. Takes precedence over the replay seed.
    pub scheduled_game_id: Option<u64>,
    pub fallback_datetime: Option<String>,
    /// Used when the team layout does not name a category
    pub fallback_category: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingSummary {
    pub players_detected: usize,
    pub players_with_stats: usize,
    pub players_with_itt_stats: usize,
    pub winners: usize,
    pub losers: usize,
    pub drawers: usize,
    pub action_count: usize,
    pub mission_records: usize,
    pub itt_metadata_found: bool,
    pub itt_schema: Option<u32>,
    pub itt_version: Option<String>,
    pub winning_team: Option<TeamId>,
    pub winner_source: Option<WinnerSource>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayParseResult {
    pub game_data: GameRecord,
    pub telemetry_raw: Vec<MissionEntry>,
    pub telemetry_lookup: MissionLookup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itt_metadata: Option<IttMetadata>,
    pub summary: ParsingSummary,
}

/// Runs the pipeline with a fixed configuration. Holds no per-replay state,
/// so one parser can serve any number of replays.
#[derive(Debug, Default, Clone)]
pub struct ReplayParser {
    config: ParserConfig,
}

impl ReplayParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse<D: ReplayDecoder>(
        &self,
        decoder: &D,
        bytes: &[u8],
        options: &ParseOptions,
    ) -> Result<ReplayParseResult> {
        let replay = decoder.decode(bytes).map_err(Error::Decode)?;
        self.parse_decoded(&replay, options)
    }

    /// Everything after the container decode.
    pub fn parse_decoded(
        &self,
        replay: &DecodedReplay,
        options: &ParseOptions,
    ) -> Result<ReplayParseResult> {
        let span = info_span!("parse_replay", seed = replay.randomseed);
        let _enter = span.enter();

        let config = &self.config;
        let container_players = &replay.players;
        info!(
            players = container_players.len(),
            winning_team_id = replay.winning_team_id,
            actions = replay.raw_actions.len(),
            "replay decoded"
        );
        if container_players.len() < config.min_players {
            return Err(Error::NotEnoughPlayers {
                found: container_players.len(),
                required: config.min_players,
            });
        }

        let mission = MissionData::from_actions(&replay.raw_actions, config);
        let itt_metadata = IttMetadata::extract(&replay.raw_actions, config);

        let resolution = resolve_winning_team(&OutcomeContext {
            replay,
            lookup: &mission.lookup,
        });
        let winning_team = resolution.map(|r| r.team);

        let matches = match &itt_metadata {
            Some(itt) => IdentityMatcher::match_all(&itt.players, container_players),
            None => vec![None; container_players.len()],
        };

        let mut flags: Vec<PlayerFlag> = container_players
            .iter()
            .zip(&matches)
            .map(|(player, matched)| {
                let ctx = FlagContext {
                    player,
                    winning_team,
                    telemetry_result: matched.and_then(|m| m.record.result.as_deref()),
                    lookup: &mission.lookup,
                };
                derive_flag(&ctx, config.prefer_telemetry_result)
            })
            .collect();
        if config.promote_drawers_on_losing_team {
            let teams: Vec<TeamId> = container_players.iter().map(|p| p.teamid).collect();
            promote_drawers_on_losing_teams(&teams, &mut flags);
        }

        let players: Vec<PlayerRecord> = container_players
            .iter()
            .zip(&matches)
            .zip(flags)
            .map(|((player, matched), flag)| {
                PlayerRecord::assemble(
                    player,
                    flag,
                    stats_for_player(&mission.lookup, player),
                    matched.map(|m| m.record),
                )
            })
            .collect();

        let game_id = options
            .scheduled_game_id
            .or(replay.randomseed)
            .unwrap_or_else(|| {
                warn!("replay has neither a scheduled game id nor a random seed, using 0");
                0
            });
        let game_data = GameRecord::assemble(
            replay,
            game_id,
            options.fallback_datetime.clone(),
            options.fallback_category.as_deref(),
            players,
        );

        let mut summary = summarize(&game_data, itt_metadata.as_ref());
        summary.action_count = replay.raw_actions.len();
        summary.mission_records = mission.raw.len();
        summary.winning_team = winning_team;
        summary.winner_source = resolution.map(|r| r.source);
        if replay.raw_actions.is_empty() {
            summary
                .warnings
                .push("no mission records found, some stats may be unavailable".to_string());
        }
        info!(
            game_id,
            winners = summary.winners,
            losers = summary.losers,
            drawers = summary.drawers,
            "replay parsed"
        );

        Ok(ReplayParseResult {
            game_data,
            telemetry_raw: mission.raw,
            telemetry_lookup: mission.lookup,
            itt_metadata,
            summary,
        })
    }
}

fn summarize(game: &GameRecord, itt: Option<&IttMetadata>) -> ParsingSummary {
    let count = |flag: PlayerFlag| game.players.iter().filter(|p| p.flag == flag).count();
    let players_detected = game.players.len();
    let players_with_itt_stats = game.players.iter().filter(|p| p.has_telemetry).count();

    let mut warnings = Vec::new();
    match itt {
        None => warnings.push(
            "telemetry not found, player stats come from mission records only".to_string(),
        ),
        Some(itt) if itt.players.len() != players_detected => warnings.push(format!(
            "telemetry has {} players but the replay has {}",
            itt.players.len(),
            players_detected
        )),
        Some(_) => {}
    }
    if players_with_itt_stats < players_detected {
        warnings.push(format!(
            "{} player(s) missing telemetry stats",
            players_detected - players_with_itt_stats
        ));
    }

    ParsingSummary {
        players_detected,
        players_with_stats: game.players.iter().filter(|p| p.has_stats()).count(),
        players_with_itt_stats,
        winners: count(PlayerFlag::Winner),
        losers: count(PlayerFlag::Loser),
        drawers: count(PlayerFlag::Drawer),
        itt_metadata_found: itt.is_some(),
        itt_schema: itt.and_then(|i| i.schema),
        itt_version: itt.and_then(|i| i.version.clone()),
        warnings,
        ..Default::default()
    }
}

/// Parses a replay with the default [`ParserConfig`].
pub fn parse_replay<D: ReplayDecoder>(
    decoder: &D,
    bytes: &[u8],
    options: &ParseOptions,
) -> Result<ReplayParseResult> {
    ReplayParser::default().parse(decoder, bytes, options)
}

/// Where finished game records go. Upserts are keyed by game id.
pub trait GameStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upsert_game(
        &mut self,
        game_id: u64,
        record: &GameRecord,
    ) -> std::result::Result<(), Self::Error>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryGameStore {
    games: BTreeMap<u64, GameRecord>,
}

impl MemoryGameStore {
    pub fn get(&self, game_id: u64) -> Option<&GameRecord> {
        self.games.get(&game_id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl GameStore for MemoryGameStore {
    type Error = Infallible;

    fn upsert_game(
        &mut self,
        game_id: u64,
        record: &GameRecord,
    ) -> std::result::Result<(), Infallible> {
        self.games.insert(game_id, record.clone());
        Ok(())
    }
}

/// Parses a replay and hands the resulting record to `store`.
pub fn ingest_replay<D: ReplayDecoder, S: GameStore>(
    parser: &ReplayParser,
    decoder: &D,
    store: &mut S,
    bytes: &[u8],
    options: &ParseOptions,
) -> Result<ReplayParseResult> {
    let result = parser.parse(decoder, bytes, options)?;
    let game_id = result.game_data.game_id;
    store
        .upsert_game(game_id, &result.game_data)
        .map_err(|e| Error::Store {
            game_id,
            source: Box::new(e),
        })?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{
        ActionCache, ActionRecord, ContainerPlayer, JsonReplayDecoder, MissionValue,
    };
    use crate::game::IttStats;
    use crate::types::PlayerId;
    use pretty_assertions::assert_eq;

    fn player(id: u32, name: &str, team: i64) -> ContainerPlayer {
        ContainerPlayer {
            id: PlayerId(id),
            name: name.to_string(),
            teamid: TeamId(team),
            ..Default::default()
        }
    }

    fn custom(message: &str) -> ActionRecord {
        ActionRecord {
            cache: Some(ActionCache {
                filename: Some("MMD.Dat".to_string()),
                mission_key: Some("val:0".to_string()),
                key: Some(serde_json::Value::String(format!("custom {message}"))),
            }),
            value: Some(MissionValue::Number(0.0)),
        }
    }

    fn telemetry(schema: u32, payload: &str) -> Vec<ActionRecord> {
        let (first, second) = payload.split_at(payload.len() / 2);
        vec![
            custom("itt_version 1.4.2"),
            custom(&format!("itt_schema {schema}")),
            custom("itt_chunks 2"),
            custom(&format!("itt_data_1 {second}")),
            custom(&format!("itt_data_0 {first}")),
        ]
    }

    fn two_player_replay() -> DecodedReplay {
        DecodedReplay {
            players: vec![player(1, "Foo#1234", 0), player(2, "Bar", 1)],
            duration: 1_805_400,
            randomseed: Some(4242),
            ..Default::default()
        }
    }

    fn parse(replay: &DecodedReplay) -> ReplayParseResult {
        ReplayParser::default()
            .parse_decoded(replay, &ParseOptions::default())
            .unwrap()
    }

    #[test]
    fn no_telemetry_and_no_winner_degrades_to_drawers() {
        let result = parse(&two_player_replay());
        let game = &result.game_data;
        assert_eq!(game.game_id, 4242);
        assert_eq!(game.duration, 1805);
        assert_eq!(game.category.as_deref(), Some("1v1"));
        for p in &game.players {
            assert_eq!(p.flag, PlayerFlag::Drawer);
            assert_eq!(p.itt, IttStats::default());
        }
        assert!(result.itt_metadata.is_none());
        assert!(!result.summary.itt_metadata_found);
        assert_eq!(result.summary.drawers, 2);
        assert_eq!(result.summary.winner_source, None);
    }

    #[test]
    fn telemetry_is_matched_and_merged() {
        let payload = "player:1|Foo_1234|0|HUNTER|x|WIN|1500|20|35|300|12|4|1|0|2|1|0\n\
                       player:2|Bar|1|MAGE|x|LOSS|900|5|6|70|8|1|2|3|4|5|6";
        let replay = DecodedReplay {
            winning_team_id: Some(0),
            raw_actions: telemetry(3, payload),
            ..two_player_replay()
        };
        let result = parse(&replay);
        let [foo, bar] = result.game_data.players.as_slice() else {
            panic!("expected two players");
        };
        assert_eq!(foo.flag, PlayerFlag::Winner);
        assert_eq!(foo.class.as_deref(), Some("HUNTER"));
        assert_eq!(foo.damage_dealt, Some(1500));
        assert_eq!(bar.flag, PlayerFlag::Loser);
        assert_eq!(bar.itt.kills_panther, 6);

        let summary = &result.summary;
        assert!(summary.itt_metadata_found);
        assert_eq!(summary.itt_schema, Some(3));
        assert_eq!(summary.itt_version.as_deref(), Some("1.4.2"));
        assert_eq!(summary.players_with_itt_stats, 2);
        assert_eq!(summary.winner_source, Some(WinnerSource::WinningTeamField));
        assert!(summary.warnings.is_empty());
        // telemetry custom messages stay out of the mission lookup
        assert!(result.telemetry_raw.is_empty());
    }

    #[test]
    fn one_loser_drags_down_undecided_teammates() {
        let mut replay = DecodedReplay {
            players: vec![
                player(1, "A", 0),
                player(2, "B", 0),
                player(3, "C", 1),
                player(4, "D", 1),
            ],
            ..two_player_replay()
        };
        replay.players[0].result = Some("loss".to_string());
        let result = parse(&replay);
        let flags: Vec<PlayerFlag> = result.game_data.players.iter().map(|p| p.flag).collect();
        assert_eq!(
            flags,
            [PlayerFlag::Loser, PlayerFlag::Loser, PlayerFlag::Drawer, PlayerFlag::Drawer]
        );

        let parser = ReplayParser::new(ParserConfig {
            promote_drawers_on_losing_team: false,
            ..Default::default()
        });
        let result = parser.parse_decoded(&replay, &ParseOptions::default()).unwrap();
        assert_eq!(result.game_data.players[1].flag, PlayerFlag::Drawer);
    }

    #[test]
    fn options_take_precedence() {
        let options = ParseOptionsBuilder::default()
            .scheduled_game_id(17u64)
            .fallback_datetime("2024-01-15T00:00:00Z")
            .fallback_category("custom")
            .build()
            .unwrap();
        let replay = DecodedReplay {
            players: vec![player(1, "A", 0), player(2, "B", 0)],
            ..two_player_replay()
        };
        let game = ReplayParser::default()
            .parse_decoded(&replay, &options)
            .unwrap()
            .game_data;
        assert_eq!(game.game_id, 17);
        assert_eq!(game.datetime.as_deref(), Some("2024-01-15T00:00:00Z"));
        assert_eq!(game.category.as_deref(), Some("custom"));
    }

    #[test]
    fn too_few_players_is_fatal() {
        let replay = DecodedReplay {
            players: vec![player(1, "Solo", 0)],
            ..Default::default()
        };
        let err = ReplayParser::default()
            .parse_decoded(&replay, &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotEnoughPlayers { found: 1, required: 2 }));
    }

    #[test]
    fn decode_failure_is_fatal() {
        let err = parse_replay(&JsonReplayDecoder, b"\x00\x01", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn same_bytes_same_record() {
        let bytes = serde_json::to_vec(&DecodedReplay {
            raw_actions: telemetry(8, "player:1|Foo_1234|0|HUNTER|x|WIN|1|2|3|4|5|6|7|8|9|10|11"),
            ..two_player_replay()
        })
        .unwrap();
        let options = ParseOptions::default();
        let first = parse_replay(&JsonReplayDecoder, &bytes, &options).unwrap();
        let second = parse_replay(&JsonReplayDecoder, &bytes, &options).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.game_data).unwrap(),
            serde_json::to_string(&second.game_data).unwrap()
        );
    }

    #[test]
    fn ingest_upserts_by_game_id() {
        let bytes = serde_json::to_vec(&two_player_replay()).unwrap();
        let mut store = MemoryGameStore::default();
        let parser = ReplayParser::default();
        let options = ParseOptions::default();
        ingest_replay(&parser, &JsonReplayDecoder, &mut store, &bytes, &options).unwrap();
        ingest_replay(&parser, &JsonReplayDecoder, &mut store, &bytes, &options).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(4242).map(|g| g.players.len()), Some(2));
    }
}
