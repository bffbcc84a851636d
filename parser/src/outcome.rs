//! Winning-team resolution and the per-player win/loss/draw flag.
//!
//! Both are waterfalls: an ordered list of stages, each returning `Some` when
//! it can answer. The first answer is taken and later stages are skipped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, info, warn};

use crate::container::{ContainerPlayer, DecodedReplay};
use crate::mission::{
    MissionLookup, PlayerKeys, is_loser_signal, is_player_loser_signal, is_winner_signal,
};
use crate::types::TeamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlayerFlag {
    Winner,
    Loser,
    /// Outcome could not be determined
    Drawer,
}

/// Where a winning team came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum WinnerSource {
    WinningTeamField,
    WinnerTeamField,
    PlayerResult,
    MissionWinner,
    LoserElimination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResolution {
    pub team: TeamId,
    pub source: WinnerSource,
}

/// Inputs of the winning-team waterfall.
pub struct OutcomeContext<'a> {
    pub replay: &'a DecodedReplay,
    pub lookup: &'a MissionLookup,
}

impl OutcomeContext<'_> {
    fn players(&self) -> &[ContainerPlayer] {
        &self.replay.players
    }

    fn has_team(&self, team: TeamId) -> bool {
        self.players().iter().any(|p| p.teamid == team)
    }
}

type TeamStage = fn(&OutcomeContext<'_>) -> Option<TeamId>;

const TEAM_STAGES: [(WinnerSource, TeamStage); 5] = [
    (WinnerSource::WinningTeamField, from_winning_team_field),
    (WinnerSource::WinnerTeamField, from_winner_team_field),
    (WinnerSource::PlayerResult, from_player_results),
    (WinnerSource::MissionWinner, from_mission_winners),
    (WinnerSource::LoserElimination, from_loser_elimination),
];

fn from_winning_team_field(ctx: &OutcomeContext<'_>) -> Option<TeamId> {
    let team = TeamId(ctx.replay.winning_team_id?);
    if !team.is_valid() {
        return None;
    }
    if ctx.has_team(team) {
        return Some(team);
    }
    let teams: Vec<i64> = ctx.players().iter().map(|p| p.teamid.raw()).collect();
    warn!(winning_team_id = %team, ?teams, "winningTeamId does not match any player team");
    None
}

fn from_winner_team_field(ctx: &OutcomeContext<'_>) -> Option<TeamId> {
    let team = TeamId(ctx.replay.winner_team_id?);
    (team.is_valid() && ctx.has_team(team)).then_some(team)
}

fn from_player_results(ctx: &OutcomeContext<'_>) -> Option<TeamId> {
    let winner = ctx.players().iter().find(|p| p.reports_win())?;
    debug!(player = %winner.name, team = %winner.teamid, "winner from player result");
    Some(winner.teamid)
}

fn from_mission_winners(ctx: &OutcomeContext<'_>) -> Option<TeamId> {
    let keys: Vec<PlayerKeys> = ctx.players().iter().map(PlayerKeys::new).collect();
    for (mission_key, entries) in ctx.lookup {
        for (key, value) in entries {
            if !is_winner_signal(key, value) {
                continue;
            }
            // Every winner signal is taken to agree on the team: the first
            // one that resolves to a player decides.
            if let Some(player) = ctx
                .players()
                .iter()
                .zip(&keys)
                .find_map(|(p, k)| k.matches_winner_key(mission_key).then_some(p))
            {
                debug!(player = %player.name, mission_key, key, "winner from mission record");
                return Some(player.teamid);
            }
        }
    }
    None
}

fn from_loser_elimination(ctx: &OutcomeContext<'_>) -> Option<TeamId> {
    let keys: Vec<PlayerKeys> = ctx.players().iter().map(PlayerKeys::new).collect();
    let mut loser_teams = HashSet::new();
    for (mission_key, entries) in ctx.lookup {
        for (key, value) in entries {
            if !is_loser_signal(key, value) {
                continue;
            }
            if let Some(player) = ctx
                .players()
                .iter()
                .zip(&keys)
                .find_map(|(p, k)| k.matches_loser_key(mission_key).then_some(p))
            {
                loser_teams.insert(player.teamid);
            }
        }
    }
    if loser_teams.is_empty() {
        return None;
    }
    let survivor = ctx
        .players()
        .iter()
        .find(|p| !loser_teams.contains(&p.teamid))?;
    debug!(
        loser_teams = ?loser_teams,
        winning_team = %survivor.teamid,
        "winner by elimination"
    );
    Some(survivor.teamid)
}

/// Runs the winning-team waterfall. `None` when no stage could tell.
pub fn resolve_winning_team(ctx: &OutcomeContext<'_>) -> Option<TeamResolution> {
    let resolution = TEAM_STAGES.iter().find_map(|(source, stage)| {
        stage(ctx).map(|team| TeamResolution {
            team,
            source: *source,
        })
    });
    match &resolution {
        Some(r) => info!(team = %r.team, source = %r.source, "winning team resolved"),
        None => warn!(
            winning_team_id = ctx.replay.winning_team_id,
            winner_team_id = ctx.replay.winner_team_id,
            "could not determine winning team from any source"
        ),
    }
    resolution
}

/// Inputs of the per-player flag waterfall.
pub struct FlagContext<'a> {
    pub player: &'a ContainerPlayer,
    pub winning_team: Option<TeamId>,
    /// Result label from the matched telemetry record
    pub telemetry_result: Option<&'a str>,
    pub lookup: &'a MissionLookup,
}

type FlagStage = fn(&FlagContext<'_>) -> Option<PlayerFlag>;

fn flag_from_winning_team(ctx: &FlagContext<'_>) -> Option<PlayerFlag> {
    let team = ctx.winning_team.filter(|t| t.is_valid())?;
    Some(if ctx.player.teamid == team {
        PlayerFlag::Winner
    } else {
        PlayerFlag::Loser
    })
}

fn flag_from_telemetry_result(ctx: &FlagContext<'_>) -> Option<PlayerFlag> {
    match ctx.telemetry_result?.to_uppercase().as_str() {
        "WIN" => Some(PlayerFlag::Winner),
        "LOSS" | "LEAVE" => Some(PlayerFlag::Loser),
        "DRAW" => Some(PlayerFlag::Drawer),
        _ => None,
    }
}

fn flag_from_player_fields(ctx: &FlagContext<'_>) -> Option<PlayerFlag> {
    if ctx.player.reports_win() {
        Some(PlayerFlag::Winner)
    } else if ctx.player.reports_loss() {
        Some(PlayerFlag::Loser)
    } else {
        None
    }
}

fn flag_from_mission_records(ctx: &FlagContext<'_>) -> Option<PlayerFlag> {
    let keys = PlayerKeys::new(ctx.player);
    for (mission_key, entries) in ctx.lookup {
        if !keys.scopes(mission_key) {
            continue;
        }
        for (key, value) in entries {
            if is_winner_signal(key, value) {
                debug!(player = %ctx.player.name, mission_key, key, "winner flag in mission record");
                return Some(PlayerFlag::Winner);
            }
            if is_player_loser_signal(key, value) {
                debug!(player = %ctx.player.name, mission_key, key, "loser flag in mission record");
                return Some(PlayerFlag::Loser);
            }
        }
    }
    None
}

const FLAG_STAGES: [FlagStage; 4] = [
    flag_from_winning_team,
    flag_from_telemetry_result,
    flag_from_player_fields,
    flag_from_mission_records,
];

const FLAG_STAGES_TELEMETRY_FIRST: [FlagStage; 4] = [
    flag_from_telemetry_result,
    flag_from_winning_team,
    flag_from_player_fields,
    flag_from_mission_records,
];

/// Runs the per-player flag waterfall, falling back to [`PlayerFlag::Drawer`].
pub fn derive_flag(ctx: &FlagContext<'_>, prefer_telemetry_result: bool) -> PlayerFlag {
    let stages = if prefer_telemetry_result {
        &FLAG_STAGES_TELEMETRY_FIRST
    } else {
        &FLAG_STAGES
    };
    if let Some(flag) = stages.iter().find_map(|stage| stage(ctx)) {
        return flag;
    }
    warn!(
        player = %ctx.player.name,
        pid = %ctx.player.id,
        team = %ctx.player.teamid,
        "could not determine player flag, defaulting to drawer"
    );
    PlayerFlag::Drawer
}

/// On a team with at least one loser, undetermined players lost too.
pub fn promote_drawers_on_losing_teams(teams: &[TeamId], flags: &mut [PlayerFlag]) {
    debug_assert_eq!(teams.len(), flags.len());
    let losing: HashSet<TeamId> = teams
        .iter()
        .zip(flags.iter())
        .filter(|(_, flag)| **flag == PlayerFlag::Loser)
        .map(|(team, _)| *team)
        .collect();
    for (team, flag) in teams.iter().zip(flags.iter_mut()) {
        if *flag == PlayerFlag::Drawer && losing.contains(team) {
            debug!(%team, "converting drawer to loser, teammate is a loser");
            *flag = PlayerFlag::Loser;
        }
    }
}
