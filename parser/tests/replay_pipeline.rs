use itt_replays::telemetry::{BuildingStatus, CraftStatus};
use itt_replays::{
    JsonReplayDecoder, MemoryGameStore, ParseOptions, ParseOptionsBuilder, ParserConfig,
    PlayerFlag, ReplayParser, WinnerSource, ingest_replay, parse_replay,
};
use pretty_assertions::assert_eq;

const SCHEMA8: &[u8] = include_bytes!("fixtures/itt_schema8.json");

#[test]
fn schema8_replay_end_to_end() {
    let result = parse_replay(&JsonReplayDecoder, SCHEMA8, &ParseOptions::default()).unwrap();

    let itt = result.itt_metadata.as_ref().expect("telemetry present");
    assert_eq!(itt.schema, Some(8));
    assert_eq!(itt.version.as_deref(), Some("3.2.1"));
    assert_eq!(itt.players.len(), 2);
    assert_eq!(itt.players[1].name, "Bravo");

    let buildings = itt.building_events.as_ref().unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].building_id, 1213484355);
    assert_eq!(buildings[0].status, BuildingStatus::Start);
    let crafts = itt.craft_events.as_ref().unwrap();
    assert_eq!(crafts.len(), 1);
    assert_eq!(crafts[0].status, CraftStatus::Success);

    let game = &result.game_data;
    assert_eq!(game.game_id, 918273);
    assert_eq!(game.duration, 1805);
    assert_eq!(game.gamename, "ITT 1v1 #17");
    assert_eq!(game.map, "Maps\\Download\\IslandTrollTribes.w3x");
    assert_eq!(game.creator_name, "HostBot");
    assert_eq!(game.category.as_deref(), Some("1v1"));
    assert_eq!(game.datetime, None);

    let alpha = &game.players[0];
    assert_eq!(alpha.name, "Alpha#1234");
    assert_eq!(alpha.flag, PlayerFlag::Winner);
    assert_eq!(alpha.kills, Some(9));
    assert_eq!(alpha.damage_dealt, Some(1500));
    let inventory = alpha.inventory.as_ref().unwrap();
    assert_eq!(inventory.items(), &[1001, 1002]);
    assert_eq!(inventory.item_charges(), &[1, 3]);

    let bravo = &game.players[1];
    assert_eq!(bravo.flag, PlayerFlag::Loser);
    assert_eq!(bravo.class.as_deref(), Some("MAGE"));
    assert_eq!(bravo.itt.kills_panther, 6);

    assert_eq!(result.summary.winner_source, Some(WinnerSource::LoserElimination));
    assert_eq!(result.summary.mission_records, 2);
    assert_eq!(result.telemetry_lookup["bravo"].len(), 1);
}

#[test]
fn serialized_record_uses_storage_field_names() {
    let result = parse_replay(&JsonReplayDecoder, SCHEMA8, &ParseOptions::default()).unwrap();
    let json = serde_json::to_value(&result.game_data).unwrap();
    assert_eq!(json["gameId"], 918273);
    assert_eq!(json["ownername"], "HostBot");
    let alpha = &json["players"][0];
    assert_eq!(alpha["flag"], "winner");
    assert_eq!(alpha["pid"], 0);
    assert_eq!(alpha["damageDealt"], 1500);
    assert_eq!(alpha["killsElk"], 4);
    assert_eq!(alpha["itemCharges"], serde_json::json!([1, 3]));
}

#[test]
fn scheduled_id_and_store() {
    let options = ParseOptionsBuilder::default()
        .scheduled_game_id(55u64)
        .fallback_datetime("2025-03-01T20:00:00Z")
        .build()
        .unwrap();
    let mut store = MemoryGameStore::default();
    let result = ingest_replay(
        &ReplayParser::default(),
        &JsonReplayDecoder,
        &mut store,
        SCHEMA8,
        &options,
    )
    .unwrap();
    assert_eq!(result.game_data.game_id, 55);
    assert_eq!(store.get(55), Some(&result.game_data));
}

#[test]
fn telemetry_label_can_take_precedence() {
    // container claims team 1 won, telemetry says Alpha (team 0) won
    let mut replay: serde_json::Value = serde_json::from_slice(SCHEMA8).unwrap();
    replay["winningTeamId"] = serde_json::json!(1);
    let bytes = serde_json::to_vec(&replay).unwrap();
    let flags = |config: ParserConfig| -> Vec<PlayerFlag> {
        ReplayParser::new(config)
            .parse(&JsonReplayDecoder, &bytes, &ParseOptions::default())
            .unwrap()
            .game_data
            .players
            .iter()
            .map(|p| p.flag)
            .collect()
    };

    assert_eq!(
        flags(ParserConfig::default()),
        [PlayerFlag::Loser, PlayerFlag::Winner]
    );
    assert_eq!(
        flags(ParserConfig {
            prefer_telemetry_result: true,
            ..Default::default()
        }),
        [PlayerFlag::Winner, PlayerFlag::Loser]
    );
}

#[test]
fn min_players_is_configurable() {
    let parser = ReplayParser::new(ParserConfig {
        min_players: 3,
        ..Default::default()
    });
    let err = parser
        .parse(&JsonReplayDecoder, SCHEMA8, &ParseOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "replay does not contain at least 3 players (found 2)"
    );
}

#[test]
fn hostile_but_well_formed_replay_degrades() {
    let json = br#"{
        "players": [
            {"id": 0, "name": "Alpha", "teamid": 0},
            {"id": 1, "name": "Bravo", "teamid": 1}
        ],
        "duration": 18446744073709551615,
        "randomseed": 3,
        "w3mmd": [
            {"cache": {"missionKey": "val:0", "key": "custom itt_chunks 4000000000"}, "value": 0},
            {"cache": {"missionKey": "val:1", "key": "custom itt_schema 8"}, "value": 0},
            {"cache": {"missionKey": "val:2", "key": "custom itt_data_0 player:0|Alpha|0"}, "value": 0},
            {"cache": {"missionKey": "alpha", "key": "winner"}, "value": true}
        ]
    }"#;
    let result = parse_replay(&JsonReplayDecoder, json, &ParseOptions::default()).unwrap();
    assert_eq!(result.game_data.duration, u64::MAX / 1000 + 1);
    assert!(result.summary.itt_metadata_found);
    assert!(result.itt_metadata.unwrap().players.is_empty());
    assert_eq!(result.summary.winner_source, None);
    assert_eq!(result.summary.drawers, 2);
}
