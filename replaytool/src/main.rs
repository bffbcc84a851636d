mod config;

use std::path::Path;

use anyhow::Context;
use clap::{App, Arg};
use tracing::info;

use itt_replays::{JsonReplayDecoder, ParseOptionsBuilder, ParserConfig, ReplayParser};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn app() -> App<'static, 'static> {
    App::new("ITT Replay Tool")
        .about("Extracts telemetry and match outcome from a decoded Island Troll Tribes replay")
        .arg(
            Arg::with_name("CONFIG")
                .help("Path to a parser config TOML file")
                .short("c")
                .long("config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PRINT_DEFAULT_CONFIG")
                .help("Print the default config file and exit")
                .long("print-default-config"),
        )
        .arg(
            Arg::with_name("SCHEDULED_GAME_ID")
                .help("Game id assigned by the scheduler, used instead of the replay seed")
                .long("scheduled-game-id")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("DATETIME")
                .help("Timestamp to record for the game")
                .long("datetime")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("CATEGORY")
                .help("Category to use when the team layout does not name one")
                .long("category")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("MIN_PLAYERS")
                .help("Reject replays with fewer players")
                .long("min-players")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("PREFER_TELEMETRY_RESULT")
                .help("Trust the telemetry WIN/LOSS label over the resolved winning team")
                .long("prefer-telemetry-result"),
        )
        .arg(
            Arg::with_name("NO_DRAWER_PROMOTION")
                .help("Keep undetermined players as drawers even when a teammate lost")
                .long("no-drawer-promotion"),
        )
        .arg(
            Arg::with_name("GAME_ONLY")
                .help("Print only the game record instead of the full parse result")
                .long("game-only"),
        )
        .arg(
            Arg::with_name("VERBOSE")
                .help("Log pipeline decisions to stderr")
                .short("v")
                .long("verbose"),
        )
        .arg(
            Arg::with_name("REPLAY")
                .help("Decoded replay JSON file to process")
                .required_unless("PRINT_DEFAULT_CONFIG")
                .index(1),
        )
}

fn main() -> anyhow::Result<()> {
    let matches = app().get_matches();

    if matches.is_present("PRINT_DEFAULT_CONFIG") {
        print!("{}", ParserConfig::generate_default_toml());
        return Ok(());
    }

    init_tracing(matches.is_present("VERBOSE"));

    let mut parser_config = match matches.value_of("CONFIG") {
        Some(path) => config::load(Path::new(path))?,
        None => ParserConfig::default(),
    };
    config::apply_cli_overrides(&mut parser_config, &matches)?;

    let mut options = ParseOptionsBuilder::default();
    if let Some(id) = matches.value_of("SCHEDULED_GAME_ID") {
        let id: u64 = id
            .parse()
            .with_context(|| format!("invalid --scheduled-game-id value {id:?}"))?;
        options.scheduled_game_id(id);
    }
    if let Some(datetime) = matches.value_of("DATETIME") {
        options.fallback_datetime(datetime);
    }
    if let Some(category) = matches.value_of("CATEGORY") {
        options.fallback_category(category);
    }
    let options = options.build()?;

    let replay_path = matches
        .value_of("REPLAY")
        .context("a replay file is required")?;
    let bytes = std::fs::read(replay_path)
        .with_context(|| format!("failed to read replay {replay_path}"))?;

    let parser = ReplayParser::new(parser_config);
    let result = parser
        .parse(&JsonReplayDecoder, &bytes, &options)
        .with_context(|| format!("failed to parse replay {replay_path}"))?;
    info!(
        game_id = result.game_data.game_id,
        warnings = result.summary.warnings.len(),
        "done"
    );

    let json = if matches.is_present("GAME_ONLY") {
        serde_json::to_string_pretty(&result.game_data)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");
    Ok(())
}
