use std::path::Path;

use anyhow::Context;
use clap::ArgMatches;
use itt_replays::ParserConfig;

/// Load parser config from a TOML file.
pub fn load(path: &Path) -> anyhow::Result<ParserConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = ParserConfig::from_toml_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// CLI flags override config file values.
pub fn apply_cli_overrides(
    config: &mut ParserConfig,
    matches: &ArgMatches<'_>,
) -> anyhow::Result<()> {
    if let Some(min) = matches.value_of("MIN_PLAYERS") {
        config.min_players = min
            .parse()
            .with_context(|| format!("invalid --min-players value {min:?}"))?;
    }
    if matches.is_present("PREFER_TELEMETRY_RESULT") {
        config.prefer_telemetry_result = true;
    }
    if matches.is_present("NO_DRAWER_PROMOTION") {
        config.promote_drawers_on_losing_team = false;
    }
    Ok(())
}
