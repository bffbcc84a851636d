use serde::{Deserialize, Serialize};

/// Parser configuration, loadable from a TOML file.
///
/// All fields default to the values the Island Troll Tribes map emits with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Prefix of cache keys that carry custom messages
    pub custom_message_marker: String,
    /// Prefix of the telemetry fragment identifiers
    pub fragment_prefix: String,
    /// Replays with fewer players are rejected
    pub min_players: usize,
    /// Consult the telemetry-reported result before the winning team
    pub prefer_telemetry_result: bool,
    /// Turn drawers into losers when a teammate is a loser
    pub promote_drawers_on_losing_team: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            custom_message_marker: "custom ".to_string(),
            fragment_prefix: "itt_".to_string(),
            min_players: 2,
            prefer_telemetry_result: false,
            promote_drawers_on_losing_team: true,
        }
    }
}

impl ParserConfig {
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Name of a fragment, e.g. `chunks` -> `itt_chunks`.
    pub fn fragment_name(&self, suffix: &str) -> String {
        format!("{}{}", self.fragment_prefix, suffix)
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        r#"# Replay parser configuration

# Cache-key prefix of custom messages embedded in the action stream
custom_message_marker = "custom "

# Prefix of the telemetry fragment identifiers (itt_chunks, itt_data_0, ...)
fragment_prefix = "itt_"

# Replays with fewer players than this are rejected
min_players = 2

# Trust the telemetry WIN/LOSS/LEAVE/DRAW label over every other signal
prefer_telemetry_result = false

# When a team has at least one loser, its undetermined players become losers
promote_drawers_on_losing_team = true
"#
        .to_string()
    }
}
