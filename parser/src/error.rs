use thiserror::Error;

/// Boxed error produced by a [`crate::ReplayDecoder`] implementation.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a replay parse.
///
/// Everything else the pipeline runs into (missing chunks, malformed lines,
/// unmatched players, no winner) is degraded locally and never surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode replay container: {0}")]
    Decode(#[source] DecodeError),
    #[error("replay does not contain at least {required} players (found {found})")]
    NotEnoughPlayers { found: usize, required: usize },
    #[error("failed to persist game {game_id}: {source}")]
    Store {
        game_id: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("failed to read parser config: {0}")]
    Config(#[from] toml::de::Error),
}
