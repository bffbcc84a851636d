pub mod config;
pub mod container;
mod error;
pub mod game;
pub mod matcher;
pub mod mission;
pub mod outcome;
pub mod pipeline;
pub mod telemetry;
pub mod types;

pub use error::*;
pub use strum;

pub use config::ParserConfig;
pub use container::{DecodedReplay, JsonReplayDecoder, ReplayDecoder};
pub use game::{GameRecord, PlayerRecord};
pub use outcome::{PlayerFlag, WinnerSource};
pub use pipeline::{
    GameStore, MemoryGameStore, ParseOptions, ParseOptionsBuilder, ParsingSummary,
    ReplayParseResult, ReplayParser, ingest_replay, parse_replay,
};
pub use telemetry::IttMetadata;
