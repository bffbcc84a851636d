use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::scanner::FragmentMap;
use crate::config::ParserConfig;
use crate::types::parse_int_prefix;

/// Missing chunk indices reported in the log, at most.
const LOGGED_MISSING_CHUNKS: usize = 8;

/// The telemetry payload reassembled from its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedPayload {
    pub payload: String,
    /// Declared schema revision (`itt_schema`)
    pub schema: Option<u32>,
    /// Free-form map version tag (`itt_version`), informational only
    pub version: Option<String>,
    pub declared_chunks: usize,
    /// Declared chunks with no fragment
    pub missing_chunks: usize,
}

/// Index of a `<prefix>data_<n>` fragment, spelled without leading zeros.
fn chunk_index(identifier: &str, chunk_prefix: &str) -> Option<usize> {
    let digits = identifier.strip_prefix(chunk_prefix)?;
    let index: usize = digits.parse().ok()?;
    (index.to_string() == digits).then_some(index)
}

/// Reassembles the chunked payload, or `None` when the replay carries no telemetry.
///
/// Chunks are concatenated in index order. An absent chunk contributes nothing.
/// Work is bounded by the fragments actually present, whatever count is declared.
pub fn reconstruct(fragments: &FragmentMap, config: &ParserConfig) -> Option<ReconstructedPayload> {
    let chunk_count = fragments
        .get(&config.fragment_name("chunks"))
        .and_then(parse_int_prefix)
        .filter(|n| *n > 0)?;
    let declared_chunks = usize::try_from(chunk_count).unwrap_or(usize::MAX);

    let chunk_prefix = config.fragment_name("data_");
    let present: BTreeMap<usize, &str> = fragments
        .iter()
        .filter_map(|(identifier, data)| {
            chunk_index(identifier, &chunk_prefix).map(|index| (index, data))
        })
        .filter(|(index, _)| *index < declared_chunks)
        .collect();
    let joined: String = present.values().copied().collect();

    let missing_chunks = declared_chunks - present.len();
    if missing_chunks > 0 {
        let first_missing: Vec<usize> = (0..declared_chunks)
            .filter(|index| !present.contains_key(index))
            .take(LOGGED_MISSING_CHUNKS)
            .collect();
        warn!(
            declared_chunks,
            missing_chunks,
            first_missing = ?first_missing,
            "telemetry payload has missing chunks"
        );
    }

    let schema = fragments
        .get(&config.fragment_name("schema"))
        .and_then(parse_int_prefix)
        .and_then(|v| u32::try_from(v).ok());
    let version = fragments
        .get(&config.fragment_name("version"))
        .map(str::to_string);

    let payload = unescape(&joined);
    debug!(
        declared_chunks,
        schema,
        version = version.as_deref(),
        len = payload.len(),
        "reconstructed telemetry payload"
    );

    Some(ReconstructedPayload {
        payload,
        schema,
        version,
        declared_chunks,
        missing_chunks,
    })
}

/// Undoes the emitter's escaping: `\X` becomes `X` for any character except a
/// line break. A trailing lone backslash is kept.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if !matches!(next, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
