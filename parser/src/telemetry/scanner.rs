use std::collections::BTreeMap;

use nom::IResult;
use nom::bytes::complete::{tag, take_till};
use nom::character::complete::char;
use nom::combinator::{recognize, rest};
use nom::sequence::{pair, preceded, separated_pair};
use serde::Serialize;
use tracing::trace;

use crate::config::ParserConfig;
use crate::container::ActionRecord;

/// Identifier -> fragment data for every telemetry custom message in a replay.
///
/// Built once from the full action list and read-only afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FragmentMap {
    fragments: BTreeMap<String, String>,
}

impl FragmentMap {
    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.fragments.get(identifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FragmentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fragments: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// `<marker><prefix>identifier data...`, split at the first space after the identifier.
fn custom_message<'a>(
    marker: &str,
    prefix: &str,
    input: &'a str,
) -> IResult<&'a str, (&'a str, &'a str)> {
    preceded(
        tag(marker),
        separated_pair(
            recognize(pair(tag(prefix), take_till(|c| c == ' '))),
            char(' '),
            rest,
        ),
    )(input)
}

/// Collects the telemetry fragments out of a replay's action records.
///
/// Records without a string cache key, or whose key is not a telemetry custom
/// message, are skipped. A repeated identifier keeps the last value seen.
pub fn scan_actions(actions: &[ActionRecord], config: &ParserConfig) -> FragmentMap {
    let mut fragments = BTreeMap::new();
    for action in actions {
        let Some(key) = action.cache_key() else {
            continue;
        };
        if let Ok((_, (identifier, data))) = custom_message(
            &config.custom_message_marker,
            &config.fragment_prefix,
            key,
        ) {
            trace!(identifier, len = data.len(), "telemetry fragment");
            fragments.insert(identifier.to_string(), data.to_string());
        }
    }
    FragmentMap { fragments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ActionCache;

    fn action(key: serde_json::Value) -> ActionRecord {
        ActionRecord {
            cache: Some(ActionCache {
                filename: Some("MMD.Dat".to_string()),
                mission_key: Some("val:0".to_string()),
                key: Some(key),
            }),
            value: None,
        }
    }

    fn custom(key: &str) -> ActionRecord {
        action(serde_json::Value::String(key.to_string()))
    }

    #[test]
    fn extracts_identifier_and_data() {
        let map = scan_actions(
            &[
                custom("custom itt_chunks 2"),
                custom("custom itt_data_0 player:1|Foo bar"),
            ],
            &ParserConfig::default(),
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("itt_chunks"), Some("2"));
        // only the first space separates identifier from data
        assert_eq!(map.get("itt_data_0"), Some("player:1|Foo bar"));
    }

    #[test]
    fn ignores_foreign_and_malformed_records() {
        let map = scan_actions(
            &[
                custom("init pid 1 Foo"),
                custom("custom other_thing 1"),
                custom("custom itt_nospace"),
                custom("itt_data_0 missing marker"),
                action(serde_json::json!(5)),
                ActionRecord::default(),
            ],
            &ParserConfig::default(),
        );
        assert!(map.is_empty());
    }

    #[test]
    fn later_duplicate_wins() {
        let map = scan_actions(
            &[custom("custom itt_schema 3"), custom("custom itt_schema 4")],
            &ParserConfig::default(),
        );
        assert_eq!(map.get("itt_schema"), Some("4"));
    }

    #[test]
    fn honours_configured_prefix() {
        let config = ParserConfig {
            fragment_prefix: "tt_".to_string(),
            ..ParserConfig::default()
        };
        let map = scan_actions(&[custom("custom tt_chunks 1"), custom("custom itt_chunks 9")], &config);
        assert_eq!(map.get("tt_chunks"), Some("1"));
        assert_eq!(map.get("itt_chunks"), None);
    }
}
