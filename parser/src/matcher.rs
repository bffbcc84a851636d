use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::container::ContainerPlayer;
use crate::telemetry::TelemetryPlayer;
use crate::types::normalize_name;

/// Which rule paired a container player with a telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchTier {
    SlotIndex,
    ExactName,
    /// Container name with `#` spelled as `_`, the way the map writes battle tags
    UnderscoredName,
    NormalizedName,
}

type TierPredicate = fn(&ContainerPlayer, &TelemetryPlayer) -> bool;

const TIERS: [(MatchTier, TierPredicate); 4] = [
    (MatchTier::SlotIndex, same_slot),
    (MatchTier::ExactName, same_name),
    (MatchTier::UnderscoredName, same_underscored_name),
    (MatchTier::NormalizedName, same_normalized_name),
];

fn same_slot(player: &ContainerPlayer, record: &TelemetryPlayer) -> bool {
    record.slot_index == player.id.raw()
}

fn same_name(player: &ContainerPlayer, record: &TelemetryPlayer) -> bool {
    record.name == player.name
}

fn same_underscored_name(player: &ContainerPlayer, record: &TelemetryPlayer) -> bool {
    player.name.contains('#') && record.name == player.name.replace('#', "_")
}

fn same_normalized_name(player: &ContainerPlayer, record: &TelemetryPlayer) -> bool {
    let normalized = normalize_name(&player.name);
    !normalized.is_empty() && normalize_name(&record.name) == normalized
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerMatch<'a> {
    pub record: &'a TelemetryPlayer,
    pub tier: MatchTier,
}

/// Pairs container players with telemetry records for one replay.
///
/// A telemetry record (and the slot it reports) is handed out at most once,
/// so construct a fresh matcher per replay.
pub struct IdentityMatcher<'a> {
    records: &'a [TelemetryPlayer],
    matched: HashSet<usize>,
    consumed_slots: HashSet<u32>,
}

impl<'a> IdentityMatcher<'a> {
    pub fn new(records: &'a [TelemetryPlayer]) -> Self {
        Self {
            records,
            matched: HashSet::new(),
            consumed_slots: HashSet::new(),
        }
    }

    fn available(&self, index: usize, record: &TelemetryPlayer) -> bool {
        !self.matched.contains(&index) && !self.consumed_slots.contains(&record.slot_index)
    }

    /// Finds the telemetry record for `player`, trying each tier in order.
    pub fn match_player(&mut self, player: &ContainerPlayer) -> Option<PlayerMatch<'a>> {
        let records = self.records;
        let hit = TIERS.iter().find_map(|(tier, predicate)| {
            records
                .iter()
                .enumerate()
                .find(|(index, record)| self.available(*index, record) && predicate(player, record))
                .map(|(index, record)| (index, record, *tier))
        });

        match hit {
            Some((index, record, tier)) => {
                self.matched.insert(index);
                self.consumed_slots.insert(record.slot_index);
                debug!(
                    player = %player.name,
                    pid = %player.id,
                    slot = record.slot_index,
                    ?tier,
                    "matched player to telemetry"
                );
                Some(PlayerMatch { record, tier })
            }
            None => {
                warn!(
                    name = %player.name,
                    id = %player.id,
                    "could not match player to telemetry"
                );
                None
            }
        }
    }

    /// Matches every player in container order.
    pub fn match_all(
        records: &'a [TelemetryPlayer],
        players: &[ContainerPlayer],
    ) -> Vec<Option<PlayerMatch<'a>>> {
        let mut matcher = IdentityMatcher::new(records);
        players.iter().map(|p| matcher.match_player(p)).collect()
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerId, TeamId};

    fn container(id: u32, name: &str) -> ContainerPlayer {
        ContainerPlayer {
            id: PlayerId(id),
            name: name.to_string(),
            teamid: TeamId(0),
            ..Default::default()
        }
    }

    fn record(slot_index: u32, name: &str) -> TelemetryPlayer {
        TelemetryPlayer {
            slot_index,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn slot_index_beats_name() {
        let records = [record(2, "Bar"), record(5, "Foo")];
        let found = IdentityMatcher::new(&records)
            .match_player(&container(2, "Foo"))
            .unwrap();
        assert_eq!(found.record.slot_index, 2);
        assert_eq!(found.tier, MatchTier::SlotIndex);
    }

    #[test]
    fn name_tiers_in_order() {
        let records = [record(10, "foo_1"), record(11, "Foo#1"), record(12, "Foo_1")];
        let mut matcher = IdentityMatcher::new(&records);
        let exact = matcher.match_player(&container(1, "Foo#1")).unwrap();
        assert_eq!((exact.record.slot_index, exact.tier), (11, MatchTier::ExactName));
        let underscored = matcher.match_player(&container(2, "Foo#1")).unwrap();
        assert_eq!(
            (underscored.record.slot_index, underscored.tier),
            (12, MatchTier::UnderscoredName)
        );
        let normalized = matcher.match_player(&container(3, "FOO#1")).unwrap();
        assert_eq!(
            (normalized.record.slot_index, normalized.tier),
            (10, MatchTier::NormalizedName)
        );
        assert_eq!(matcher.matched_count(), 3);
    }

    #[test]
    fn a_record_is_used_once() {
        let records = [record(9, "Troll")];
        let matches =
            IdentityMatcher::match_all(&records, &[container(1, "troll"), container(2, "TROLL!")]);
        assert_eq!(matches.iter().filter(|m| m.is_some()).count(), 1);
        assert!(matches[0].is_some());
        assert!(matches[1].is_none());
    }

    #[test]
    fn slot_match_consumes_the_record_for_later_name_matches() {
        let records = [record(1, "Foo"), record(2, "Bar")];
        let matches =
            IdentityMatcher::match_all(&records, &[container(1, "Bar"), container(7, "Foo")]);
        assert_eq!(matches[0].unwrap().record.name, "Foo");
        assert!(matches[1].is_none());
    }

    #[test]
    fn duplicate_slot_indices_are_consumed_together() {
        let records = [record(4, "Foo"), record(4, "Foo")];
        let matches =
            IdentityMatcher::match_all(&records, &[container(4, "x"), container(8, "Foo")]);
        assert!(matches[0].is_some());
        assert!(matches[1].is_none());
    }

    #[test]
    fn matchers_do_not_share_state() {
        let records = [record(1, "Foo")];
        let first = IdentityMatcher::match_all(&records, &[container(1, "Foo")]);
        let second = IdentityMatcher::match_all(&records, &[container(1, "Foo")]);
        assert!(first[0].is_some());
        assert!(second[0].is_some());
    }
}
