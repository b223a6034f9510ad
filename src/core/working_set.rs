//! core::working_set
//!
//! The mutable, deduplicated resource set of one build.
//!
//! # Invariants
//!
//! - At most one record per [`ResourceKey`] at all times
//! - [`WorkingSet::upsert`] is the only mutator; the last write for a key wins
//! - Iteration order is unspecified; output order comes from
//!   [`crate::engine::canonical`]

use std::collections::HashMap;

use super::snapshot::Snapshot;
use super::types::{ResourceKey, ResourceRecord};

/// Key→record store seeded from a base snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    records: HashMap<ResourceKey, ResourceRecord>,
}

impl WorkingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-copy every record of `snapshot` into a fresh set.
    ///
    /// If the snapshot holds the same key twice, the later record wins,
    /// exactly as if each had been upserted in order.
    pub fn load(snapshot: &Snapshot) -> Self {
        let mut set = Self::new();
        for record in snapshot.records() {
            set.upsert(record.clone());
        }
        set
    }

    /// Look up a record by key.
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceRecord> {
        self.records.get(key)
    }

    /// Insert a record, replacing any record with the same key.
    ///
    /// Returns `true` if a record was replaced. The flag is diagnostic only.
    pub fn upsert(&mut self, record: ResourceRecord) -> bool {
        self.records.insert(record.key, record).is_some()
    }

    /// Unordered view of all records.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    /// Consume the set, yielding its records in unspecified order.
    pub fn into_records(self) -> Vec<ResourceRecord> {
        self.records.into_values().collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResType, VersionLabel};

    fn record(code: &str, id: i16, data: &[u8]) -> ResourceRecord {
        ResourceRecord::new(ResourceKey::new(ResType::new(code).unwrap(), id), data)
    }

    #[test]
    fn load_copies_every_record() {
        let snap = Snapshot::new(
            VersionLabel::new("7.6.1").unwrap(),
            vec![record("ptch", 0, b"a"), record("boot", 2, b"b")],
        );
        let set = WorkingSet::load(&snap);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&record("boot", 2, b"").key).unwrap().data, b"b");
        // The snapshot is untouched
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn load_deduplicates_later_wins() {
        let snap = Snapshot::new(
            VersionLabel::new("7.6.1").unwrap(),
            vec![record("ptch", 0, b"first"), record("ptch", 0, b"second")],
        );
        let set = WorkingSet::load(&snap);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&record("ptch", 0, b"").key).unwrap().data, b"second");
    }

    #[test]
    fn upsert_reports_replacement() {
        let mut set = WorkingSet::new();
        assert!(!set.upsert(record("ptch", 41, b"a")));
        assert!(set.upsert(record("ptch", 41, b"b")));
        assert!(!set.upsert(record("ptch", 42, b"c")));
    }

    #[test]
    fn upsert_is_idempotent() {
        let r = record("gtbl", 6, b"table");
        let mut once = WorkingSet::new();
        once.upsert(r.clone());

        let mut twice = WorkingSet::new();
        twice.upsert(r.clone());
        twice.upsert(r);

        assert_eq!(once, twice);
    }

    #[test]
    fn upsert_last_write_wins() {
        let mut set = WorkingSet::new();
        set.upsert(record("gpch", 750, b"old"));
        set.upsert(record("gpch", 750, b"new"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&record("gpch", 750, b"").key).unwrap().data, b"new");
    }

    #[test]
    fn same_id_different_type_are_distinct() {
        let mut set = WorkingSet::new();
        set.upsert(record("STR#", -20574, b"s"));
        set.upsert(record("TEXT", -20574, b"t"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn get_missing_is_none() {
        let set = WorkingSet::new();
        assert!(set.get(&record("boot", 3, b"").key).is_none());
        assert!(set.is_empty());
    }
}
