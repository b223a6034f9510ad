//! core::snapshot
//!
//! Immutable per-version resource fork.
//!
//! A [`Snapshot`] is the decoded resource fork of one OS release. It is
//! built once from the records a provider returns and never changes
//! afterwards; builds share it behind an `Arc`.

use super::ownership::owns;
use super::types::{ResourceKey, ResourceRecord, VersionLabel};

/// The resource fork of one OS release, in provider order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    label: VersionLabel,
    records: Vec<ResourceRecord>,
}

impl Snapshot {
    /// Create a snapshot from decoded records.
    pub fn new(label: VersionLabel, records: Vec<ResourceRecord>) -> Self {
        Self { label, records }
    }

    /// The release this snapshot was loaded from.
    pub fn label(&self) -> &VersionLabel {
        &self.label
    }

    /// All records, in the order the provider returned them.
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    /// Find the first record with the given key.
    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceRecord> {
        self.records.iter().find(|r| r.key == *key)
    }

    /// Records whose ids mark them as owned by `owner`.
    ///
    /// Only this snapshot's records are scanned, and only one level deep.
    pub fn owned_by<'a>(
        &'a self,
        owner: &'a ResourceKey,
    ) -> impl Iterator<Item = &'a ResourceRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| owns(owner.res_type, owner.id, r.key.id))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the snapshot has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ownership::owned_id;
    use crate::core::types::ResType;

    fn key(code: &str, id: i16) -> ResourceKey {
        ResourceKey::new(ResType::new(code).unwrap(), id)
    }

    fn snapshot() -> Snapshot {
        let pack = ResType::new("PACK").unwrap();
        Snapshot::new(
            VersionLabel::new("8.1.0").unwrap(),
            vec![
                ResourceRecord::new(key("PACK", 2), b"pack".to_vec()),
                ResourceRecord::new(key("STR#", owned_id(pack, 2, 0).unwrap()), b"s0".to_vec()),
                ResourceRecord::new(key("DITL", owned_id(pack, 2, 1).unwrap()), b"d1".to_vec()),
                ResourceRecord::new(key("STR#", owned_id(pack, 3, 0).unwrap()), b"other".to_vec()),
                ResourceRecord::new(key("ptch", 41), b"ptch".to_vec()),
            ],
        )
    }

    #[test]
    fn get_finds_by_key() {
        let snap = snapshot();
        assert_eq!(snap.get(&key("ptch", 41)).unwrap().data, b"ptch");
        assert!(snap.get(&key("ptch", 42)).is_none());
    }

    #[test]
    fn owned_by_scans_ids_only() {
        let snap = snapshot();
        let owner = key("PACK", 2);
        let owned: Vec<_> = snap.owned_by(&owner).map(|r| r.data.clone()).collect();
        assert_eq!(owned, vec![b"s0".to_vec(), b"d1".to_vec()]);
    }

    #[test]
    fn owned_by_non_owner_type_is_empty() {
        let snap = snapshot();
        assert_eq!(snap.owned_by(&key("ptch", 41)).count(), 0);
    }

    #[test]
    fn len_and_label() {
        let snap = snapshot();
        assert_eq!(snap.len(), 5);
        assert!(!snap.is_empty());
        assert_eq!(snap.label().as_str(), "8.1.0");
    }
}
