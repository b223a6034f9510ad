//! engine::canonical
//!
//! Canonical output order.
//!
//! The finished working set is emitted sorted by type code, then by id
//! ascending. Type codes compare as raw bytes, so the order never depends on
//! text encoding or locale, and never on insertion order.
//!
//! # Example
//!
//! ```
//! use forkmerge::core::types::{ResType, ResourceKey, ResourceRecord};
//! use forkmerge::core::working_set::WorkingSet;
//! use forkmerge::engine::canonical::canonical_order;
//!
//! let mut set = WorkingSet::new();
//! set.upsert(ResourceRecord::new(ResourceKey::new(ResType::new("zzzz").unwrap(), 5), vec![]));
//! set.upsert(ResourceRecord::new(ResourceKey::new(ResType::new("AAAA").unwrap(), -5), vec![]));
//!
//! let ordered = canonical_order(set);
//! assert_eq!(ordered[0].key.res_type.to_string(), "AAAA");
//! ```

use std::cmp::Ordering;

use sha2::{Digest, Sha256};

use crate::core::types::ResourceRecord;
use crate::core::working_set::WorkingSet;

/// Order two records canonically: type bytes, then id.
pub fn compare(a: &ResourceRecord, b: &ResourceRecord) -> Ordering {
    a.key
        .res_type
        .as_bytes()
        .cmp(b.key.res_type.as_bytes())
        .then(a.key.id.cmp(&b.key.id))
}

/// Consume a working set and return its records in canonical order.
pub fn canonical_order(set: WorkingSet) -> Vec<ResourceRecord> {
    let mut records = set.into_records();
    // Keys are unique, so no two records compare equal
    records.sort_unstable_by(compare);
    records
}

/// Hash an ordered record sequence for golden comparison.
///
/// Covers every field of every record, in sequence order.
pub fn digest(records: &[ResourceRecord]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(r.key.res_type.as_bytes());
        hasher.update(r.key.id.to_be_bytes());
        hasher.update([r.attributes]);
        match &r.name {
            Some(name) => {
                hasher.update([1]);
                hasher.update((name.len() as u64).to_be_bytes());
                hasher.update(name.as_bytes());
            }
            None => hasher.update([0]),
        }
        hasher.update((r.data.len() as u64).to_be_bytes());
        hasher.update(&r.data);
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
