//! core::ownership
//!
//! Owned-resource id decoding.
//!
//! Some resource types (drivers, definition procedures, packages) own other
//! resources that must travel with them. Ownership is not stored anywhere: it
//! is encoded in the owned resource's id. The 16-bit id is read as:
//!
//! ```text
//!  15 14 | 13 12 11 | 10  9  8  7  6  5 | 4  3  2  1  0
//!   1  1 |  owner   |     owner id      |   sub-index
//!        |  type    |                   |
//! ```
//!
//! The owner-type field indexes [`OWNER_TYPES`]. Only one level is decoded:
//! an owned resource is never itself considered as an owner.

use super::types::ResType;

/// Resource types that may own other resources, in bit-field index order.
pub const OWNER_TYPES: [ResType; 6] = [
    ResType::from_bytes(*b"DRVR"),
    ResType::from_bytes(*b"WDEF"),
    ResType::from_bytes(*b"MDEF"),
    ResType::from_bytes(*b"CDEF"),
    ResType::from_bytes(*b"PDEF"),
    ResType::from_bytes(*b"PACK"),
];

/// Both of these bits must be set for an id to be in the owned range.
pub const OWNED_MARKER: u16 = 0b11 << 14;

/// Offset of the owner-type index field.
pub const OWNER_TYPE_SHIFT: u32 = 11;

/// Width of the owner-type index field.
pub const OWNER_TYPE_BITS: u32 = 3;

/// Offset of the owner id field.
pub const OWNER_ID_SHIFT: u32 = 5;

/// Width of the owner id field.
pub const OWNER_ID_BITS: u32 = 6;

/// Width of the sub-index field below the owner id.
pub const SUB_INDEX_BITS: u32 = OWNER_ID_SHIFT;

const fn mask(bits: u32) -> u16 {
    (1 << bits) - 1
}

/// Check whether the resource `(owner_type, owner_id)` owns the resource
/// whose id is `candidate_id`.
///
/// The candidate's type plays no part; only its id is decoded.
///
/// # Example
///
/// ```
/// use forkmerge::core::ownership::owns;
/// use forkmerge::core::types::ResType;
///
/// let drvr = ResType::new("DRVR").unwrap();
/// // 0xC000 | (0 << 11) | (5 << 5)
/// assert!(owns(drvr, 5, 0xC0A0_u16 as i16));
/// assert!(!owns(drvr, 6, 0xC0A0_u16 as i16));
/// ```
pub fn owns(owner_type: ResType, owner_id: i16, candidate_id: i16) -> bool {
    let bits = candidate_id as u16;
    if bits & OWNED_MARKER != OWNED_MARKER {
        return false;
    }

    let type_index = usize::from((bits >> OWNER_TYPE_SHIFT) & mask(OWNER_TYPE_BITS));
    let encoded_id = (bits >> OWNER_ID_SHIFT) & mask(OWNER_ID_BITS);

    OWNER_TYPES.get(type_index) == Some(&owner_type) && i32::from(encoded_id) == i32::from(owner_id)
}

/// Encode the id of the `sub_index`-th resource owned by `(owner_type, owner_id)`.
///
/// Returns `None` if the owner type is not in [`OWNER_TYPES`], or if the
/// owner id or sub-index does not fit its field.
///
/// # Example
///
/// ```
/// use forkmerge::core::ownership::{owned_id, owns};
/// use forkmerge::core::types::ResType;
///
/// let pack = ResType::new("PACK").unwrap();
/// let id = owned_id(pack, 2, 0).unwrap();
/// assert!(owns(pack, 2, id));
/// assert_eq!(owned_id(pack, 64, 0), None);
/// ```
pub fn owned_id(owner_type: ResType, owner_id: i16, sub_index: u8) -> Option<i16> {
    let type_index = OWNER_TYPES.iter().position(|t| *t == owner_type)?;
    let owner_id = u16::try_from(owner_id).ok().filter(|id| *id <= mask(OWNER_ID_BITS))?;
    let sub_index = u16::from(sub_index);
    if sub_index > mask(SUB_INDEX_BITS) {
        return None;
    }

    // type_index < OWNER_TYPES.len(), so the cast cannot truncate
    let bits = OWNED_MARKER
        | ((type_index as u16) << OWNER_TYPE_SHIFT)
        | (owner_id << OWNER_ID_SHIFT)
        | sub_index;
    Some(bits as i16)
}
