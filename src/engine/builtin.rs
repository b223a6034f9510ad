//! engine::builtin
//!
//! The built-in HFS+ patch plan.
//!
//! Grafts the HFS+ support shipped with 8.1 onto earlier Systems:
//! - the HFS+ patch and its bootloader from 8.1.0
//! - the Disk Cache patch
//! - the Disk Initialization package and the strings and text it uses
//! - on Systems that do not chain-load `'ptch' -20217` themselves (before
//!   7.6), the 9.2.2 `'boot' 2`, which does
//! - three resources needed for 68k machines (found by bisecting 8.0 → 8.1)
//!
//! The Text Encoding Converter extension is also required at runtime. It
//! lives in the test bed, not in the System file.

use super::plan::{ConditionalGuard, GuardRef, Plan, PlanStep, SnapshotRef};
use crate::core::types::{ResType, VersionLabel};

/// Name of the built-in plan.
pub const HFS_PLUS_PLAN: &str = "hfs_plus";

/// The 68k instruction `MOVE.W #$B107,D0`.
///
/// Present in `'boot' 2` or `'boot' 3` of Systems that already load
/// `'ptch' -20217` on their own.
pub const MOVEW_B107_D0: [u8; 4] = [0x30, 0x3C, 0xB1, 0x07];

/// Release all HFS+ resources are taken from.
pub const HFS_PLUS_SOURCE: &str = "8.1.0";

/// Release whose `'boot' 2` chain-loads the HFS+ patch.
pub const BOOT_LOADER_SOURCE: &str = "9.2.2";

fn code(bytes: &[u8; 4]) -> ResType {
    ResType::from_bytes(*bytes)
}

fn release(label: &'static str) -> SnapshotRef {
    // Compile-time constants above; validation cannot fail for them
    match VersionLabel::new(label) {
        Ok(label) => SnapshotRef::Version(label),
        Err(_) => unreachable!("built-in release label '{label}' is valid"),
    }
}

fn copy(res_type: &[u8; 4], id: i16, note: &str) -> PlanStep {
    PlanStep::copy(release(HFS_PLUS_SOURCE), code(res_type), id).with_note(note)
}

/// Build the HFS+ plan.
///
/// # Example
///
/// ```
/// use forkmerge::engine::builtin::hfs_plus;
///
/// let plan = hfs_plus();
/// assert_eq!(plan.name, "hfs_plus");
/// assert!(plan.validate().is_ok());
/// ```
pub fn hfs_plus() -> Plan {
    Plan::new(HFS_PLUS_PLAN)
        // Main HFS+ resources
        .with_step(copy(b"ptch", -20217, "HFS+ patch"))
        .with_step(copy(b"boot", 22460, "gatekeeper/bootloader"))
        .with_step(copy(b"ptch", 41, "Disk Cache patch"))
        // Disk Init and what it uses
        .with_step(copy(b"PACK", 2, "Disk Init, brings owned resources"))
        .with_step(copy(b"p2u#", 0, "Text Encodings, referenced by ptch"))
        .with_step(copy(b"STR#", -20574, "format aliases"))
        .with_step(copy(b"STR#", -20573, "wrapper file names"))
        .with_step(copy(b"STR#", -20483, "disk problem message"))
        .with_step(copy(b"TEXT", -20574, "wrapper read-me header"))
        .with_step(copy(b"TEXT", -20573, "wrapper read-me contents"))
        // 7.6 and later load ptch -20217 themselves
        .with_step(PlanStep::Guarded {
            guard: ConditionalGuard {
                name: "pre-7.6 loader".to_string(),
                refs: vec![
                    GuardRef::new(SnapshotRef::Base, code(b"boot"), 2),
                    GuardRef::new(SnapshotRef::Base, code(b"boot"), 3),
                ],
                pattern: MOVEW_B107_D0.to_vec(),
            },
            steps: vec![PlanStep::copy(release(BOOT_LOADER_SOURCE), code(b"boot"), 2)
                .with_note("loads ptch -20217 early")],
        })
        // 68k support (Quadra 900 under Basilisk II)
        .with_step(copy(b"gtbl", 6, "68k: HFS+ not loaded without it"))
        .with_step(copy(b"gpch", 750, "68k: illegal instruction without it"))
        .with_step(copy(b"ptch", 42, "68k: error type 41 without it"))
}
