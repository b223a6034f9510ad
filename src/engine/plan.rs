//! engine::plan
//!
//! Patch plans: the ordered steps that turn a base System into a patched one.
//!
//! # Architecture
//!
//! Plans are the sole description of what a build does. They are:
//! - **Deterministic**: the same plan against the same snapshots always
//!   produces the same working set
//! - **Previewable**: can be shown before execution
//! - **Serializable**: can be stored as TOML or JSON and replace the built-in plan
//! - **Version-agnostic**: steps name their source as `base` or a fixed
//!   release, so one plan serves every target version
//!
//! # Invariants
//!
//! - Plans are pure data; the planner performs no I/O except file loading
//! - Every guard references at least one resource and has a non-empty pattern
//!
//! # Example
//!
//! ```
//! use forkmerge::core::types::{ResType, VersionLabel};
//! use forkmerge::engine::plan::{Plan, PlanStep, SnapshotRef};
//!
//! let plan = Plan::new("hfs")
//!     .with_step(PlanStep::copy(
//!         SnapshotRef::Version(VersionLabel::new("8.1.0").unwrap()),
//!         ResType::new("ptch").unwrap(),
//!         -20217,
//!     ));
//!
//! assert!(!plan.is_empty());
//! assert_eq!(plan.step_count(), 1);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::types::{ResType, ResourceKey, VersionLabel};

/// Errors from plan loading and validation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plan file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid plan: {0}")]
    Invalid(String),
}

/// Which snapshot a step reads from.
///
/// Serialized as the string `"base"` or a version label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SnapshotRef {
    /// The version currently being built.
    Base,
    /// A fixed release.
    Version(VersionLabel),
}

impl SnapshotRef {
    const BASE: &'static str = "base";

    /// Resolve to a concrete label for a build of `base`.
    pub fn resolve<'a>(&'a self, base: &'a VersionLabel) -> &'a VersionLabel {
        match self {
            SnapshotRef::Base => base,
            SnapshotRef::Version(label) => label,
        }
    }
}

impl TryFrom<String> for SnapshotRef {
    type Error = crate::core::types::TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == Self::BASE {
            Ok(SnapshotRef::Base)
        } else {
            VersionLabel::new(s).map(SnapshotRef::Version)
        }
    }
}

impl From<SnapshotRef> for String {
    fn from(r: SnapshotRef) -> Self {
        match r {
            SnapshotRef::Base => SnapshotRef::BASE.to_string(),
            SnapshotRef::Version(label) => label.into(),
        }
    }
}

impl std::fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotRef::Base => write!(f, "{}", Self::BASE),
            SnapshotRef::Version(label) => write!(f, "{}", label),
        }
    }
}

/// One resource a guard inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardRef {
    /// Snapshot holding the resource.
    pub snapshot: SnapshotRef,
    /// Resource type.
    pub res_type: ResType,
    /// Resource id.
    pub id: i16,
}

impl GuardRef {
    /// Create a guard reference.
    pub fn new(snapshot: SnapshotRef, res_type: ResType, id: i16) -> Self {
        Self {
            snapshot,
            res_type,
            id,
        }
    }

    /// The referenced resource's key.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.res_type, self.id)
    }
}

/// A byte-pattern-absence test over one or more resources.
///
/// Passes iff `pattern` occurs in none of the referenced payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalGuard {
    /// Short name used in diagnostics.
    pub name: String,
    /// Resources whose payloads are searched.
    pub refs: Vec<GuardRef>,
    /// Byte pattern, hex-encoded when serialized.
    #[serde(with = "hex_bytes")]
    pub pattern: Vec<u8>,
}

/// A typed plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// Copy one resource and every resource it owns from a snapshot.
    CopyWithOwned {
        /// Snapshot to copy from.
        source: SnapshotRef,
        /// Resource type.
        res_type: ResType,
        /// Resource id.
        id: i16,
        /// Free-form note shown in previews.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    /// Run nested steps only if a guard passes.
    Guarded {
        /// The guard to evaluate.
        guard: ConditionalGuard,
        /// Steps executed when the guard passes.
        steps: Vec<PlanStep>,
    },
}

impl PlanStep {
    /// Shorthand for a `CopyWithOwned` step without a note.
    pub fn copy(source: SnapshotRef, res_type: ResType, id: i16) -> Self {
        PlanStep::CopyWithOwned {
            source,
            res_type,
            id,
            note: None,
        }
    }

    /// Attach a note to a `CopyWithOwned` step (builder pattern).
    ///
    /// Has no effect on other steps.
    pub fn with_note(mut self, text: impl Into<String>) -> Self {
        if let PlanStep::CopyWithOwned { note, .. } = &mut self {
            *note = Some(text.into());
        }
        self
    }

    /// Number of steps including nested ones (a guard counts as one).
    pub fn count(&self) -> usize {
        match self {
            PlanStep::CopyWithOwned { .. } => 1,
            PlanStep::Guarded { steps, .. } => 1 + steps.iter().map(PlanStep::count).sum::<usize>(),
        }
    }

    /// Get a human-readable description of this step.
    pub fn description(&self) -> String {
        match self {
            PlanStep::CopyWithOwned {
                source,
                res_type,
                id,
                note,
            } => match note {
                Some(note) => format!("Copy {}'s '{}' {} ({})", source, res_type, id, note),
                None => format!("Copy {}'s '{}' {}", source, res_type, id),
            },
            PlanStep::Guarded { guard, steps } => {
                format!("If {}: {} step(s)", guard.name, steps.len())
            }
        }
    }

    fn validate(&self, path: &StepPath) -> Result<(), PlanError> {
        match self {
            PlanStep::CopyWithOwned { .. } => Ok(()),
            PlanStep::Guarded { guard, steps } => {
                if guard.refs.is_empty() {
                    return Err(PlanError::Invalid(format!(
                        "guard '{}' at step {} references no resources",
                        guard.name, path
                    )));
                }
                if guard.pattern.is_empty() {
                    return Err(PlanError::Invalid(format!(
                        "guard '{}' at step {} has an empty pattern",
                        guard.name, path
                    )));
                }
                for (i, step) in steps.iter().enumerate() {
                    step.validate(&path.child(i))?;
                }
                Ok(())
            }
        }
    }
}

/// Position of a step within a plan, 1-based per level.
///
/// Displayed as `3` for a top-level step or `5.1` for the first step
/// nested inside step 5.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepPath(Vec<usize>);

impl StepPath {
    /// Path of the top-level step at zero-based `index`.
    pub fn top(index: usize) -> Self {
        Self(vec![index + 1])
    }

    /// Path of the nested step at zero-based `index` below this one.
    pub fn child(&self, index: usize) -> Self {
        let mut parts = self.0.clone();
        parts.push(index + 1);
        Self(parts)
    }
}

impl std::fmt::Display for StepPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Plan name.
    pub name: String,
    /// Ordered steps to execute.
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Create a new empty plan.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: vec![],
        }
    }

    /// Add a step to the plan (builder pattern).
    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Load and validate a plan from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if the file cannot be read or parsed, or if the
    /// plan fails validation.
    pub fn from_toml_file(path: &Path) -> Result<Self, PlanError> {
        let contents = fs::read_to_string(path).map_err(|e| PlanError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let plan: Plan = toml::from_str(&contents).map_err(|e| PlanError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        plan.validate()?;
        Ok(plan)
    }

    /// Check structural rules that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Invalid` naming the offending step.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::Invalid("plan name cannot be empty".to_string()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.validate(&StepPath::top(i))?;
        }
        Ok(())
    }

    /// Compute a digest of the plan.
    ///
    /// The digest is a SHA-256 hash of the JSON serialization, so two plans
    /// with equal content have equal digests.
    ///
    /// # Example
    ///
    /// ```
    /// use forkmerge::engine::plan::Plan;
    ///
    /// let digest = Plan::new("empty").digest();
    /// assert!(digest.starts_with("sha256:"));
    /// ```
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Check if the plan is empty (no-op).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps, counting nested ones.
    pub fn step_count(&self) -> usize {
        self.steps.iter().map(PlanStep::count).sum()
    }

    /// Every release the plan reads from besides the base.
    ///
    /// Sorted and deduplicated.
    pub fn source_versions(&self) -> Vec<VersionLabel> {
        fn collect(steps: &[PlanStep], out: &mut Vec<VersionLabel>) {
            for step in steps {
                match step {
                    PlanStep::CopyWithOwned {
                        source: SnapshotRef::Version(label),
                        ..
                    } => out.push(label.clone()),
                    PlanStep::CopyWithOwned { .. } => {}
                    PlanStep::Guarded { guard, steps } => {
                        for r in &guard.refs {
                            if let SnapshotRef::Version(label) = &r.snapshot {
                                out.push(label.clone());
                            }
                        }
                        collect(steps, out);
                    }
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.steps, &mut out);
        out.sort();
        out.dedup();
        out
    }

    /// Generate a human-readable preview.
    pub fn preview(&self) -> String {
        if self.is_empty() {
            return format!("{}: No steps", self.name);
        }

        fn render(steps: &[PlanStep], parent: Option<&StepPath>, depth: usize, lines: &mut Vec<String>) {
            for (i, step) in steps.iter().enumerate() {
                let path = match parent {
                    Some(p) => p.child(i),
                    None => StepPath::top(i),
                };
                lines.push(format!(
                    "{}{}. {}",
                    "  ".repeat(depth + 1),
                    path,
                    step.description()
                ));
                if let PlanStep::Guarded { steps, .. } = step {
                    render(steps, Some(&path), depth + 1, lines);
                }
            }
        }

        let mut lines = vec![format!("{}:", self.name)];
        render(&self.steps, None, 0, &mut lines);
        lines.join("\n")
    }
}

/// Serde adapter storing byte vectors as lowercase hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
