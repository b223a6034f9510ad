//! engine::events
//!
//! Structured build events.
//!
//! # Architecture
//!
//! The executor never prints. It reports what it does as [`BuildEvent`]s
//! sent to an [`EventSink`]; reporters decide how to render them. Events
//! have no influence on control flow.
//!
//! Sinks:
//! - [`NullSink`] discards everything
//! - [`CollectingSink`] keeps events in memory
//! - [`JsonLinesSink`] appends one JSON object per line to a writer
//! - [`MultiSink`] forwards to several sinks
//! - `ui::output::ConsoleReporter` renders progress for humans
//!
//! # Example
//!
//! ```
//! use forkmerge::engine::events::{BuildEvent, CollectingSink, EventSink};
//!
//! let sink = CollectingSink::new();
//! sink.emit(&BuildEvent::guard_evaluated("7.5.3", "5", "pre-7.6", true));
//! assert_eq!(sink.events().len(), 1);
//! ```

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one invocation of the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Generate a new unique run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something the executor did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// A build began from its base snapshot.
    BuildStarted {
        run_id: String,
        version: String,
        plan: String,
        plan_digest: String,
        /// Records in the working set after loading the base.
        base_records: usize,
        timestamp: String,
    },

    /// A step is about to run.
    StepStarted {
        version: String,
        step: String,
        description: String,
        timestamp: String,
    },

    /// A copy step finished.
    StepSucceeded {
        version: String,
        step: String,
        /// Snapshot the resource came from.
        source: String,
        /// Copied resource, e.g. `'ptch' -20217`.
        resource: String,
        /// Whether the copied resource replaced one already present.
        replaced: bool,
        /// Owned resources copied along with it.
        owned: usize,
        timestamp: String,
    },

    /// A guard was evaluated.
    GuardEvaluated {
        version: String,
        step: String,
        guard: String,
        passed: bool,
        timestamp: String,
    },

    /// A guard failed and its nested steps were skipped.
    GuardSkipped {
        version: String,
        step: String,
        guard: String,
        skipped_steps: usize,
        timestamp: String,
    },

    /// A step failed; the build is aborted.
    StepFailed {
        version: String,
        step: String,
        error: String,
        timestamp: String,
    },

    /// The build could not start or was aborted.
    BuildFailed {
        version: String,
        error: String,
        timestamp: String,
    },

    /// All steps ran.
    BuildCompleted {
        version: String,
        records: usize,
        timestamp: String,
    },
}

impl BuildEvent {
    /// Create a BuildStarted event.
    pub fn build_started(
        run_id: &RunId,
        version: impl Into<String>,
        plan: impl Into<String>,
        plan_digest: impl Into<String>,
        base_records: usize,
    ) -> Self {
        BuildEvent::BuildStarted {
            run_id: run_id.to_string(),
            version: version.into(),
            plan: plan.into(),
            plan_digest: plan_digest.into(),
            base_records,
            timestamp: now(),
        }
    }

    /// Create a StepStarted event.
    pub fn step_started(
        version: impl Into<String>,
        step: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        BuildEvent::StepStarted {
            version: version.into(),
            step: step.into(),
            description: description.into(),
            timestamp: now(),
        }
    }

    /// Create a StepSucceeded event.
    pub fn step_succeeded(
        version: impl Into<String>,
        step: impl Into<String>,
        source: impl Into<String>,
        resource: impl Into<String>,
        replaced: bool,
        owned: usize,
    ) -> Self {
        BuildEvent::StepSucceeded {
            version: version.into(),
            step: step.into(),
            source: source.into(),
            resource: resource.into(),
            replaced,
            owned,
            timestamp: now(),
        }
    }

    /// Create a GuardEvaluated event.
    pub fn guard_evaluated(
        version: impl Into<String>,
        step: impl Into<String>,
        guard: impl Into<String>,
        passed: bool,
    ) -> Self {
        BuildEvent::GuardEvaluated {
            version: version.into(),
            step: step.into(),
            guard: guard.into(),
            passed,
            timestamp: now(),
        }
    }

    /// Create a GuardSkipped event.
    pub fn guard_skipped(
        version: impl Into<String>,
        step: impl Into<String>,
        guard: impl Into<String>,
        skipped_steps: usize,
    ) -> Self {
        BuildEvent::GuardSkipped {
            version: version.into(),
            step: step.into(),
            guard: guard.into(),
            skipped_steps,
            timestamp: now(),
        }
    }

    /// Create a StepFailed event.
    pub fn step_failed(
        version: impl Into<String>,
        step: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        BuildEvent::StepFailed {
            version: version.into(),
            step: step.into(),
            error: error.into(),
            timestamp: now(),
        }
    }

    /// Create a BuildFailed event.
    pub fn build_failed(version: impl Into<String>, error: impl Into<String>) -> Self {
        BuildEvent::BuildFailed {
            version: version.into(),
            error: error.into(),
            timestamp: now(),
        }
    }

    /// Create a BuildCompleted event.
    pub fn build_completed(version: impl Into<String>, records: usize) -> Self {
        BuildEvent::BuildCompleted {
            version: version.into(),
            records,
            timestamp: now(),
        }
    }

    /// The version this event belongs to.
    pub fn version(&self) -> &str {
        match self {
            BuildEvent::BuildStarted { version, .. }
            | BuildEvent::StepStarted { version, .. }
            | BuildEvent::StepSucceeded { version, .. }
            | BuildEvent::GuardEvaluated { version, .. }
            | BuildEvent::GuardSkipped { version, .. }
            | BuildEvent::StepFailed { version, .. }
            | BuildEvent::BuildFailed { version, .. }
            | BuildEvent::BuildCompleted { version, .. } => version,
        }
    }

    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            BuildEvent::BuildStarted { .. } => "build_started",
            BuildEvent::StepStarted { .. } => "step_started",
            BuildEvent::StepSucceeded { .. } => "step_succeeded",
            BuildEvent::GuardEvaluated { .. } => "guard_evaluated",
            BuildEvent::GuardSkipped { .. } => "guard_skipped",
            BuildEvent::StepFailed { .. } => "step_failed",
            BuildEvent::BuildFailed { .. } => "build_failed",
            BuildEvent::BuildCompleted { .. } => "build_completed",
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Receiver of build events.
///
/// Sinks are shared between concurrently running builds, so `emit` takes
/// `&self` and must not fail.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn emit(&self, event: &BuildEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &BuildEvent) {
        (**self).emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn emit(&self, event: &BuildEvent) {
        (**self).emit(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &BuildEvent) {}
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<BuildEvent>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out everything collected so far.
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &BuildEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Writes each event as one line of JSON.
///
/// Write errors cannot be reported from `emit`; the first one is kept and
/// returned by [`JsonLinesSink::finish`], and later events are dropped.
pub struct JsonLinesSink<W: Write + Send> {
    state: Mutex<JsonLinesState<W>>,
}

struct JsonLinesState<W> {
    writer: W,
    error: Option<std::io::Error>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Create a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(JsonLinesState {
                writer,
                error: None,
            }),
        }
    }

    /// Flush and return the writer, or the first write error.
    pub fn finish(self) -> std::io::Result<W> {
        let mut state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = state.error.take() {
            return Err(e);
        }
        state.writer.flush()?;
        Ok(state.writer)
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &BuildEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut state.writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| state.writer.write_all(b"\n"));
        if let Err(e) = result {
            state.error = Some(e);
        }
    }
}

/// Forwards every event to each inner sink, in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    /// Create a sink with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target (builder pattern).
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: &BuildEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
