//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Build
//! progress is not printed by the engine; [`ConsoleReporter`] turns its
//! events into lines here.

use std::fmt::Display;

use crate::engine::events::{BuildEvent, EventSink};

/// How much the tool prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Build progress, warnings and the summary
    Normal,
    /// Everything, including per-step `[debug]` lines
    Debug,
}

impl Verbosity {
    /// Pick a level from `--quiet` and `--debug`. Quiet wins.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Whether progress and warnings are shown.
    pub fn shows_progress(self) -> bool {
        self != Verbosity::Quiet
    }

    /// Whether `[debug]` lines are shown.
    pub fn shows_debug(self) -> bool {
        self == Verbosity::Debug
    }
}

/// Progress line on stdout.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        println!("{message}");
    }
}

/// `[debug]` line on stderr.
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_debug() {
        eprintln!("[debug] {message}");
    }
}

/// `warning:` line on stderr.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        eprintln!("warning: {message}");
    }
}

/// `error:` line on stderr, shown even with `--quiet`.
pub fn error(message: impl Display) {
    eprintln!("error: {message}");
}

/// Indented `- item` lines, one per item.
pub fn bullet_list<T: Display>(items: &[T]) -> String {
    let lines: Vec<String> = items.iter().map(|item| format!("  - {item}")).collect();
    lines.join("\n")
}

/// How a rendered event line is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Normal progress output.
    Progress(String),
    /// Only shown with `--debug`.
    Debug(String),
}

/// Render one build event as console lines.
pub fn render(event: &BuildEvent) -> Vec<Line> {
    match event {
        BuildEvent::BuildStarted {
            run_id,
            version,
            plan,
            plan_digest,
            base_records,
            ..
        } => vec![
            Line::Progress(format!("=== Patching System {} ===", version)),
            Line::Debug(format!(
                "run {}: plan '{}' ({}), {} base resources",
                run_id, plan, plan_digest, base_records
            )),
        ],
        BuildEvent::StepStarted {
            version,
            step,
            description,
            ..
        } => vec![Line::Debug(format!("[{}] step {}: {}", version, step, description))],
        BuildEvent::StepSucceeded {
            version,
            step,
            source,
            resource,
            replaced,
            owned,
            ..
        } => {
            let mut lines = vec![Line::Progress(format!("  Copying {}'s {}", source, resource))];
            if *owned > 0 {
                lines.push(Line::Progress(format!("    + {} owned resources", owned)));
            }
            if *replaced {
                lines.push(Line::Debug(format!(
                    "[{}] step {}: replaced existing {}",
                    version, step, resource
                )));
            }
            lines
        }
        BuildEvent::GuardEvaluated {
            version,
            step,
            guard,
            passed,
            ..
        } => vec![Line::Debug(format!(
            "[{}] step {}: guard '{}' {}",
            version,
            step,
            guard,
            if *passed { "passed" } else { "did not pass" }
        ))],
        BuildEvent::GuardSkipped {
            guard,
            skipped_steps,
            ..
        } => vec![Line::Progress(format!(
            "  Skipping '{}' ({} steps)",
            guard, skipped_steps
        ))],
        BuildEvent::StepFailed {
            version,
            step,
            error,
            ..
        } => vec![Line::Debug(format!("[{}] step {} failed: {}", version, step, error))],
        BuildEvent::BuildFailed { version, error, .. } => {
            vec![Line::Progress(format!("  System {} failed: {}", version, error))]
        }
        BuildEvent::BuildCompleted {
            version, records, ..
        } => vec![Line::Debug(format!("[{}] {} resources", version, records))],
    }
}

/// Prints build progress to the console.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    verbosity: Verbosity,
}

impl ConsoleReporter {
    /// Create a reporter at the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl EventSink for ConsoleReporter {
    fn emit(&self, event: &BuildEvent) {
        for line in render(event) {
            match line {
                Line::Progress(text) => print(text, self.verbosity),
                Line::Debug(text) => debug(text, self.verbosity),
            }
        }
    }
}
