//! cli::build
//!
//! The build handler: config, plan, sinks, runner, summary.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::codec::JsonCodec;
use crate::core::config::Config;
use crate::core::paths::FixturePaths;
use crate::engine::builtin;
use crate::engine::events::{EventSink, JsonLinesSink, MultiSink};
use crate::engine::plan::Plan;
use crate::engine::runner::{RunOptions, RunSummary, Runner};
use crate::engine::snapshot::{FileSnapshotProvider, SnapshotCache};
use crate::ui::output::{self, ConsoleReporter, Verbosity};

type EventLog = JsonLinesSink<BufWriter<File>>;

/// Build every discovered version under `root`.
///
/// Returns `ExitCode::FAILURE` if any version failed to build.
///
/// # Errors
///
/// Returns an error if configuration, the plan, or run setup fails.
pub fn build(root: &Path, verbosity: Verbosity) -> Result<ExitCode> {
    let config = Config::load(root).context("failed to load configuration")?;
    if let Some(path) = config.loaded_from() {
        output::debug(format!("config: {}", path.display()), verbosity);
    }
    let paths = FixturePaths::from_config(root, &config);

    let plan = load_plan(root, &config)?;
    output::debug(
        format!(
            "plan '{}': {} steps, {}",
            plan.name,
            plan.step_count(),
            plan.digest()
        ),
        verbosity,
    );
    for line in plan.preview().lines() {
        output::debug(line, verbosity);
    }

    let cache = SnapshotCache::new(FileSnapshotProvider::new(&paths.sample_systems, JsonCodec));

    let mut sink = MultiSink::new().with(Arc::new(ConsoleReporter::new(verbosity)));
    let event_log = if config.event_log() {
        let log = Arc::new(open_event_log(&paths)?);
        sink = sink.with(log.clone() as Arc<dyn EventSink>);
        Some(log)
    } else {
        None
    };

    let runner = Runner::new(&paths, &plan, &cache, &JsonCodec, &sink)
        .with_options(RunOptions::from_config(&config));
    output::debug(format!("run {}", runner.run_id()), verbosity);
    let summary = runner.run().context("build setup failed")?;

    drop(runner);
    drop(sink);
    if let Some(log) = event_log {
        finish_event_log(log, &paths, verbosity);
    }

    report(&summary, &paths, verbosity);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_plan(root: &Path, config: &Config) -> Result<Plan> {
    match config.plan() {
        Some(path) => {
            let path = root.join(path);
            Plan::from_toml_file(&path)
                .with_context(|| format!("failed to load plan '{}'", path.display()))
        }
        None => Ok(builtin::hfs_plus()),
    }
}

fn open_event_log(paths: &FixturePaths) -> Result<EventLog> {
    fs::create_dir_all(&paths.output)
        .with_context(|| format!("failed to create '{}'", paths.output.display()))?;
    let path = paths.event_log();
    let file =
        File::create(&path).with_context(|| format!("failed to create '{}'", path.display()))?;
    Ok(JsonLinesSink::new(BufWriter::new(file)))
}

fn finish_event_log(log: Arc<EventLog>, paths: &FixturePaths, verbosity: Verbosity) {
    let path = paths.event_log();
    match Arc::try_unwrap(log) {
        Ok(log) => match log.finish() {
            Ok(_) => output::debug(format!("events: {}", path.display()), verbosity),
            Err(e) => output::warn(
                format!("event log '{}' is incomplete: {}", path.display(), e),
                verbosity,
            ),
        },
        Err(_) => output::warn(
            format!("event log '{}' was not flushed", path.display()),
            verbosity,
        ),
    }
}

fn report(summary: &RunSummary, paths: &FixturePaths, verbosity: Verbosity) {
    for (label, e) in &summary.unavailable_sources {
        output::warn(format!("source System {} is unavailable: {}", label, e), verbosity);
    }

    if summary.reports.is_empty() {
        output::warn(
            format!("no releases found in '{}'", paths.sample_systems.display()),
            verbosity,
        );
        return;
    }

    for report in &summary.reports {
        match &report.result {
            Ok(build) => output::debug(
                format!(
                    "{}: {} resources, {}",
                    report.version, build.records, build.digest
                ),
                verbosity,
            ),
            Err(e) => output::error(e),
        }
    }

    let total = summary.reports.len();
    let built = summary.succeeded().count();
    if summary.is_success() {
        output::print(format!("Built {} of {} Systems", built, total), verbosity);
    } else {
        let failed: Vec<String> = summary.failed().map(|r| r.version.to_string()).collect();
        output::print(
            format!(
                "Built {} of {} Systems. Failed:\n{}",
                built,
                total,
                output::bullet_list(&failed)
            ),
            verbosity,
        );
    }
}
