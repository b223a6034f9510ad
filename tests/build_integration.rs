//! Integration tests for the build pipeline.
//!
//! These tests drive the executor and runner through the public API with
//! snapshots stored on disk, the way the binary does.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use forkmerge::codec::{JsonCodec, ResourceCodec};
use forkmerge::core::ownership::owned_id;
use forkmerge::core::paths::FixturePaths;
use forkmerge::core::types::{ResType, ResourceKey, ResourceRecord, VersionLabel};
use forkmerge::engine::builtin::{self, MOVEW_B107_D0};
use forkmerge::engine::canonical::canonical_order;
use forkmerge::engine::events::{BuildEvent, CollectingSink, NullSink};
use forkmerge::engine::exec::{ExecuteError, Executor};
use forkmerge::engine::plan::{Plan, PlanStep, SnapshotRef};
use forkmerge::engine::runner::{BuildError, RunOptions, Runner};
use forkmerge::engine::snapshot::{FileSnapshotProvider, SnapshotCache, SnapshotError};
use forkmerge::volume::{VolumeBuilder, VolumeError, VolumeRequest, FIXED_FILE_DATE};

// =============================================================================
// Test Fixtures
// =============================================================================

fn t(code: &str) -> ResType {
    ResType::new(code).unwrap()
}

fn v(label: &str) -> VersionLabel {
    VersionLabel::new(label).unwrap()
}

fn record(code: &str, id: i16, data: &[u8]) -> ResourceRecord {
    ResourceRecord::new(ResourceKey::new(t(code), id), data)
}

/// A fixture directory layout in a temp dir.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(dir.path().join("SampleSystems")).unwrap();
        fs::create_dir_all(dir.path().join("TestBed/System Folder")).unwrap();
        fs::write(dir.path().join("TestBed/ReadMe"), b"test bed").unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn paths(&self) -> FixturePaths {
        FixturePaths::new(self.root(), "SampleSystems", "TestBed", "TestImages.tmp")
    }

    fn add_system(&self, label: &str, records: &[ResourceRecord]) {
        let dir = self.root().join("SampleSystems");
        fs::write(dir.join(label), format!("data fork of {label}")).unwrap();
        fs::write(
            dir.join(format!("{label}.rjson")),
            JsonCodec.encode(records).unwrap(),
        )
        .unwrap();
    }

    fn cache(&self) -> SnapshotCache {
        SnapshotCache::new(FileSnapshotProvider::new(
            self.root().join("SampleSystems"),
            JsonCodec,
        ))
    }

    fn read_fork(&self, version: &str) -> Vec<ResourceRecord> {
        let path = self
            .paths()
            .staged_system(&v(version))
            .with_file_name("System.rjson");
        JsonCodec.decode(&fs::read(path).unwrap()).unwrap()
    }
}

fn options() -> RunOptions {
    RunOptions {
        blank_image_bytes: 4096,
        volume_bytes: 10 * 1024 * 1024,
        max_version: 810,
        parallel: false,
    }
}

/// Records every request it is asked to build.
#[derive(Default)]
struct RecordingBuilder {
    requests: Mutex<Vec<VolumeRequest>>,
    fail_for: Option<String>,
}

impl VolumeBuilder for RecordingBuilder {
    fn build(&self, request: &VolumeRequest) -> Result<(), VolumeError> {
        if self.fail_for.as_deref() == Some(request.name.as_str()) {
            return Err(VolumeError::Builder {
                volume: request.name.clone(),
                message: "disk full".to_string(),
            });
        }
        fs::write(&request.dest, b"image").map_err(|source| VolumeError::Write {
            path: request.dest.clone(),
            source,
        })?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

// =============================================================================
// Executor
// =============================================================================

mod executor {
    use super::*;

    #[test]
    fn owner_brings_exactly_its_owned_record() {
        let fixture = Fixture::new();
        let owned = owned_id(t("PACK"), 2, 0).unwrap();
        fixture.add_system("7.6.1", &[record("PACK", 2, b"P1")]);
        fixture.add_system(
            "8.1.0",
            &[
                record("PACK", 2, b"P1"),
                record("STR#", owned, b"owned"),
                record("PACK", 3, b"other pack"),
                record("ptch", 41, b"unrelated"),
            ],
        );

        let plan = Plan::new("pack").with_step(PlanStep::copy(
            SnapshotRef::Version(v("8.1.0")),
            t("PACK"),
            2,
        ));
        let cache = fixture.cache();
        let set = Executor::new(&cache, &NullSink)
            .execute(&plan, &v("7.6.1"))
            .unwrap();

        let records = canonical_order(set);
        assert_eq!(
            records,
            vec![record("PACK", 2, b"P1"), record("STR#", owned, b"owned")]
        );
    }

    #[test]
    fn patch_resources_own_nothing() {
        let fixture = Fixture::new();
        fixture.add_system("7.6.1", &[record("ptch", -20217, b"P1")]);
        fixture.add_system(
            "8.1.0",
            &[
                record("ptch", -20217, b"P1"),
                // Owned by DRVR 0; 'ptch' is not an owner type
                record("DRVR", owned_id(t("DRVR"), 0, 1).unwrap(), b"x"),
            ],
        );

        let plan = Plan::new("ptch").with_step(PlanStep::copy(
            SnapshotRef::Version(v("8.1.0")),
            t("ptch"),
            -20217,
        ));
        let cache = fixture.cache();
        let set = Executor::new(&cache, &NullSink)
            .execute(&plan, &v("7.6.1"))
            .unwrap();
        assert_eq!(canonical_order(set), vec![record("ptch", -20217, b"P1")]);
    }

    #[test]
    fn builtin_plan_on_pre_76_system() {
        let fixture = Fixture::new();
        fixture.add_system("7.5.3", &[record("boot", 2, b"old"), record("boot", 3, b"old")]);
        fixture.add_system("8.1.0", &hfs_plus_source());
        fixture.add_system("9.2.2", &[record("boot", 2, b"9.2.2 loader")]);

        let cache = fixture.cache();
        let sink = CollectingSink::new();
        let set = Executor::new(&cache, &sink)
            .execute(&builtin::hfs_plus(), &v("7.5.3"))
            .unwrap();

        assert_eq!(
            set.get(&ResourceKey::new(t("boot"), 2)).unwrap().data,
            b"9.2.2 loader"
        );
        // 2 base boots (one replaced) + 13 copied + 1 owned by PACK 2
        assert_eq!(set.len(), 16);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, BuildEvent::GuardEvaluated { passed: true, .. })));
    }

    #[test]
    fn builtin_plan_on_76_system_skips_loader() {
        let fixture = Fixture::new();
        let mut boot2 = b"prefix".to_vec();
        boot2.extend_from_slice(&MOVEW_B107_D0);
        fixture.add_system("7.6.1", &[record("boot", 2, &boot2), record("boot", 3, b"")]);
        fixture.add_system("8.1.0", &hfs_plus_source());

        // 9.2.2 is never read, so it need not exist
        let cache = fixture.cache();
        let sink = CollectingSink::new();
        let set = Executor::new(&cache, &sink)
            .execute(&builtin::hfs_plus(), &v("7.6.1"))
            .unwrap();

        assert_eq!(set.get(&ResourceKey::new(t("boot"), 2)).unwrap().data, boot2);
        assert!(!cache.is_loaded(&v("9.2.2")));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, BuildEvent::GuardSkipped { skipped_steps: 1, .. })));
    }

    #[test]
    fn builtin_plan_guard_fails_closed() {
        let fixture = Fixture::new();
        // No 'boot' 3: the guard cannot decide
        fixture.add_system("7.5.3", &[record("boot", 2, b"old")]);
        fixture.add_system("8.1.0", &hfs_plus_source());
        fixture.add_system("9.2.2", &[record("boot", 2, b"9.2.2 loader")]);

        let cache = fixture.cache();
        let err = Executor::new(&cache, &NullSink)
            .execute(&builtin::hfs_plus(), &v("7.5.3"))
            .unwrap_err();
        assert!(matches!(err, ExecuteError::GuardEvaluation { .. }));
        assert_eq!(err.step().unwrap().to_string(), "11");
    }

    /// Everything the built-in plan copies from 8.1.0.
    fn hfs_plus_source() -> Vec<ResourceRecord> {
        vec![
            record("ptch", -20217, b"hfs+"),
            record("boot", 22460, b"gatekeeper"),
            record("ptch", 41, b"disk cache"),
            record("PACK", 2, b"disk init"),
            record("DITL", owned_id(t("PACK"), 2, 0).unwrap(), b"owned dialog"),
            record("p2u#", 0, b"encodings"),
            record("STR#", -20574, b"aliases"),
            record("STR#", -20573, b"names"),
            record("STR#", -20483, b"problem"),
            record("TEXT", -20574, b"header"),
            record("TEXT", -20573, b"contents"),
            record("gtbl", 6, b"gtbl"),
            record("gpch", 750, b"gpch"),
            record("ptch", 42, b"ptch 42"),
        ]
    }
}

// =============================================================================
// Runner
// =============================================================================

mod runner {
    use super::*;

    fn plan() -> Plan {
        Plan::new("one").with_step(PlanStep::copy(
            SnapshotRef::Version(v("8.1.0")),
            t("ptch"),
            -20217,
        ))
    }

    fn fixture() -> Fixture {
        let fixture = Fixture::new();
        fixture.add_system("7.5.3", &[record("zzzz", 1, b"z"), record("AAAA", 1, b"a")]);
        fixture.add_system("7.6.1", &[record("ptch", -20217, b"old")]);
        fixture.add_system("8.1.0", &[record("ptch", -20217, b"new")]);
        fixture
    }

    #[test]
    fn stages_each_release() {
        let fixture = fixture();
        let paths = fixture.paths();
        let plan = plan();
        let cache = fixture.cache();
        let builder = RecordingBuilder::default();

        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .with_volume_builder(&builder)
            .run()
            .unwrap();

        assert!(summary.is_success());
        assert!(summary.unavailable_sources.is_empty());
        let versions: Vec<&str> = summary.reports.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["7.5.3", "7.6.1"]);

        assert_eq!(fs::read(paths.blank_image()).unwrap(), vec![0; 4096]);
        assert_eq!(
            fs::read(paths.staged_system(&v("7.6.1"))).unwrap(),
            b"data fork of 7.6.1"
        );
        assert_eq!(
            fixture.read_fork("7.6.1"),
            vec![record("ptch", -20217, b"new")]
        );
        assert_eq!(
            fixture.read_fork("7.5.3"),
            vec![
                record("AAAA", 1, b"a"),
                record("ptch", -20217, b"new"),
                record("zzzz", 1, b"z"),
            ]
        );

        let requests = builder.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].name, "Test-7.6.1");
        assert_eq!(requests[1].tree, paths.stage_dir(&v("7.6.1")));
        assert_eq!(requests[1].size_bytes, 10 * 1024 * 1024);
        assert_eq!(requests[1].file_date, FIXED_FILE_DATE);
        assert!(paths.disk_image(&v("7.6.1")).exists());
    }

    #[test]
    fn restaging_replaces_old_tree() {
        let fixture = fixture();
        let paths = fixture.paths();
        let stale = paths.stage_dir(&v("7.6.1")).join("stale");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"left over").unwrap();

        let plan = plan();
        let cache = fixture.cache();
        Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .run()
            .unwrap();

        assert!(!stale.exists());
        assert!(paths.stage_dir(&v("7.6.1")).join("ReadMe").exists());
    }

    #[test]
    fn failure_is_isolated() {
        let fixture = fixture();
        // Only 7.5.3 has 'zzzz' 1 in its base
        let plan = plan().with_step(PlanStep::copy(SnapshotRef::Base, t("zzzz"), 1));
        let paths = fixture.paths();
        let cache = fixture.cache();

        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .run()
            .unwrap();

        assert!(!summary.is_success());
        let failed: Vec<&str> = summary.failed().map(|r| r.version.as_str()).collect();
        assert_eq!(failed, vec!["7.6.1"]);
        assert_eq!(summary.succeeded().count(), 1);

        let err = summary.failed().next().unwrap().result.as_ref().unwrap_err();
        assert!(matches!(
            err,
            BuildError::Execute {
                source: ExecuteError::NotFound { .. },
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("7.6.1"));
        assert!(message.contains("'zzzz' 1"));

        // Nothing staged for the failed version
        assert!(!paths.stage_dir(&v("7.6.1")).exists());
        assert!(paths.staged_system(&v("7.5.3")).exists());
    }

    #[test]
    fn volume_failure_is_per_version() {
        let fixture = fixture();
        let paths = fixture.paths();
        let plan = plan();
        let cache = fixture.cache();
        let builder = RecordingBuilder {
            fail_for: Some("Test-7.5.3".to_string()),
            ..Default::default()
        };

        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .with_volume_builder(&builder)
            .run()
            .unwrap();

        let failed: Vec<&str> = summary.failed().map(|r| r.version.as_str()).collect();
        assert_eq!(failed, vec!["7.5.3"]);
        assert_eq!(builder.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn parallel_matches_sequential() {
        let sequential = {
            let fixture = fixture();
            let paths = fixture.paths();
            let plan = plan();
            let cache = fixture.cache();
            let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
                .with_options(options())
                .run()
                .unwrap();
            summary
                .reports
                .into_iter()
                .map(|r| (r.version, r.result.unwrap().digest))
                .collect::<Vec<_>>()
        };

        let fixture = fixture();
        let paths = fixture.paths();
        let plan = plan();
        let cache = fixture.cache();
        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(RunOptions {
                parallel: true,
                ..options()
            })
            .run()
            .unwrap();
        let parallel: Vec<_> = summary
            .reports
            .into_iter()
            .map(|r| (r.version, r.result.unwrap().digest))
            .collect();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn sources_loaded_before_builds() {
        let fixture = fixture();
        let plan = plan().with_step(PlanStep::copy(
            SnapshotRef::Version(v("9.2.2")),
            t("boot"),
            2,
        ));
        let paths = fixture.paths();
        let cache = fixture.cache();

        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .run()
            .unwrap();

        assert_eq!(summary.unavailable_sources.len(), 1);
        let (label, err) = &summary.unavailable_sources[0];
        assert_eq!(label.as_str(), "9.2.2");
        assert!(matches!(err, SnapshotError::Missing { .. }));
        assert!(cache.is_loaded(&v("8.1.0")));
        assert_eq!(summary.failed().count(), 2);
    }

    #[test]
    fn missing_test_bed_fails_versions_not_run() {
        let fixture = fixture();
        fs::remove_dir_all(fixture.root().join("TestBed")).unwrap();
        let paths = fixture.paths();
        let plan = plan();
        let cache = fixture.cache();

        let summary = Runner::new(&paths, &plan, &cache, &JsonCodec, &NullSink)
            .with_options(options())
            .run()
            .unwrap();
        assert_eq!(summary.failed().count(), 2);
        assert!(summary
            .failed()
            .all(|r| matches!(r.result, Err(BuildError::Io { .. }))));
    }
}
