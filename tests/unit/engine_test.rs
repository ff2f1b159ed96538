//! Unit tests for the engine using in-process migrations

use std::fs;

use migrate::{BaselineOptions, IdScheme, InProcessRunner, MigrateError, Version};

use crate::helpers::{engine, history_ids, project, recording_runner, touch_migration, CallLog};

// ============================================================================
// up
// ============================================================================

#[test]
fn up_applies_in_ascending_order() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "1f72f-later.sh");
    touch_migration(&migrations, "002-second.sh");
    touch_migration(&migrations, "001-first.sh");

    let log = CallLog::default();
    let runner = recording_runner(&log, &["001-first", "002-second", "1f72f-later"]);
    let results = engine(temp.path(), runner).up(false).unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["001-first", "002-second", "1f72f-later"]);
    assert!(results.iter().all(|r| r.success && !r.dry_run));
    assert_eq!(log.calls(), vec!["001-first", "002-second", "1f72f-later"]);
    assert_eq!(
        history_ids(&migrations),
        vec!["001-first", "002-second", "1f72f-later"]
    );
}

#[test]
fn up_halts_at_first_failure() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    touch_migration(&migrations, "003-c.sh");

    let log = CallLog::default();
    let runner = recording_runner(&log, &["001-a", "003-c"])
        .register("002-b", |_| Err(anyhow::anyhow!("disk full")));
    let engine = engine(temp.path(), runner);

    let results = engine.up(false).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "001-a");
    assert!(results[0].success);
    assert_eq!(results[1].id, "002-b");
    assert!(!results[1].success);
    assert_eq!(results[1].error.as_deref(), Some("disk full"));
    assert!(!migrate::all_succeeded(&results));

    assert_eq!(log.calls(), vec!["001-a"]);
    assert_eq!(history_ids(&migrations), vec!["001-a"]);

    let state = engine.status().unwrap();
    let pending: Vec<_> = state.pending.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(pending, vec!["002-b", "003-c"]);
}

#[test]
fn up_is_idempotent() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-first.sh");
    touch_migration(&migrations, "002-second.sh");

    let log = CallLog::default();
    let engine = engine(
        temp.path(),
        recording_runner(&log, &["001-first", "002-second"]),
    );

    assert_eq!(engine.up(false).unwrap().len(), 2);
    assert!(engine.up(false).unwrap().is_empty());
    assert_eq!(log.calls().len(), 2);
    assert_eq!(history_ids(&migrations).len(), 2);
}

#[test]
fn dry_run_touches_nothing() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-first.sh");
    touch_migration(&migrations, "002-second.sh");

    let log = CallLog::default();
    let engine = engine(
        temp.path(),
        recording_runner(&log, &["001-first", "002-second"]),
    );

    let results = engine.up(true).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success && r.dry_run));
    assert!(log.calls().is_empty());
    assert!(!migrations.join(".history").exists());
    assert_eq!(engine.status().unwrap().pending.len(), 2);
}

#[test]
fn panicking_migration_is_a_failed_result() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-boom.sh");
    touch_migration(&migrations, "002-after.sh");

    let log = CallLog::default();
    let runner = recording_runner(&log, &["002-after"]).register("001-boom", |_| panic!("boom"));

    let results = engine(temp.path(), runner).up(false).unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].error.as_deref(), Some("panicked: boom"));
    assert!(log.calls().is_empty());
}

#[test]
fn unregistered_migration_fails() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-orphan.sh");

    let results = engine(temp.path(), InProcessRunner::new())
        .up(false)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(history_ids(&migrations).is_empty());
}

#[test]
fn context_carries_absolute_paths_and_id() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-check.sh");

    let root = temp.path().to_path_buf();
    let expected_dir = migrations.clone();
    let runner = InProcessRunner::new().register("001-check", move |ctx| {
        anyhow::ensure!(ctx.project_root == root, "wrong root");
        anyhow::ensure!(ctx.migrations_dir == expected_dir, "wrong migrations dir");
        anyhow::ensure!(ctx.migration_id == "001-check", "wrong id");
        anyhow::ensure!(!ctx.dry_run, "unexpected dry run");
        Ok(())
    });

    let results = engine(temp.path(), runner).up(false).unwrap();
    assert!(results[0].success, "{:?}", results[0].error);
}

#[test]
fn malformed_history_aborts_before_running() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-first.sh");
    fs::write(migrations.join(".history"), "garbage\n").unwrap();

    let log = CallLog::default();
    let err = engine(temp.path(), recording_runner(&log, &["001-first"]))
        .up(false)
        .unwrap_err();

    assert!(matches!(err, MigrateError::Parse { line: 1, .. }));
    assert!(log.calls().is_empty());
}

#[test]
fn missing_migrations_dir_is_empty_state() {
    let temp = tempfile::TempDir::new().unwrap();
    let engine = engine(temp.path(), InProcessRunner::new());

    let state = engine.status().unwrap();
    assert!(state.available.is_empty());
    assert!(state.is_up_to_date());
    assert!(engine.up(false).unwrap().is_empty());
}

#[test]
fn migrations_path_that_is_a_file_is_discovery_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let not_a_dir = temp.path().join("migrations");
    fs::write(&not_a_dir, "not a directory\n").unwrap();

    let log = CallLog::default();
    let engine = engine(temp.path(), recording_runner(&log, &["001-first"]));

    assert!(matches!(engine.status(), Err(MigrateError::Discovery { .. })));
    assert!(matches!(engine.up(false), Err(MigrateError::Discovery { .. })));
    assert!(matches!(
        engine.create("next", None, "bash"),
        Err(MigrateError::Discovery { .. })
    ));
    assert!(matches!(
        engine.baseline("001", BaselineOptions::default()),
        Err(MigrateError::Discovery { .. })
    ));

    assert!(log.calls().is_empty());
    assert_eq!(fs::read_to_string(&not_a_dir).unwrap(), "not a directory\n");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn duplicate_ids_abort_before_running() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    fs::write(migrations.join(".history"), "001-a 2024-06-15T14:30:00+00:00\n").unwrap();
    touch_migration(&migrations, "001-a.py");

    let log = CallLog::default();
    let engine = engine(temp.path(), recording_runner(&log, &["001-a"]));

    let err = engine.up(false).unwrap_err();
    assert!(matches!(err, MigrateError::Conflict(_)));
    assert!(err.to_string().contains("001-a.py and 001-a.sh"));
    assert!(matches!(engine.status(), Err(MigrateError::Conflict(_))));
    assert!(log.calls().is_empty());
}

#[cfg(unix)]
#[test]
fn history_append_failure_is_reported_as_failed_result() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    std::os::unix::fs::symlink(
        temp.path().join("missing-dir/history"),
        migrations.join(".history"),
    )
    .unwrap();

    let log = CallLog::default();
    let results = engine(temp.path(), recording_runner(&log, &["001-a", "002-b"]))
        .up(false)
        .unwrap();

    assert_eq!(log.calls(), vec!["001-a"]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "001-a");
    assert!(!results[0].success);
    assert!(results[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("applied but not recorded in history"));
}

// ============================================================================
// baseline
// ============================================================================

#[test]
fn baseline_excludes_migrations_with_empty_history() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    touch_migration(&migrations, "003-c.sh");
    let engine = engine(temp.path(), InProcessRunner::new());

    let summary = engine
        .baseline(
            "002",
            BaselineOptions {
                keep_files: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(summary.version, Version::Counter(2));
    assert!(summary.deleted.is_empty());
    assert_eq!(summary.absorbed, vec!["001-a", "002-b"]);

    let state = engine.status().unwrap();
    assert!(state.applied.is_empty());
    let pending: Vec<_> = state.pending.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(pending, vec!["003-c"]);
    assert_eq!(state.baseline, Some(Version::Counter(2)));
}

#[test]
fn baseline_deletes_files_but_keeps_history() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    touch_migration(&migrations, "003-c.sh");

    let log = CallLog::default();
    let engine = engine(
        temp.path(),
        recording_runner(&log, &["001-a", "002-b", "003-c"]),
    );
    engine.up(false).unwrap();

    let summary = engine.baseline("002", BaselineOptions::default()).unwrap();
    assert_eq!(summary.deleted.len(), 2);
    assert!(summary.absorbed.is_empty());
    assert!(!migrations.join("001-a.sh").exists());
    assert!(!migrations.join("002-b.sh").exists());
    assert!(migrations.join("003-c.sh").exists());
    assert_eq!(history_ids(&migrations), vec!["001-a", "002-b", "003-c"]);

    let state = engine.status().unwrap();
    assert!(state.is_up_to_date());
    assert!(state.is_baselined(&state.applied[0]));
    assert!(!state.is_baselined(&state.applied[2]));
}

#[test]
fn baseline_dry_run_changes_nothing() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    let engine = engine(temp.path(), InProcessRunner::new());

    let summary = engine
        .baseline(
            "001",
            BaselineOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.deleted, vec![migrations.join("001-a.sh")]);
    assert!(migrations.join("001-a.sh").exists());
    assert!(!migrations.join(".baseline").exists());
}

#[test]
fn baseline_rejects_invalid_targets() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    let engine = engine(temp.path(), InProcessRunner::new());
    let keep = BaselineOptions {
        keep_files: true,
        ..Default::default()
    };

    assert!(matches!(
        engine.baseline("not-a-version", keep.clone()),
        Err(MigrateError::InvalidVersion(_))
    ));
    assert!(matches!(
        engine.baseline("005", keep.clone()),
        Err(MigrateError::Conflict(_))
    ));

    engine.baseline("002", keep.clone()).unwrap();
    let err = engine.baseline("001", keep).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot move baseline backward from '002' to '001'"
    );
}

#[test]
fn baseline_summary_is_kept_as_comments() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    let engine = engine(temp.path(), InProcessRunner::new());

    engine
        .baseline(
            "001",
            BaselineOptions {
                keep_files: true,
                summary: Some("initial layout".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let content = fs::read_to_string(migrations.join(".baseline")).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines[0], "001");
    assert!(lines[1].starts_with("# created: "));
    assert_eq!(lines[2], "# initial layout");
    assert_eq!(engine.status().unwrap().baseline, Some(Version::Counter(1)));
}

#[test]
fn baseline_without_migrations_is_conflict() {
    let (temp, _migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new());
    assert!(matches!(
        engine.baseline("001", BaselineOptions::default()),
        Err(MigrateError::Conflict(_))
    ));
}

// ============================================================================
// create
// ============================================================================

#[test]
fn create_sanitizes_name_with_counter_scheme() {
    let (temp, migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new()).with_id_scheme(IdScheme::Counter);

    let path = engine.create("Add User@Auth!", None, "bash").unwrap();
    assert_eq!(path, migrations.join("001-add-userauth.sh"));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("#!/usr/bin/env bash"));
    assert!(content.contains("# Description: TODO: Add description"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[test]
fn create_uses_timestamp_scheme_by_default() {
    let (temp, migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new());

    let path = engine.create("Add User@Auth!", None, "bash").unwrap();
    let filename = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(filename.ends_with("-add-userauth.sh"), "{}", filename);

    let (version, id) = Version::from_filename(&filename).unwrap();
    assert!(!version.is_counter());
    assert_eq!(id.len(), "xxxxx-add-userauth".len());
    assert_eq!(path.parent(), Some(migrations.as_path()));
}

#[test]
fn create_twice_in_same_slot_does_not_collide() {
    let (temp, _migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new());

    let first = engine.create("one", None, "bash").unwrap();
    let second = engine.create("two", None, "bash").unwrap();

    let v1 = Version::from_filename(first.file_name().unwrap().to_str().unwrap())
        .unwrap()
        .0;
    let v2 = Version::from_filename(second.file_name().unwrap().to_str().unwrap())
        .unwrap()
        .0;
    assert!(v2 > v1);
}

#[test]
fn create_continues_after_baseline() {
    let (temp, migrations) = project();
    touch_migration(&migrations, "001-a.sh");
    touch_migration(&migrations, "002-b.sh");
    let engine = engine(temp.path(), InProcessRunner::new()).with_id_scheme(IdScheme::Counter);

    engine.baseline("002", BaselineOptions::default()).unwrap();
    let path = engine.create("next", None, "python").unwrap();
    assert_eq!(path, migrations.join("003-next.py"));
}

#[test]
fn create_fills_in_description() {
    let (temp, _migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new()).with_id_scheme(IdScheme::Counter);

    let path = engine
        .create("rename", Some("Move legacy assets"), "bash")
        .unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("# Description: Move legacy assets"));

    let state = engine.status().unwrap();
    assert_eq!(
        state.pending[0].description.as_deref(),
        Some("Move legacy assets")
    );
}

#[test]
fn create_rejects_bad_input() {
    let (temp, migrations) = project();
    let engine = engine(temp.path(), InProcessRunner::new());

    assert!(matches!(
        engine.create("!!!", None, "bash"),
        Err(MigrateError::InvalidName { .. })
    ));

    let err = engine.create("fine", None, "cobol").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown template 'cobol'. Available: bash, ts, python, node, ruby"
    );

    assert_eq!(fs::read_dir(&migrations).unwrap().count(), 0);
}
