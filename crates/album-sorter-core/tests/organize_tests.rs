mod common;

use album_sorter_core::persistence::{content_signature, LibraryStore, MoveStatus, StateTracker};
use album_sorter_core::{LayoutPolicy, Organizer, ProcessingStatus, RunMode};
use common::{snapshot, FixtureReader, Library};
use std::fs;
use std::sync::Arc;

fn organizer(config: album_sorter_core::Config) -> Organizer {
    Organizer::new(config)
        .unwrap()
        .with_reader(Arc::new(FixtureReader))
}

#[test]
fn test_dry_run_leaves_tree_unchanged() {
    let lib = Library::new();
    lib.tagged_album(&lib.source().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 3);
    lib.untagged_album(&lib.source().join("noise"), 2);
    let before = snapshot(&lib.source());

    let summary = organizer(lib.config(RunMode::DryRun))
        .organize(&lib.source())
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.held, 1);
    assert_eq!(snapshot(&lib.source()), before);
    assert!(!lib.destination().exists());
    assert!(!lib.holding().exists());
}

#[test]
fn test_live_run_organizes_and_holds() {
    let lib = Library::new();
    lib.tagged_album(&lib.source().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 3);
    lib.untagged_album(&lib.source().join("noise"), 2);

    let summary = organizer(lib.config(RunMode::Live))
        .organize(&lib.source())
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.held, 1);
    assert_eq!(summary.failed, 0);

    let organized = lib.destination().join("Lossy/Burial/Untrue (2007)");
    assert!(organized.join("01.mp3").exists());
    assert!(lib.holding().join("noise/01.flac").exists());
    assert!(!lib.source().join("a").exists());

    let state = StateTracker::open(&lib.root.path().join("state")).unwrap();
    let held = state.get(&lib.source().join("noise")).unwrap().unwrap();
    assert_eq!(held.status, ProcessingStatus::Held);
    assert_eq!(held.reason.as_deref(), Some("insufficient reconstructed metadata"));
}

#[test]
fn test_second_copy_is_already_organized() {
    let lib = Library::new();
    let config = lib.config(RunMode::Live);
    lib.tagged_album(&lib.source().join("first"), "Burial", "Untrue", "2007", "flac", 0, 2);
    organizer(config.clone()).organize(&lib.source()).unwrap();

    lib.tagged_album(&lib.source().join("again"), "Burial", "Untrue", "2007", "flac", 0, 2);
    let summary = organizer(config).organize(&lib.source()).unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.already_organized, 1);
    assert!(lib.source().join("again/01.flac").exists());
}

#[test]
fn test_reconstructed_scene_release() {
    let lib = Library::new();
    lib.untagged_album(
        &lib.source().join("theo_parrish-the_twin_cities_ep-hp007-2004-sweet"),
        2,
    );

    organizer(lib.config(RunMode::Live))
        .organize(&lib.source())
        .unwrap();

    assert!(lib
        .destination()
        .join("Lossless/theo parrish/the twin cities ep (2004) [HP007]/01.flac")
        .exists());
}

#[test]
fn test_hybrid_layout_counts_label_releases() {
    let lib = Library::new();
    let mut config = lib.config(RunMode::Live);
    config.layout = LayoutPolicy::Hybrid;
    config.min_label_releases = 1;
    config.alias_groups = vec![vec!["Aphex Twin".into(), "AFX".into()]];

    lib.tagged_album(&lib.source().join("x"), "AFX", "Analord", "2005", "mp3", 192, 1);
    organizer(config).organize(&lib.source()).unwrap();

    // No label tag, so the hybrid layout falls back to the canonical artist
    assert!(lib
        .destination()
        .join("Lossy/Aphex Twin/Analord (2005)/01.mp3")
        .exists());
}

#[test]
fn test_incremental_state_follows_directory_changes() {
    let lib = Library::new();
    let state_dir = lib.root.path().join("state");
    let dir = lib.untagged_album(&lib.source().join("kept"), 1);

    {
        let state = StateTracker::open(&state_dir).unwrap();
        let signature = content_signature(&dir).unwrap();
        state
            .record(&dir, &signature, ProcessingStatus::Success, None)
            .unwrap();
    }

    // Reopened store still knows the directory
    let state = StateTracker::open(&state_dir).unwrap();
    assert!(!state.needs_processing(&dir).unwrap());

    fs::write(dir.join("02.flac"), b"").unwrap();
    assert!(state.needs_processing(&dir).unwrap());
}

#[test]
fn test_incremental_run_skips_unchanged() {
    let lib = Library::new();
    let mut config = lib.config(RunMode::Live);
    config.incremental = true;
    let dir = lib.tagged_album(&lib.source().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 1);

    {
        let state = StateTracker::open(&lib.root.path().join("state")).unwrap();
        state
            .record(&dir, &content_signature(&dir).unwrap(), ProcessingStatus::Success, None)
            .unwrap();
    }

    let summary = organizer(config).organize(&lib.source()).unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(dir.join("01.mp3").exists());
}

#[test]
fn test_relative_source_is_recorded_by_absolute_path() {
    let lib = Library::new();
    let config = lib.config(RunMode::Live);
    // Relative to the test's working directory
    let incoming = tempfile::Builder::new()
        .prefix("relative-incoming")
        .tempdir_in(".")
        .unwrap();
    assert!(incoming.path().is_relative());
    lib.tagged_album(&incoming.path().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 1);
    let absolute = incoming.path().canonicalize().unwrap().join("a");

    let summary = organizer(config).organize(incoming.path()).unwrap();
    assert_eq!(summary.processed, 1);

    let state = StateTracker::open(&lib.root.path().join("state")).unwrap();
    let record = state.get(&absolute).unwrap().unwrap();
    assert_eq!(record.status, ProcessingStatus::Success);
    assert!(state.get(&incoming.path().join("a")).unwrap().is_none());
}

#[test]
fn test_moves_are_journaled_and_undoable() {
    let lib = Library::new();
    let config = lib.config(RunMode::Live);
    lib.tagged_album(&lib.source().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 1);

    let organizer = organizer(config);
    organizer.organize(&lib.source()).unwrap();

    let id = {
        let journal = LibraryStore::open(&lib.root.path().join("state")).unwrap();
        let moves = journal.list_moves().unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].status, MoveStatus::Committed);
        moves[0].id
    };

    organizer.undo_move(id).unwrap();
    assert!(lib.source().join("a/01.mp3").exists());
    assert!(!lib.destination().join("Lossy/Burial/Untrue (2007)").exists());
}

#[test]
fn test_worker_mode_sums_summaries() {
    let lib = Library::new();
    let mut config = lib.config(RunMode::Live);
    config.workers = 3;
    for (dir, title) in [("a", "One"), ("b", "Two"), ("c", "Three"), ("d", "Four")] {
        lib.tagged_album(&lib.source().join(dir), "Artist", title, "2010", "flac", 0, 1);
    }

    let summary = organizer(config).organize(&lib.source()).unwrap();
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.total(), 4);
    assert!(lib.destination().join("Lossless/Artist/Three (2010)").exists());
}

#[test]
fn test_store_lock_is_fatal() {
    let lib = Library::new();
    lib.tagged_album(&lib.source().join("a"), "Burial", "Untrue", "2007", "mp3", 320, 1);
    let _held = StateTracker::open(&lib.root.path().join("state")).unwrap();

    let result = organizer(lib.config(RunMode::Live)).organize(&lib.source());
    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert!(lib.source().join("a/01.mp3").exists());
}
