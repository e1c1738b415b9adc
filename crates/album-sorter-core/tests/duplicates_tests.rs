mod common;

use album_sorter_core::duplicates::GroupStatus;
use album_sorter_core::{Organizer, QualityClass, RunMode};
use common::{FixtureReader, Library};
use std::sync::Arc;

fn organizer(config: album_sorter_core::Config) -> Organizer {
    Organizer::new(config)
        .unwrap()
        .with_reader(Arc::new(FixtureReader))
}

/// Same release in FLAC and 320k MP3, plus an unrelated album
fn organized_library(lib: &Library) {
    let dest = lib.destination();
    lib.tagged_album(
        &dest.join("Lossless/Autechre/Amber (1994)"),
        "Autechre",
        "Amber",
        "1994",
        "flac",
        0,
        3,
    );
    lib.tagged_album(
        &dest.join("Lossy/Autechre/Amber (1994)"),
        "autechre",
        "AMBER",
        "1994",
        "mp3",
        320,
        3,
    );
    lib.tagged_album(
        &dest.join("Lossy/Autechre/Incunabula (1993)"),
        "Autechre",
        "Incunabula",
        "1993",
        "mp3",
        320,
        3,
    );
}

#[test]
fn test_find_duplicates_ranks_lossless_first() {
    let lib = Library::new();
    organized_library(&lib);

    let report = organizer(lib.config(RunMode::DryRun))
        .find_duplicates()
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.members.len(), 2);
    assert!(group.members[0].keep);
    assert_eq!(group.members[0].quality, QualityClass::Lossless);
    assert_eq!(group.members[0].score, 1000);
    assert_eq!(group.members[1].score, 700);
    assert!(!group.members[1].keep);
    assert_eq!(report.reclaimable_bytes, group.members[1].total_size);
}

#[test]
fn test_groups_are_rebuilt_each_pass() {
    let lib = Library::new();
    organized_library(&lib);
    let organizer = organizer(lib.config(RunMode::DryRun));

    assert_eq!(organizer.find_duplicates().unwrap().groups.len(), 1);
    std::fs::remove_dir_all(lib.destination().join("Lossy/Autechre/Amber (1994)")).unwrap();
    assert!(organizer.find_duplicates().unwrap().is_empty());
}

#[test]
fn test_resolve_moves_extra_copy_to_backup() {
    let lib = Library::new();
    organized_library(&lib);

    let (report, summary) = organizer(lib.config(RunMode::Live))
        .resolve_duplicates()
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.groups_resolved, 1);

    assert!(lib
        .destination()
        .join("Lossless/Autechre/Amber (1994)/01.flac")
        .exists());
    assert!(!lib.destination().join("Lossy/Autechre/Amber (1994)").exists());
    assert!(lib
        .destination()
        .join("Lossy/Autechre/Incunabula (1993)")
        .exists());

    let backup = lib.root.path().join("backup");
    let batch = std::fs::read_dir(&backup).unwrap().next().unwrap().unwrap().path();
    assert!(batch.join("Lossy/Autechre/Amber (1994)/01.mp3").exists());
}

#[test]
fn test_resolve_dry_run_moves_nothing() {
    let lib = Library::new();
    organized_library(&lib);

    let (_, summary) = organizer(lib.config(RunMode::DryRun))
        .resolve_duplicates()
        .unwrap();

    assert_eq!(summary.moved, 1);
    assert!(lib.destination().join("Lossy/Autechre/Amber (1994)").exists());
    assert!(!lib.root.path().join("backup").exists());

    let report = organizer(lib.config(RunMode::DryRun))
        .find_duplicates()
        .unwrap();
    assert_eq!(report.groups[0].status, GroupStatus::Pending);
}
