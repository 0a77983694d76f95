use super::helpers::*;
use config::ReadOptions;
use tempfile::tempdir;

#[test]
fn snapshot_freezes_the_file_list() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), 1, &[(b"a", Some(b"1"))]);

    let engine = open(dir.path());
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.file_ids(), &[1]);

    write_file(dir.path(), 2, &[(b"b", Some(b"2"))]);
    engine.install_file(2).unwrap();

    // The old snapshot does not see the new file; a new one does.
    assert_eq!(snapshot.file_ids(), &[1]);
    assert_eq!(engine.snapshot().file_ids(), &[1, 2]);
}

#[test]
fn empty_store_snapshot_has_no_files() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path());
    assert!(engine.snapshot().file_ids().is_empty());
}

#[test]
fn pinned_files_cannot_be_removed() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), 1, &[(b"a", Some(b"1"))]);

    let engine = open(dir.path());
    let snapshot = engine.snapshot();
    assert!(!engine.remove_file(1).unwrap());
    assert!(engine.filepath(1).exists());

    drop(snapshot);
    assert!(engine.remove_file(1).unwrap());
    assert!(!engine.filepath(1).exists());
}

#[test]
fn overlapping_snapshots_keep_the_pin_until_the_last_drops() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), 1, &[(b"a", Some(b"1"))]);

    let engine = open(dir.path());
    let first = engine.snapshot();
    let second = engine.snapshot();

    drop(first);
    assert!(!engine.remove_file(1).unwrap());

    drop(second);
    assert!(engine.remove_file(1).unwrap());
}

#[test]
fn removal_purges_the_index() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), 1, &[(b"a", Some(b"1"))]);
    write_file(dir.path(), 2, &[(b"b", Some(b"2"))]);

    let engine = open(dir.path());
    assert!(engine.remove_file(1).unwrap());

    assert!(engine.get(&ReadOptions::default(), b"a").unwrap().is_none());
    assert!(engine.get(&ReadOptions::default(), b"b").unwrap().is_some());
    assert_eq!(engine.file_count(), 1);
}

#[test]
fn cached_mapping_with_readers_blocks_removal() {
    let dir = tempdir().unwrap();
    let locations = write_file(dir.path(), 1, &[(b"a", Some(b"1"))]);

    let engine = open(dir.path());
    // Hold a mapping reference the way an in-flight reader would.
    let mapped = engine
        .inner()
        .files
        .open(1, true)
        .unwrap();
    let _ = engine.get_entry(&ReadOptions::default(), locations[0]);

    assert!(!engine.remove_file(1).unwrap());
    drop(mapped);
    assert!(engine.remove_file(1).unwrap());
}
