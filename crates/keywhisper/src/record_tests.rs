// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;

fn values(store: &RecordStore) -> Vec<(&str, bool)> {
    store.records().iter().map(|r| (r.value(), r.is_consumed())).collect()
}

#[test]
fn parses_markers_and_drops_blank_lines() {
    let store = RecordStore::parse("users.txt", "alice\n#bob\n\n   \ncarol\n#\n");
    assert_eq!(values(&store), vec![("alice", false), ("bob", true), ("carol", false)]);
    assert_eq!(store.len(), 3);
    assert_eq!(store.consumed_count(), 1);
    assert_eq!(store.unconsumed(), vec![0, 2]);
}

#[test]
fn keeps_duplicates_and_order() {
    let store = RecordStore::parse("keys.txt", "K1\nK1\nK2");
    assert_eq!(values(&store), vec![("K1", false), ("K1", false), ("K2", false)]);
}

#[test]
fn records_know_their_file_line() {
    let store = RecordStore::parse("users.txt", "\nalice\n\n#bob\n");
    let lines: Vec<usize> = store.records().iter().map(MessageRecord::line).collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn crlf_terminators_are_not_part_of_the_value() {
    let store = RecordStore::parse("users.txt", "alice\r\n#bob\r\n");
    assert_eq!(values(&store), vec![("alice", false), ("bob", true)]);
    assert_eq!(store.serialize(), "alice\r\n#bob\r\n");
}

#[yare::parameterized(
    empty = { "" },
    only_blank = { "\n\n\n" },
    trailing_newline = { "alice\n#bob\n" },
    no_trailing_newline = { "alice\n#bob" },
    blank_runs = { "\n\nalice\n\n\n#bob\n\n" },
    lone_marker = { "#\nalice\n" },
    mixed_endings = { "alice\r\nbob\n#carol\r\n" },
)]
fn untouched_store_round_trips(input: &str) {
    let store = RecordStore::parse("f.txt", input);
    assert_eq!(store.serialize(), input);
}

proptest! {
    #[test]
    fn round_trip_is_byte_identical(
        lines in proptest::collection::vec("#?[a-zA-Z0-9 -]{0,12}", 0..20),
        crlf in any::<bool>(),
        trailing in any::<bool>(),
    ) {
        let sep = if crlf { "\r\n" } else { "\n" };
        let mut input = lines.join(sep);
        if trailing {
            input.push_str(sep);
        }
        let store = RecordStore::parse("f.txt", &input);
        prop_assert_eq!(store.serialize(), input);
    }
}

#[test]
fn load_reports_missing_file_as_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nope.txt");
    match RecordStore::load(&path) {
        Err(Error::FileUnavailable { path: p, not_found, .. }) => {
            assert!(not_found);
            assert_eq!(p, path);
        }
        other => anyhow::bail!("expected FileUnavailable, got {other:?}"),
    }
    Ok(())
}

#[test]
fn load_reports_directory_as_other_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    match RecordStore::load(dir.path()) {
        Err(Error::FileUnavailable { not_found, .. }) => assert!(!not_found),
        other => anyhow::bail!("expected FileUnavailable, got {other:?}"),
    }
    Ok(())
}

#[test]
fn mark_consumed_persists_marker_in_place() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("keys.txt");
    std::fs::write(&path, "AAAA-1111\n\n#OLD-0000\nBBBB-2222\n")?;

    let mut store = RecordStore::load(&path)?;
    store.mark_consumed(2)?;

    assert_eq!(std::fs::read_to_string(&path)?, "AAAA-1111\n\n#OLD-0000\n#BBBB-2222\n");

    let reloaded = RecordStore::load(&path)?;
    let record = reloaded.get(2).ok_or_else(|| anyhow::anyhow!("missing record"))?;
    assert!(record.is_consumed());
    assert_eq!(record.value(), "BBBB-2222");
    assert_eq!(reloaded.unconsumed(), vec![0]);
    Ok(())
}

#[test]
fn mark_consumed_twice_is_a_no_op() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.txt");
    std::fs::write(&path, "alice\n")?;

    let mut store = RecordStore::load(&path)?;
    store.mark_consumed(0)?;
    store.mark_consumed(0)?;
    assert_eq!(std::fs::read_to_string(&path)?, "#alice\n");
    Ok(())
}

#[test]
fn failed_rewrite_leaves_record_unconsumed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sub = dir.path().join("codes");
    std::fs::create_dir(&sub)?;
    let path = sub.join("keys.txt");
    std::fs::write(&path, "K1\nK2\n")?;

    let mut store = RecordStore::load(&path)?;
    std::fs::remove_dir_all(&sub)?;

    let result = store.mark_consumed(0);
    assert!(matches!(result, Err(Error::Persist { .. })), "{result:?}");
    assert_eq!(store.consumed_count(), 0);
    assert_eq!(store.unconsumed(), vec![0, 1]);
    assert_eq!(store.serialize(), "K1\nK2\n");
    Ok(())
}

#[test]
fn mark_consumed_rejects_unknown_index() {
    let mut store = RecordStore::parse("users.txt", "alice\n");
    crate::assert_err_contains!(store.mark_consumed(5), "no record at index 5");
}

#[test]
fn rewrite_leaves_no_temp_files_behind() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.txt");
    std::fs::write(&path, "alice\nbob\n")?;

    let mut store = RecordStore::load(&path)?;
    store.mark_consumed(0)?;
    store.mark_consumed(1)?;

    let entries: Vec<_> = std::fs::read_dir(dir.path())?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1);
    Ok(())
}
