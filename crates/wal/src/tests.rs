use super::*;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

fn set(key: &[u8], value: &[u8]) -> Command {
    Command::Set {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

fn remove(key: &[u8]) -> Command {
    Command::Remove { key: key.to_vec() }
}

fn replay_all(path: &std::path::Path) -> Result<Vec<Command>, WalError> {
    WalReader::open(path)?.replay()
}

fn replay_from_bytes(data: &[u8]) -> Result<Vec<Command>, WalError> {
    WalReader::from_reader(Cursor::new(data.to_vec())).replay()
}

#[test]
fn write_and_replay_set_and_remove() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"k", b"v1")).unwrap();
        w.append(&set(b"k2", b"v2")).unwrap();
        w.append(&remove(b"k")).unwrap();
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs, vec![set(b"k", b"v1"), set(b"k2", b"v2"), remove(b"k")]);
}

#[test]
fn truncated_tail_after_valid_records_is_dropped_not_errored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"k1", b"v1")).unwrap();
        w.append(&set(b"k2", b"v2")).unwrap();
    }

    let mut data = fs::read(&path).unwrap();
    data.extend_from_slice(&[0x20, 0x00, 0x00, 0x00]); // bogus frame length, no body
    fs::write(&path, &data).unwrap();

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs, vec![set(b"k1", b"v1"), set(b"k2", b"v2")]);
}

#[test]
fn replay_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    fs::write(&path, b"").unwrap();

    assert!(replay_all(&path).unwrap().is_empty());
}

#[test]
fn replay_empty_in_memory() {
    assert!(replay_from_bytes(b"").unwrap().is_empty());
}

#[test]
fn truncated_length_prefix_is_ok() {
    let result = replay_from_bytes(&[0, 1, 2]);
    assert!(result.unwrap().is_empty());
}

#[test]
fn open_non_existent_file_returns_io_error() {
    let result = WalReader::open("/tmp/non_existent_wal_kv_engine.log");
    assert!(matches!(result, Err(WalError::Io(_))));
}

#[test]
fn empty_key_and_value_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"", b"")).unwrap();
    }

    assert_eq!(replay_all(&path).unwrap(), vec![set(b"", b"")]);
}

#[test]
fn rotate_starts_a_fresh_empty_wal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let mut w = WalWriter::create(&path).unwrap();
    w.append(&set(b"a", b"1")).unwrap();
    w.rotate().unwrap();
    w.append(&set(b"b", b"2")).unwrap();
    drop(w);

    assert_eq!(replay_all(&path).unwrap(), vec![set(b"b", b"2")]);
}

#[test]
fn large_value_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let big_val = vec![b'x'; 1_000_000];

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"big", &big_val)).unwrap();
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), 1);
    match &recs[0] {
        Command::Set { value, .. } => assert_eq!(value.len(), 1_000_000),
        Command::Remove { .. } => panic!("expected Set"),
    }
}

#[test]
fn append_to_existing_wal_continues_from_the_end() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"a", b"1")).unwrap();
    }
    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(b"b", b"2")).unwrap();
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs, vec![set(b"a", b"1"), set(b"b", b"2")]);
}

#[test]
fn binary_key_and_value_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let key = vec![0x00u8, 0xFF, 0x80];
    let value = vec![0xDEu8, 0xAD, 0xBE, 0xEF];

    {
        let mut w = WalWriter::create(&path).unwrap();
        w.append(&set(&key, &value)).unwrap();
    }

    assert_eq!(replay_all(&path).unwrap(), vec![set(&key, &value)]);
}

#[test]
fn many_records_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let n = 2_000usize;
    {
        let mut w = WalWriter::create(&path).unwrap();
        for i in 0..n {
            w.append(&set(format!("key{}", i).as_bytes(), format!("val{}", i).as_bytes()))
                .unwrap();
        }
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), n);
    for (i, rec) in recs.iter().enumerate() {
        assert_eq!(rec, &set(format!("key{}", i).as_bytes(), format!("val{}", i).as_bytes()));
    }
}

#[test]
fn interleaved_sets_and_removes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path).unwrap();
        for i in 0u32..300 {
            if i % 3 == 0 {
                w.append(&remove(format!("k{}", i).as_bytes())).unwrap();
            } else {
                w.append(&set(format!("k{}", i).as_bytes(), b"v")).unwrap();
            }
        }
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), 300);
    let remove_count = recs.iter().filter(|c| c.is_tombstone()).count();
    assert_eq!(remove_count, 100);
}
