use super::helpers::config;
use crate::Engine;
use tempfile::tempdir;

#[test]
fn get_checks_active_memtable_first() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), config(128, 1024)).unwrap();

    engine.set(b"k".to_vec(), b"from-memtable".to_vec()).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"from-memtable".to_vec()));
}

#[test]
fn get_falls_through_to_sstable_once_flushed() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), config(128, 1)).unwrap();

    engine.set(b"k1".to_vec(), b"v1".to_vec()).unwrap();
    // threshold=1 flushes synchronously inside set; the active memtable is
    // empty again by the time set returns.
    assert_eq!(engine.get(b"k1").unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn a_tombstone_shadows_an_older_value_in_an_sstable() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), config(128, 1)).unwrap();

    engine.set(b"k".to_vec(), b"old".to_vec()).unwrap(); // flushes to sstable #0
    engine.remove(b"k".to_vec()).unwrap(); // flushes a tombstone to sstable #1

    assert_eq!(engine.get(b"k").unwrap(), None);
}

#[test]
fn newest_sstable_wins_when_a_key_appears_in_several() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), config(128, 1)).unwrap();

    engine.set(b"k".to_vec(), b"v1".to_vec()).unwrap(); // sstable #0
    engine.set(b"k".to_vec(), b"v2".to_vec()).unwrap(); // sstable #1, newer

    assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn get_missing_key_is_none_even_with_sstables_present() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), config(128, 1)).unwrap();

    engine.set(b"k".to_vec(), b"v".to_vec()).unwrap();
    assert_eq!(engine.get(b"nope").unwrap(), None);
}

#[test]
fn reads_still_work_after_spanning_many_partitions() {
    let dir = tempdir().unwrap();
    // Small part_size forces the flushed table to have many partitions,
    // exercising the sparse-index lookup on every get below.
    let engine = Engine::open(dir.path(), config(4, 1000)).unwrap();

    for i in 0..200u32 {
        engine
            .set(format!("k{i:04}").into_bytes(), format!("v{i}").into_bytes())
            .unwrap();
    }
    engine.flush().unwrap();

    for i in 0..200u32 {
        assert_eq!(
            engine.get(format!("k{i:04}").as_bytes()).unwrap(),
            Some(format!("v{i}").into_bytes())
        );
    }
}
