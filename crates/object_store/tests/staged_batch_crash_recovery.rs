// Exercises the do_commit=false path: pack bytes land durably on disk but
// the catalog transaction is deferred. Dropping the `StagedBatch` without
// calling `commit` simulates a crash between the two steps; reopening the
// container must truncate the dead tail rather than leave it resolvable.

use object_store::Container;

#[test]
fn uncommitted_batch_is_invisible_and_tail_is_recovered_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let committed_key;
    let staged_key;
    {
        let cnt = Container::init_container(root, 1 << 20, "zlib:+1", "sha256", 2, false).unwrap();

        let committed = cnt.add_objects_to_pack(&[b"durable".to_vec()], false).unwrap();
        committed_key = committed[0].clone();

        let staged = cnt.add_objects_to_pack_staged(&[b"never committed".to_vec()], false).unwrap();
        staged_key = object_store::digest_hex(cnt.config().hash_type, b"never committed");
        drop(staged); // simulated crash: bytes on disk, catalog row never written
    }

    // Reopen: recovery truncates the pack back to the last committed offset.
    let cnt = Container::open(root).unwrap();
    assert_eq!(cnt.get_object_content(&committed_key).unwrap(), b"durable");
    assert!(matches!(
        cnt.get_object_content(&staged_key).unwrap_err(),
        object_store::Error::NotFound
    ));
    assert_eq!(cnt.count_objects().unwrap(), 1);

    // The recovered writer can still append past the truncated tail.
    let fresh = cnt.add_objects_to_pack(&[b"after recovery".to_vec()], false).unwrap();
    assert_eq!(cnt.get_object_content(&fresh[0]).unwrap(), b"after recovery");
    assert_eq!(cnt.count_objects().unwrap(), 2);
}

#[test]
fn staged_batch_becomes_visible_once_committed() {
    let dir = tempfile::tempdir().unwrap();
    let cnt = Container::init_container(dir.path(), 1 << 20, "zlib:+1", "sha256", 2, false).unwrap();

    let staged = cnt.add_objects_to_pack_staged(&[b"one".to_vec(), b"two".to_vec()], false).unwrap();
    let key_one = object_store::digest_hex(cnt.config().hash_type, b"one");

    // Not yet visible: the catalog transaction hasn't run.
    assert!(matches!(
        cnt.get_object_content(&key_one).unwrap_err(),
        object_store::Error::NotFound
    ));

    let keys = staged.commit().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(cnt.get_object_content(&key_one).unwrap(), b"one");
}
