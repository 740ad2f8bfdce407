use object_store::Container;

fn open() -> (tempfile::TempDir, Container) {
    let dir = tempfile::tempdir().unwrap();
    let cnt = Container::init_container(dir.path(), 1 << 20, "zlib:+1", "sha256", 2, false).unwrap();
    (dir, cnt)
}

#[test]
fn batched_read_mixes_loose_and_packed_sources() {
    let (_dir, cnt) = open();
    let loose_key = cnt.add_object(b"loose payload").unwrap();

    let packed_contents = vec![b"packed-one".to_vec(), b"packed-two".to_vec()];
    let packed_keys = cnt.add_objects_to_pack(&packed_contents, false).unwrap();

    let mut keys = vec![loose_key.clone()];
    keys.extend(packed_keys.clone());

    let found = cnt.get_objects_content(&keys, false).unwrap();
    assert_eq!(found.get(&loose_key).unwrap().as_deref(), Some(&b"loose payload"[..]));
    assert_eq!(found.get(&packed_keys[0]).unwrap().as_deref(), Some(&b"packed-one"[..]));
    assert_eq!(found.get(&packed_keys[1]).unwrap().as_deref(), Some(&b"packed-two"[..]));
}

#[test]
fn skip_if_missing_true_omits_absent_keys() {
    let (_dir, cnt) = open();
    let present = cnt.add_object(b"present").unwrap();
    let absent = "0".repeat(64);

    let found = cnt.get_objects_content(&[present.clone(), absent.clone()], true).unwrap();
    assert!(found.contains_key(&present));
    assert!(!found.contains_key(&absent));
}

#[test]
fn skip_if_missing_false_reports_absent_keys_as_none() {
    let (_dir, cnt) = open();
    let present = cnt.add_object(b"present").unwrap();
    let absent = "1".repeat(64);

    let found = cnt.get_objects_content(&[present.clone(), absent.clone()], false).unwrap();
    assert_eq!(found.get(&present).unwrap().as_deref(), Some(&b"present"[..]));
    assert_eq!(found.get(&absent).unwrap(), &None);
}

#[test]
fn single_get_on_missing_key_is_not_found() {
    let (_dir, cnt) = open();
    let missing = "2".repeat(64);
    let err = cnt.get_object_content(&missing).unwrap_err();
    assert!(matches!(err, object_store::Error::NotFound));
}
