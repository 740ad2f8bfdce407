// TracingObserver must not disturb store semantics: registering it and
// driving a container through add/get/pack should behave identically to no
// observer at all.

use object_store::{CompressMode, Container};
use telemetry::object_store_observer::tracing_observer;

#[test]
fn tracing_observer_does_not_change_store_behavior() {
    object_store::set_observer(tracing_observer());

    let dir = tempfile::tempdir().unwrap();
    let cnt = Container::init_container(dir.path(), 1 << 20, "zlib:+1", "sha256", 2, false).unwrap();

    let key = cnt.add_object(b"observed").unwrap();
    assert_eq!(cnt.get_object_content(&key).unwrap(), b"observed");

    let migrated = cnt.pack_all_loose(CompressMode::No).unwrap();
    assert_eq!(migrated, 1);
    assert_eq!(cnt.get_object_content(&key).unwrap(), b"observed");
}
