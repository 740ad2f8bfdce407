use std::path::PathBuf;
use std::time::Duration;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_json_logging();

    #[cfg(feature = "otel")]
    {
        telemetry::init_otel("object-store-demo")?;
        object_store::set_observer(telemetry::object_store_observer::otel_observer());
    }
    #[cfg(not(feature = "otel"))]
    {
        object_store::set_observer(telemetry::object_store_observer::tracing_observer());
    }

    let dir = std::env::temp_dir().join("object_store_otlp_demo");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir)?;

    let cnt = object_store::Container::init_container(
        &PathBuf::from(&dir),
        4 * 1024 * 1024,
        "zlib:+1",
        "sha256",
        2,
        false,
    )?;

    let key = cnt.add_object(b"hello otlp")?;
    let got = cnt.get_object_content(&key)?;
    assert_eq!(got, b"hello otlp");

    let migrated = cnt.pack_all_loose(object_store::CompressMode::Yes)?;
    println!("migrated {migrated} objects into packs");

    #[cfg(feature = "otel")]
    {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    #[cfg(not(feature = "otel"))]
    {
        let _ = Duration::from_millis(0);
    }

    Ok(())
}
