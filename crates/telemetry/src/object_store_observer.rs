//! Observers for `object_store`'s pack/catalog/migration events.
//!
//! `TracingObserver` is always available and needs nothing but `tracing`: it
//! emits spans and events via `tracing::span!`/`debug!`/`info!`.
//! `OtelObserver` (behind the `otel` feature) additionally records OTel
//! counters for the same events.

use object_store::{Observer, ObserverSpan};

/// Observer that logs via `tracing` only (no metrics backend required).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn object_added(&self, bytes: u64) {
        tracing::debug!(bytes, "object_store.object_added");
    }

    fn bytes_read(&self, n: u64) {
        tracing::debug!(bytes = n, "object_store.bytes_read");
    }

    fn bytes_written(&self, n: u64) {
        tracing::debug!(bytes = n, "object_store.bytes_written");
    }

    fn pack_rolled_over(&self, new_pack_id: u64) {
        tracing::info!(new_pack_id, "object_store.pack_rolled_over");
    }

    fn objects_migrated(&self, n: u64) {
        tracing::info!(count = n, "object_store.objects_migrated");
    }

    fn span(&self, name: &'static str) -> ObserverSpan {
        let span = tracing::span!(tracing::Level::INFO, "object_store", op = name);
        ObserverSpan::from_guard(span.entered())
    }
}

/// Returns a global `&'static TracingObserver` suitable for
/// `object_store::set_observer()`.
pub fn tracing_observer() -> &'static TracingObserver {
    static INSTANCE: TracingObserver = TracingObserver;
    &INSTANCE
}

#[cfg(feature = "otel")]
mod otel_observer {
    use super::*;
    use once_cell::sync::OnceCell;
    use opentelemetry::metrics::{Counter, Meter, Unit};
    use opentelemetry::{global, KeyValue};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Instruments {
        bytes_read: Counter<u64>,
        bytes_written: Counter<u64>,
        objects_migrated: Counter<u64>,
        pack_rollovers: Counter<u64>,
    }

    static INSTR: OnceCell<Instruments> = OnceCell::new();
    static INSTANCE: OnceCell<OtelObserver> = OnceCell::new();

    // Test-visible mirrors, to assert increments without exporter plumbing.
    static READ_ACC: AtomicU64 = AtomicU64::new(0);
    static WRITTEN_ACC: AtomicU64 = AtomicU64::new(0);
    static MIGRATED_ACC: AtomicU64 = AtomicU64::new(0);

    fn ensure_instruments() -> &'static Instruments {
        INSTR.get_or_init(|| {
            // Uses the global meter provider (a no-op unless OTLP export was
            // configured separately); the accumulators above give tests a way
            // to assert counts without an exporter.
            let meter: Meter = global::meter("object_store");
            Instruments {
                bytes_read: meter
                    .u64_counter("object_store.bytes.read")
                    .with_unit(Unit::new("By"))
                    .init(),
                bytes_written: meter
                    .u64_counter("object_store.bytes.written")
                    .with_unit(Unit::new("By"))
                    .init(),
                objects_migrated: meter.u64_counter("object_store.objects.migrated").init(),
                pack_rollovers: meter.u64_counter("object_store.pack.rollovers").init(),
            }
        })
    }

    /// OTel-backed observer for pack/catalog/migration metrics.
    #[derive(Clone, Copy)]
    pub struct OtelObserver;

    impl Observer for OtelObserver {
        fn bytes_read(&self, n: u64) {
            if n > 0 {
                ensure_instruments().bytes_read.add(n, &[KeyValue::new("op", "read")]);
                let _ = READ_ACC.fetch_add(n, Ordering::Relaxed);
            }
        }
        fn bytes_written(&self, n: u64) {
            if n > 0 {
                ensure_instruments().bytes_written.add(n, &[KeyValue::new("op", "write")]);
                let _ = WRITTEN_ACC.fetch_add(n, Ordering::Relaxed);
            }
        }
        fn objects_migrated(&self, n: u64) {
            if n > 0 {
                ensure_instruments().objects_migrated.add(n, &[]);
                let _ = MIGRATED_ACC.fetch_add(n, Ordering::Relaxed);
            }
        }
        fn pack_rolled_over(&self, new_pack_id: u64) {
            ensure_instruments()
                .pack_rollovers
                .add(1, &[KeyValue::new("pack_id", new_pack_id as i64)]);
        }
        fn span(&self, name: &'static str) -> ObserverSpan {
            let span = tracing::span!(tracing::Level::INFO, "object_store", op = name);
            ObserverSpan::from_guard(span.entered())
        }
    }

    /// Returns a global `&'static OtelObserver` suitable for
    /// `object_store::set_observer()`.
    pub fn otel_observer() -> &'static OtelObserver {
        INSTANCE.get_or_init(|| {
            let _ = ensure_instruments();
            OtelObserver
        })
    }

    /// Snapshot test mirrors (for integration tests).
    pub fn snapshot_counters() -> (u64, u64, u64) {
        (
            READ_ACC.load(Ordering::Relaxed),
            WRITTEN_ACC.load(Ordering::Relaxed),
            MIGRATED_ACC.load(Ordering::Relaxed),
        )
    }
}

#[cfg(feature = "otel")]
pub use otel_observer::{otel_observer, snapshot_counters, OtelObserver};
