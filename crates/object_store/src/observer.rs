//! Optional observability hooks (low-cardinality counters and spans).
//!
//! By default every hook is a no-op, and a process may register one global
//! observer (typically the `telemetry` crate's `TracingObserver` or an
//! OTel-backed one) to receive metrics/spans without `object_store` itself
//! depending on `tracing` or any exporter.

use std::any::Any;
use std::sync::OnceLock;

/// Observer hooks for store-level events. All methods are no-ops by default;
/// implement only the ones you care about.
pub trait Observer: Send + Sync {
    /// A loose object was durably written (new content, not a duplicate).
    fn object_added(&self, _bytes: u64) {}
    /// Bytes returned by a read path (loose or packed).
    fn bytes_read(&self, _n: u64) {}
    /// Bytes appended to a pack file by `PackWriter`.
    fn bytes_written(&self, _n: u64) {}
    /// A pack file rolled over to a new `pack_id`.
    fn pack_rolled_over(&self, _new_pack_id: u64) {}
    /// `pack_all_loose` migrated this many objects in one committed batch.
    fn objects_migrated(&self, _n: u64) {}
    /// Start an optional span; dropping the returned guard ends it.
    fn span(&self, _name: &'static str) -> ObserverSpan {
        ObserverSpan::noop()
    }
}

/// Guard object for optional spans. Holds a type-erased guard that exits on
/// drop, so `Observer` implementors can wrap any tracing/otel span type.
pub struct ObserverSpan {
    _guard: Option<Box<dyn Any>>,
}

impl ObserverSpan {
    /// A span guard that does nothing on drop.
    pub fn noop() -> Self {
        Self { _guard: None }
    }

    /// Wrap an arbitrary guard object; dropping this ends the underlying span.
    pub fn from_guard<G: 'static>(guard: G) -> Self {
        Self { _guard: Some(Box::new(guard)) }
    }
}

struct NoopObserver;
impl Observer for NoopObserver {}

static NOOP: NoopObserver = NoopObserver;
static OBSERVER: OnceLock<&'static dyn Observer> = OnceLock::new();

/// Register a global observer (optional). Safe to call at most once;
/// subsequent calls are ignored.
pub fn set_observer(observer: &'static dyn Observer) {
    let _ = OBSERVER.set(observer);
}

/// The currently registered observer, or a no-op if none was registered.
pub fn observer() -> &'static dyn Observer {
    OBSERVER.get().copied().unwrap_or(&NOOP)
}
