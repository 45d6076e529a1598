/// Instrumentation module - observers of Surface lifecycle events
///
/// Observers are read-only: they are notified of draws, draw errors and
/// diagnostics but never change scheduling decisions. A Surface notifies its
/// own observers and the process-wide ones.

pub mod diagnostic;
pub mod observer;
pub mod counters_observer;
pub mod log_observer;

pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticCategory};
pub use observer::{
    Observer, ObserverId, ObserverRegistry, ObserverRegistrySnapshot,
    SurfaceId, SurfaceInfo, PassInfo,
};
pub use counters_observer::{CountersObserver, Counters};
pub use log_observer::LogObserver;
