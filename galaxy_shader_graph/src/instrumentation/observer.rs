/// Observer trait and the registry that holds observers

use std::fmt;
use std::sync::Arc;
use crate::error::Error;
use crate::graph::NodeId;
use super::diagnostic::Diagnostic;

/// Process-unique Surface identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Surface described to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub id: SurfaceId,
    pub name: String,
}

/// Pass described to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassInfo {
    pub id: NodeId,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Receives Surface lifecycle events
///
/// Every method defaults to a no-op. Observers must not assume they are
/// called from any particular thread; a Surface calls them synchronously
/// from whichever thread drives it.
pub trait Observer: Send + Sync {
    /// A draw of at least one pass is about to start
    fn on_surface_draw_start(&self, _surface: &SurfaceInfo) {}

    /// The draw started by `on_surface_draw_start` ended
    fn on_surface_draw_end(&self, _surface: &SurfaceInfo) {}

    /// A pass drew successfully
    fn on_node_draw(&self, _surface: &SurfaceInfo, _pass: &PassInfo) {}

    /// A pass draw call failed, the pass stays dirty
    fn on_node_draw_error(&self, _surface: &SurfaceInfo, _pass: &PassInfo, _error: &Error) {}

    /// A draw was requested but skipped (preload pending or context lost)
    fn on_surface_draw_skipped(&self, _surface: &SurfaceInfo) {}

    /// A diagnostic was reported
    fn on_diagnostic(&self, _surface: &SurfaceInfo, _diagnostic: &Diagnostic) {}
}

/// Identifier returned when registering an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

/// Saved registry contents, see `ObserverRegistry::snapshot`
#[derive(Clone)]
pub struct ObserverRegistrySnapshot {
    observers: Vec<(ObserverId, Arc<dyn Observer>)>,
    next_id: u64,
}

/// Ordered set of observers
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<(ObserverId, Arc<dyn Observer>)>,
    next_id: u64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer, notified after the existing ones
    pub fn add(&mut self, observer: Arc<dyn Observer>) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    /// Unregister an observer
    ///
    /// Returns false if the id is unknown; removing twice is harmless.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    /// Observers in registration order, cloned so they can be notified
    /// without holding the registry lock
    pub fn observers(&self) -> Vec<Arc<dyn Observer>> {
        self.observers.iter().map(|(_, observer)| Arc::clone(observer)).collect()
    }

    /// Save the current contents
    pub fn snapshot(&self) -> ObserverRegistrySnapshot {
        ObserverRegistrySnapshot {
            observers: self.observers.clone(),
            next_id: self.next_id,
        }
    }

    /// Restore contents saved by `snapshot`
    ///
    /// Ids handed out after the snapshot are never reused.
    pub fn restore(&mut self, snapshot: ObserverRegistrySnapshot) {
        self.observers = snapshot.observers;
        self.next_id = self.next_id.max(snapshot.next_id);
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
