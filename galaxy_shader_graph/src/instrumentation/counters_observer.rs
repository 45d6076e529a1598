/// Observer counting events globally, per Surface and per pass

use std::sync::Mutex;
use rustc_hash::FxHashMap;
use crate::error::Error;
use crate::graph::NodeId;
use super::diagnostic::Diagnostic;
use super::observer::{Observer, SurfaceId, SurfaceInfo, PassInfo};

/// Event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub surface_draw_start: u64,
    pub surface_draw_end: u64,
    pub surface_draw_skipped: u64,
    pub node_draw: u64,
    pub node_draw_error: u64,
    pub diagnostics: u64,
}

#[derive(Default)]
struct CountersState {
    global: Counters,
    surfaces: FxHashMap<SurfaceId, Counters>,
    passes: FxHashMap<(SurfaceId, NodeId), Counters>,
}

/// Counts every event it observes
///
/// Surface counters include the node events of that Surface; pass counters
/// only hold `node_draw` and `node_draw_error`.
#[derive(Default)]
pub struct CountersObserver {
    state: Mutex<CountersState>,
}

impl CountersObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of every Surface combined
    pub fn global(&self) -> Counters {
        self.state.lock().map(|state| state.global).unwrap_or_default()
    }

    /// Counters of one Surface
    pub fn surface(&self, surface: SurfaceId) -> Counters {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.surfaces.get(&surface).copied())
            .unwrap_or_default()
    }

    /// Counters of one pass
    pub fn pass(&self, surface: SurfaceId, pass: NodeId) -> Counters {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.passes.get(&(surface, pass)).copied())
            .unwrap_or_default()
    }

    /// Forget every count
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = CountersState::default();
        }
    }

    fn count(&self, surface: SurfaceId, pass: Option<NodeId>, bump: impl Fn(&mut Counters)) {
        if let Ok(mut state) = self.state.lock() {
            bump(&mut state.global);
            bump(state.surfaces.entry(surface).or_default());
            if let Some(pass) = pass {
                bump(state.passes.entry((surface, pass)).or_default());
            }
        }
    }
}

impl Observer for CountersObserver {
    fn on_surface_draw_start(&self, surface: &SurfaceInfo) {
        self.count(surface.id, None, |c| c.surface_draw_start += 1);
    }

    fn on_surface_draw_end(&self, surface: &SurfaceInfo) {
        self.count(surface.id, None, |c| c.surface_draw_end += 1);
    }

    fn on_node_draw(&self, surface: &SurfaceInfo, pass: &PassInfo) {
        self.count(surface.id, Some(pass.id), |c| c.node_draw += 1);
    }

    fn on_node_draw_error(&self, surface: &SurfaceInfo, pass: &PassInfo, _error: &Error) {
        self.count(surface.id, Some(pass.id), |c| c.node_draw_error += 1);
    }

    fn on_surface_draw_skipped(&self, surface: &SurfaceInfo) {
        self.count(surface.id, None, |c| c.surface_draw_skipped += 1);
    }

    fn on_diagnostic(&self, surface: &SurfaceInfo, _diagnostic: &Diagnostic) {
        self.count(surface.id, None, |c| c.diagnostics += 1);
    }
}

#[cfg(test)]
#[path = "counters_observer_tests.rs"]
mod tests;
