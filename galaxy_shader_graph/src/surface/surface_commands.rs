/// Deferred-effect queue of a Surface
///
/// Observers and host callbacks run while a Surface is busy and cannot
/// borrow it. They queue effects through a `SurfaceCommands` handle instead;
/// the Surface drains the queue once its current operation completed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use crate::graph::NodeId;

/// A queued scheduling request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Mark a pass and its dependents dirty
    RedrawPass(NodeId),
    /// Draw a pass with its dirty dependencies and dependents
    FlushPass(NodeId),
    /// Mark every pass dirty
    Redraw,
    /// Draw every dirty pass
    Flush,
}

/// Cloneable handle queuing effects on one Surface
#[derive(Debug, Clone, Default)]
pub struct SurfaceCommands {
    queue: Arc<Mutex<VecDeque<Effect>>>,
}

impl SurfaceCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, effect: Effect) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(effect),
            Err(_) => {
                crate::engine_warn!("shadergraph::SurfaceCommands",
                    "Effect queue lock poisoned, dropped {:?}", effect);
            }
        }
    }

    pub fn redraw_pass(&self, pass: NodeId) {
        self.push(Effect::RedrawPass(pass));
    }

    pub fn flush_pass(&self, pass: NodeId) {
        self.push(Effect::FlushPass(pass));
    }

    pub fn redraw(&self) {
        self.push(Effect::Redraw);
    }

    pub fn flush(&self) {
        self.push(Effect::Flush);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the effects queued so far
    ///
    /// Effects pushed while the taken ones run wait for the next drain.
    pub(crate) fn take(&self) -> Vec<Effect> {
        self.queue
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "surface_commands_tests.rs"]
mod tests;
