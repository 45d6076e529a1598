/// Per-Surface cache of asynchronously loaded textures.
///
/// Each descriptor is loaded once and shared by every uniform that uses it.
/// Loads are polled cooperatively by the owning Surface; a load whose entry
/// was dropped is cancelled with it, so a late result never writes anywhere.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::uniform::PixelBuffer;
use super::texture_loader::{TextureDescriptor, TextureLoaderRegistry};

enum LoadState {
    Loading(BoxFuture<'static, Result<PixelBuffer>>),
    Ready(Arc<PixelBuffer>),
    Failed(Error),
}

impl LoadState {
    fn status(&self) -> TextureStatus {
        match self {
            LoadState::Loading(_) => TextureStatus::Loading,
            LoadState::Ready(_) => TextureStatus::Ready,
            LoadState::Failed(_) => TextureStatus::Failed,
        }
    }
}

/// Loading state of a cached descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureStatus {
    Loading,
    Ready,
    Failed,
}

impl TextureStatus {
    /// Ready or failed
    pub fn is_settled(&self) -> bool {
        !matches!(self, TextureStatus::Loading)
    }
}

/// A load that completed during `TextureCache::poll`
#[derive(Debug, Clone, PartialEq)]
pub struct SettledLoad {
    pub descriptor: TextureDescriptor,
    pub result: std::result::Result<(), Error>,
}

/// Records that some pending load asked to be polled again
#[derive(Default)]
struct LoadSignal {
    woken: AtomicBool,
}

impl ArcWake for LoadSignal {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
    }
}

/// Descriptor-keyed texture cache
#[derive(Default)]
pub struct TextureCache {
    entries: FxHashMap<TextureDescriptor, LoadState>,
    signal: Arc<LoadSignal>,
    loads_started: u64,
}

impl TextureCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a descriptor is loading or loaded
    ///
    /// # Errors
    ///
    /// Returns `Error::TextureLoadFailed` the first time a descriptor is
    /// requested that no registered loader claims. The descriptor is then
    /// cached as failed.
    pub fn request(
        &mut self,
        descriptor: &TextureDescriptor,
        registry: &TextureLoaderRegistry,
    ) -> Result<TextureStatus> {
        if let Some(state) = self.entries.get(descriptor) {
            return Ok(state.status());
        }
        match registry.find(descriptor) {
            Some(loader) => {
                crate::engine_trace!("shadergraph::TextureCache",
                    "Loading {} with '{}'", descriptor, loader.name());
                let future = loader.load(descriptor);
                self.entries.insert(descriptor.clone(), LoadState::Loading(future));
                self.loads_started += 1;
                Ok(TextureStatus::Loading)
            }
            None => {
                let error = Error::TextureLoadFailed(format!("no loader claims {}", descriptor));
                self.entries.insert(descriptor.clone(), LoadState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Poll every pending load once
    ///
    /// Returns the loads that settled, sorted by descriptor.
    pub fn poll(&mut self) -> Vec<SettledLoad> {
        self.signal.woken.store(false, Ordering::SeqCst);
        let waker = waker_ref(&self.signal);
        let mut cx = Context::from_waker(&waker);
        let mut settled = Vec::new();

        for (descriptor, state) in self.entries.iter_mut() {
            if let LoadState::Loading(future) = state {
                if let Poll::Ready(result) = future.as_mut().poll(&mut cx) {
                    match result {
                        Ok(pixels) => {
                            *state = LoadState::Ready(Arc::new(pixels));
                            settled.push(SettledLoad {
                                descriptor: descriptor.clone(),
                                result: Ok(()),
                            });
                        }
                        Err(error) => {
                            let error = match error {
                                Error::TextureLoadFailed(_) => error,
                                other => Error::TextureLoadFailed(other.to_string()),
                            };
                            *state = LoadState::Failed(error.clone());
                            settled.push(SettledLoad {
                                descriptor: descriptor.clone(),
                                result: Err(error),
                            });
                        }
                    }
                }
            }
        }

        settled.sort_by(|a, b| a.descriptor.cmp(&b.descriptor));
        settled
    }

    /// Whether a pending load woke since the last poll
    pub fn has_wakeups(&self) -> bool {
        self.signal.woken.load(Ordering::SeqCst)
    }

    pub fn status(&self, descriptor: &TextureDescriptor) -> Option<TextureStatus> {
        self.entries.get(descriptor).map(LoadState::status)
    }

    /// Pixels of a ready descriptor
    pub fn pixels(&self, descriptor: &TextureDescriptor) -> Option<Arc<PixelBuffer>> {
        match self.entries.get(descriptor)? {
            LoadState::Ready(pixels) => Some(Arc::clone(pixels)),
            _ => None,
        }
    }

    /// Failure of a failed descriptor
    pub fn error(&self, descriptor: &TextureDescriptor) -> Option<&Error> {
        match self.entries.get(descriptor)? {
            LoadState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Drop entries not kept by the predicate, cancelling their pending loads
    ///
    /// Returns the number of dropped entries.
    pub fn retain(&mut self, keep: impl Fn(&TextureDescriptor) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|descriptor, _| keep(descriptor));
        before - self.entries.len()
    }

    pub fn loading_count(&self) -> usize {
        self.entries.values().filter(|state| matches!(state, LoadState::Loading(_))).count()
    }

    /// Loads started since creation
    pub fn loads_started(&self) -> u64 {
        self.loads_started
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "texture_cache_tests.rs"]
mod tests;
