/// Texture loaders and their registry.
///
/// A loader turns an opaque descriptor into pixels asynchronously. The
/// registry is an ordered list: the first registered loader that claims a
/// descriptor is the one used.

use std::fmt;
use std::sync::Arc;
use futures::future::BoxFuture;
use crate::error::Result;
use crate::uniform::PixelBuffer;

/// Opaque texture source understood by some loader
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureDescriptor {
    /// Numeric handle (video frame, canvas id...)
    Id(u64),
    /// Keyed source (url, asset path, symbol name...)
    Key(String),
}

impl fmt::Display for TextureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureDescriptor::Id(id) => write!(f, "texture id {}", id),
            TextureDescriptor::Key(key) => write!(f, "texture '{}'", key),
        }
    }
}

/// Asynchronous texture decoder
pub trait TextureLoader: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "TextureLoader"
    }

    /// Whether this loader handles the descriptor
    fn can_load(&self, descriptor: &TextureDescriptor) -> bool;

    /// Start loading; dropping the future cancels the load
    fn load(&self, descriptor: &TextureDescriptor) -> BoxFuture<'static, Result<PixelBuffer>>;
}

/// Identifier returned when registering a loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u64);

/// Saved registry contents, see `TextureLoaderRegistry::snapshot`
#[derive(Clone)]
pub struct LoaderRegistrySnapshot {
    loaders: Vec<(LoaderId, Arc<dyn TextureLoader>)>,
    next_id: u64,
}

/// Ordered set of texture loaders
#[derive(Default)]
pub struct TextureLoaderRegistry {
    loaders: Vec<(LoaderId, Arc<dyn TextureLoader>)>,
    next_id: u64,
}

impl TextureLoaderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader after the existing ones
    pub fn add(&mut self, loader: Arc<dyn TextureLoader>) -> LoaderId {
        self.next_id += 1;
        let id = LoaderId(self.next_id);
        crate::engine_debug!("shadergraph::TextureLoaderRegistry",
            "Registered loader '{}' as {:?}", loader.name(), id);
        self.loaders.push((id, loader));
        id
    }

    /// Unregister a loader
    ///
    /// Returns false if the id is unknown (already removed).
    pub fn remove(&mut self, id: LoaderId) -> bool {
        let before = self.loaders.len();
        self.loaders.retain(|(loader_id, _)| *loader_id != id);
        self.loaders.len() != before
    }

    /// First registered loader claiming the descriptor
    pub fn find(&self, descriptor: &TextureDescriptor) -> Option<Arc<dyn TextureLoader>> {
        self.loaders
            .iter()
            .find(|(_, loader)| loader.can_load(descriptor))
            .map(|(_, loader)| Arc::clone(loader))
    }

    /// Get the number of loaders
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Remove all loaders
    pub fn clear(&mut self) {
        self.loaders.clear();
    }

    /// Save the current contents
    pub fn snapshot(&self) -> LoaderRegistrySnapshot {
        LoaderRegistrySnapshot {
            loaders: self.loaders.clone(),
            next_id: self.next_id,
        }
    }

    /// Restore contents saved by `snapshot`
    ///
    /// Ids handed out after the snapshot are never reused.
    pub fn restore(&mut self, snapshot: LoaderRegistrySnapshot) {
        self.loaders = snapshot.loaders;
        self.next_id = self.next_id.max(snapshot.next_id);
    }
}

#[cfg(test)]
#[path = "texture_loader_tests.rs"]
mod tests;
