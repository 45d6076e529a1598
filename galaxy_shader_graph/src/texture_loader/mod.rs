//! Texture loader module
//!
//! Pluggable asynchronous loaders, the process-wide style registry that
//! holds them, and the per-Surface cache that shares loaded textures.

mod texture_loader;
mod texture_cache;

pub use texture_loader::{
    TextureDescriptor, TextureLoader, LoaderId,
    TextureLoaderRegistry, LoaderRegistrySnapshot,
};
pub use texture_cache::{TextureCache, TextureStatus, SettledLoad};
