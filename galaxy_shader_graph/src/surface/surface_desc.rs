/// Surface configuration and lifecycle callbacks

use std::sync::{Arc, Mutex, RwLock};
use crate::error::{Error, Result};
use crate::graphics_device::{DeviceFactory, GraphicsDevice, SoftwareDevice};
use crate::instrumentation::{Observer, ObserverRegistry};
use crate::shader::ShaderCatalog;
use crate::texture_loader::{TextureDescriptor, TextureLoaderRegistry};

/// Callbacks a Surface invokes on its host
///
/// Every method defaults to a no-op.
pub trait SurfaceEvents: Send + Sync {
    /// Every preloaded descriptor loaded
    fn on_load(&self) {}

    /// A preloaded descriptor failed (once per barrier), or a texture used
    /// by a pass failed to load
    fn on_load_error(&self, _error: &Error) {}

    /// The device context was lost
    fn on_context_lost(&self) {}

    /// A new device context replaced the lost one
    fn on_context_restored(&self) {}
}

/// Surface creation parameters
///
/// Registries left to `None` are the process-wide ones from `Engine`.
#[derive(Clone)]
pub struct SurfaceDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Draw every change immediately instead of waiting for a flush
    pub sync: bool,
    /// Descriptors that must settle before the first draw
    pub preload: Vec<TextureDescriptor>,
    pub events: Option<Arc<dyn SurfaceEvents>>,
    /// Observers of this Surface only
    pub observers: Vec<Arc<dyn Observer>>,
    pub texture_loaders: Option<Arc<RwLock<TextureLoaderRegistry>>>,
    pub process_observers: Option<Arc<RwLock<ObserverRegistry>>>,
    pub shaders: Option<Arc<RwLock<ShaderCatalog>>>,
    /// Creates the device context, `None` uses a `SoftwareDevice`
    pub device_factory: Option<DeviceFactory>,
}

impl SurfaceDesc {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            sync: false,
            preload: Vec::new(),
            events: None,
            observers: Vec::new(),
            texture_loaders: None,
            process_observers: None,
            shaders: None,
            device_factory: None,
        }
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_preload(mut self, descriptors: impl IntoIterator<Item = TextureDescriptor>) -> Self {
        self.preload.extend(descriptors);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn SurfaceEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_texture_loaders(mut self, registry: Arc<RwLock<TextureLoaderRegistry>>) -> Self {
        self.texture_loaders = Some(registry);
        self
    }

    pub fn with_process_observers(mut self, registry: Arc<RwLock<ObserverRegistry>>) -> Self {
        self.process_observers = Some(registry);
        self
    }

    pub fn with_shaders(mut self, catalog: Arc<RwLock<ShaderCatalog>>) -> Self {
        self.shaders = Some(catalog);
        self
    }

    pub fn with_device_factory(mut self, factory: DeviceFactory) -> Self {
        self.device_factory = Some(factory);
        self
    }
}

/// Factory creating a fresh `SoftwareDevice` each time
pub fn software_device_factory() -> DeviceFactory {
    Arc::new(|| -> Result<Arc<Mutex<dyn GraphicsDevice>>> {
        let device: Arc<Mutex<dyn GraphicsDevice>> = SoftwareDevice::shared();
        Ok(device)
    })
}
