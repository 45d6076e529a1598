/// Shader graph engine - process-wide state manager
///
/// This module provides the process-wide registries shared by every Surface:
/// the logger, the texture loader registry, the observer registry and the
/// shader catalog. Registries are stored behind `Arc<RwLock<..>>` so a
/// Surface (or a test harness) can inject its own instance instead.

use std::sync::{OnceLock, RwLock, Arc};
use std::time::SystemTime;
use crate::error::{Result, Error};
use crate::instrumentation::ObserverRegistry;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::shader::ShaderCatalog;
use crate::texture_loader::TextureLoaderRegistry;

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn global_logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

fn dispatch(severity: LogSeverity, source: &str, message: String, location: Option<(&'static str, u32)>) {
    if let Ok(lock) = global_logger().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: location.map(|(file, _)| file),
            line: location.map(|(_, line)| line),
        });
    }
}

/// Internal state structure holding the process-wide registries
struct EngineState {
    /// Texture loaders, first registered claimer wins
    texture_loaders: Arc<RwLock<TextureLoaderRegistry>>,
    /// Observers notified by every Surface
    observers: Arc<RwLock<ObserverRegistry>>,
    /// Programs available to every Surface without its own catalog
    shaders: Arc<RwLock<ShaderCatalog>>,
}

impl EngineState {
    /// Create a new empty engine state
    fn new() -> Self {
        Self {
            texture_loaders: Arc::new(RwLock::new(TextureLoaderRegistry::new())),
            observers: Arc::new(RwLock::new(ObserverRegistry::new())),
            shaders: Arc::new(RwLock::new(ShaderCatalog::new())),
        }
    }
}

fn state() -> &'static EngineState {
    ENGINE_STATE.get_or_init(EngineState::new)
}

// ===== PUBLIC API =====

/// Process-wide engine state
///
/// # Example
///
/// ```no_run
/// use galaxy_shader_graph::shadergraph::Engine;
///
/// Engine::initialize()?;
/// let loaders = Engine::texture_loaders();
/// // Register loaders, create surfaces...
/// Engine::shutdown();
/// # Ok::<(), galaxy_shader_graph::shadergraph::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::BackendError(msg) => {
                crate::engine_error!("shadergraph::Engine", "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!("shadergraph::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    /// Initialize the engine
    ///
    /// Idempotent. Registries are also created lazily on first access, so
    /// calling this is only needed to make startup explicit.
    ///
    /// # Errors
    ///
    /// Currently always succeeds, but returns Result for future extensibility.
    pub fn initialize() -> Result<()> {
        state();
        Ok(())
    }

    /// Clear every process-wide registry
    ///
    /// Surfaces that hold their own registry handles are not affected.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut loaders) = state.texture_loaders.write() {
                loaders.clear();
            }
            if let Ok(mut observers) = state.observers.write() {
                observers.clear();
            }
            if let Ok(mut shaders) = state.shaders.write() {
                shaders.clear();
            }
        }
    }

    /// Process-wide texture loader registry
    pub fn texture_loaders() -> Arc<RwLock<TextureLoaderRegistry>> {
        Arc::clone(&state().texture_loaders)
    }

    /// Process-wide observer registry
    pub fn observers() -> Arc<RwLock<ObserverRegistry>> {
        Arc::clone(&state().observers)
    }

    /// Process-wide shader catalog
    pub fn shaders() -> Arc<RwLock<ShaderCatalog>> {
        Arc::clone(&state().shaders)
    }

    /// Run a closure with write access to the process-wide loader registry
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn with_texture_loaders<R>(f: impl FnOnce(&mut TextureLoaderRegistry) -> R) -> Result<R> {
        let loaders = Self::texture_loaders();
        let mut lock = loaders.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Texture loader registry lock poisoned".to_string())
            ))?;
        Ok(f(&mut lock))
    }

    /// Run a closure with write access to the process-wide observer registry
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn with_observers<R>(f: impl FnOnce(&mut ObserverRegistry) -> R) -> Result<R> {
        let observers = Self::observers();
        let mut lock = observers.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Observer registry lock poisoned".to_string())
            ))?;
        Ok(f(&mut lock))
    }

    /// Run a closure with write access to the process-wide shader catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog lock is poisoned.
    pub fn with_shaders<R>(f: impl FnOnce(&mut ShaderCatalog) -> R) -> Result<R> {
        let shaders = Self::shaders();
        let mut lock = shaders.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("Shader catalog lock poisoned".to_string())
            ))?;
        Ok(f(&mut lock))
    }

    /// Reset all registries for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        Self::shutdown();
    }

    // ===== LOGGING API =====

    /// Replace the console logger (file logger, test capture, devtools bridge)
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = global_logger().write() {
            *lock = Box::new(logger);
        }
    }

    /// Back to the console `DefaultLogger`
    pub fn reset_logger() {
        if let Ok(mut lock) = global_logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Log without a call site, used by `engine_trace!` to `engine_warn!`
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        dispatch(severity, source, message, None);
    }

    /// Log with the call site, used by `engine_error!` and the error macros
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        dispatch(severity, source, message, Some((file, line)));
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
