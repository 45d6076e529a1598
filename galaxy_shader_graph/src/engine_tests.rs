//! Unit tests for the Engine state manager
//!
//! IMPORTANT: ENGINE_STATE and LOGGER are process-wide. All tests are
//! marked with #[serial] to run sequentially.

use crate::engine::Engine;
use crate::error::Error;
use crate::log::{Logger, LogEntry, LogSeverity};
use crate::shader::{ProgramDesc, UniformDecl, UniformType};
use crate::texture_loader::{TextureDescriptor, TextureLoader};
use crate::uniform::PixelBuffer;
use futures::future::BoxFuture;
use futures::FutureExt;
use glam::Vec4;
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String, Option<u32>)>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap()
            .push((entry.severity, entry.message.clone(), entry.line));
    }
}

fn capture_logs() -> Arc<Mutex<Vec<(LogSeverity, String, Option<u32>)>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });
    entries
}

struct AnyKeyLoader;

impl TextureLoader for AnyKeyLoader {
    fn can_load(&self, descriptor: &TextureDescriptor) -> bool {
        matches!(descriptor, TextureDescriptor::Key(_))
    }

    fn load(&self, _descriptor: &TextureDescriptor) -> BoxFuture<'static, crate::error::Result<PixelBuffer>> {
        async { Ok(PixelBuffer::filled(1, 1, [0, 0, 0, 255])) }.boxed()
    }
}

fn setup() {
    Engine::reset_for_testing();
    let _ = Engine::initialize();
}

// ============================================================================
// REGISTRY TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_initialize_is_idempotent() {
    setup();
    assert!(Engine::initialize().is_ok());
    assert!(Engine::initialize().is_ok());
}

#[test]
#[serial]
fn test_engine_shutdown_clears_registries() {
    setup();
    Engine::with_texture_loaders(|loaders| {
        loaders.add(Arc::new(AnyKeyLoader));
    })
    .unwrap();
    Engine::with_shaders(|shaders| {
        shaders.register(ProgramDesc::kernel(
            "black",
            vec![UniformDecl::new("t", UniformType::Float)],
            |_| Some(Vec4::W),
        ))
    })
    .unwrap();
    assert_eq!(Engine::texture_loaders().read().unwrap().len(), 1);
    assert_eq!(Engine::shaders().read().unwrap().program_count(), 1);

    Engine::shutdown();

    assert!(Engine::texture_loaders().read().unwrap().is_empty());
    assert_eq!(Engine::shaders().read().unwrap().program_count(), 0);
    assert!(Engine::observers().read().unwrap().is_empty());
}

#[test]
#[serial]
fn test_engine_registries_are_shared() {
    setup();
    let first = Engine::texture_loaders();
    let second = Engine::texture_loaders();
    assert!(Arc::ptr_eq(&first, &second));

    first.write().unwrap().add(Arc::new(AnyKeyLoader));
    let found = Engine::with_texture_loaders(|loaders| {
        loaders.find(&TextureDescriptor::Key("a.png".to_string())).is_some()
    })
    .unwrap();
    assert!(found);
    Engine::shutdown();
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_entries() {
    let entries = capture_logs();
    crate::engine_info!("shadergraph::Test", "hello {}", 42);
    crate::engine_error!("shadergraph::Test", "failure");
    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], (LogSeverity::Info, "hello 42".to_string(), None));
    assert_eq!(entries[1].0, LogSeverity::Error);
    assert!(entries[1].2.is_some());
}

#[test]
#[serial]
fn test_reset_logger_stops_capture() {
    let entries = capture_logs();
    Engine::reset_logger();
    crate::engine_warn!("shadergraph::Test", "not captured");
    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_error() {
    let entries = capture_logs();
    let error = crate::engine_err!("shadergraph::Test", "Program '{}' missing", "blur");
    Engine::reset_logger();

    assert_eq!(error, Error::BackendError("Program 'blur' missing".to_string()));
    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, LogSeverity::Error);
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn failing(flag: bool) -> crate::error::Result<u32> {
        if flag {
            crate::engine_bail!("shadergraph::Test", "bailed with {}", flag);
        }
        Ok(1)
    }

    let entries = capture_logs();
    assert_eq!(failing(false), Ok(1));
    assert_eq!(failing(true), Err(Error::BackendError("bailed with true".to_string())));
    Engine::reset_logger();
    assert_eq!(entries.lock().unwrap().len(), 1);
}

#[test]
#[serial]
fn test_engine_warn_err_logs_warning() {
    let entries = capture_logs();
    let error = crate::engine_warn_err!("shadergraph::Test", "soft failure");
    Engine::reset_logger();

    assert!(matches!(error, Error::BackendError(_)));
    let entries = entries.lock().unwrap();
    assert_eq!(entries[0].0, LogSeverity::Warn);
    assert_eq!(entries[0].2, None);
}
