/// Observer routing events to the engine logger

use crate::error::Error;
use super::diagnostic::Diagnostic;
use super::observer::{Observer, SurfaceInfo, PassInfo};

/// Logs draws at DEBUG/TRACE, diagnostics at WARN and draw errors at ERROR
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn on_surface_draw_start(&self, surface: &SurfaceInfo) {
        crate::engine_debug!("shadergraph::LogObserver", "{} '{}' draw start", surface.id, surface.name);
    }

    fn on_surface_draw_end(&self, surface: &SurfaceInfo) {
        crate::engine_debug!("shadergraph::LogObserver", "{} '{}' draw end", surface.id, surface.name);
    }

    fn on_node_draw(&self, surface: &SurfaceInfo, pass: &PassInfo) {
        crate::engine_trace!("shadergraph::LogObserver",
            "{} drew '{}' {} ({}x{})", surface.id, pass.name, pass.id, pass.width, pass.height);
    }

    fn on_node_draw_error(&self, surface: &SurfaceInfo, pass: &PassInfo, error: &Error) {
        crate::engine_error!("shadergraph::LogObserver",
            "{} failed to draw '{}' {}: {}", surface.id, pass.name, pass.id, error);
    }

    fn on_surface_draw_skipped(&self, surface: &SurfaceInfo) {
        crate::engine_debug!("shadergraph::LogObserver", "{} '{}' draw skipped", surface.id, surface.name);
    }

    fn on_diagnostic(&self, surface: &SurfaceInfo, diagnostic: &Diagnostic) {
        crate::engine_warn!("shadergraph::LogObserver", "{} '{}': {}", surface.id, surface.name, diagnostic);
    }
}
