//! Internal logging system for the shader graph core
//!
//! Every component logs through `Engine`, tagged `shadergraph::<Component>`.
//! Draw faults are ERROR entries carrying file and line, diagnostics are
//! WARN, per-pass draws are TRACE. The host swaps the console logger for
//! its own through the `Logger` trait.

use colored::*;
use std::fmt::Display;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Destination of every log entry
///
/// # Example
///
/// ```no_run
/// use galaxy_shader_graph::shadergraph::log::{Logger, LogEntry, LogSeverity};
/// use std::sync::Mutex;
///
/// /// Keeps the diagnostics for a devtools overlay
/// struct OverlayLogger {
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl Logger for OverlayLogger {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity >= LogSeverity::Warn {
///             if let Ok(mut lines) = self.lines.lock() {
///                 lines.push(format!("{}: {}", entry.source, entry.message));
///             }
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component tag, e.g. "shadergraph::Surface"
    pub source: String,
    pub message: String,
    /// Call site, set by `engine_error!` and the error macros
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    /// Diagnostics, failed loads
    Warn,
    /// Draw faults
    Error,
}

/// Console logger installed until the host sets its own
///
/// One line per entry, `[timestamp] [SEVERITY] [source] message`, with
/// `(file:line)` appended when the entry carries a location. Warnings and
/// errors go to stderr.
///
/// The default threshold is DEBUG: per-pass draws and texture cache steps
/// are TRACE. [`DefaultLogger::verbose`] shows them.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self { min_severity: LogSeverity::Debug }
    }
}

impl DefaultLogger {
    /// Log every entry, per-pass draw traces included
    pub fn verbose() -> Self {
        Self { min_severity: LogSeverity::Trace }
    }

    /// Only log entries at `min_severity` or above
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    pub fn accepts(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }

    /// Format an entry as a single line, without colors
    pub fn format_plain(entry: &LogEntry) -> String {
        compose(&timestamp(entry), label(entry.severity), &entry.source, entry)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if !self.accepts(entry.severity) {
            return;
        }
        let severity = match entry.severity {
            LogSeverity::Trace => label(entry.severity).bright_black(),
            LogSeverity::Debug => label(entry.severity).cyan(),
            LogSeverity::Info => label(entry.severity).green(),
            LogSeverity::Warn => label(entry.severity).yellow(),
            LogSeverity::Error => label(entry.severity).red().bold(),
        };
        let line = compose(&timestamp(entry), severity, entry.source.bright_blue(), entry);
        if entry.severity >= LogSeverity::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

fn timestamp(entry: &LogEntry) -> String {
    let datetime: DateTime<Local> = entry.timestamp.into();
    datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Fixed-width severity tag
fn label(severity: LogSeverity) -> &'static str {
    match severity {
        LogSeverity::Trace => "TRACE",
        LogSeverity::Debug => "DEBUG",
        LogSeverity::Info => "INFO ",
        LogSeverity::Warn => "WARN ",
        LogSeverity::Error => "ERROR",
    }
}

fn compose(timestamp: &str, severity: impl Display, source: impl Display, entry: &LogEntry) -> String {
    match (entry.file, entry.line) {
        (Some(file), Some(line)) => format!(
            "[{}] [{}] [{}] {} ({}:{})",
            timestamp, severity, source, entry.message, file, line
        ),
        _ => format!("[{}] [{}] [{}] {}", timestamp, severity, source, entry.message),
    }
}

// ===== LOGGING MACROS =====
//
// `$source` is the component tag, "shadergraph::<Component>". Messages name
// the Surface and pass they concern, e.g. "surface#1 '#3 blur'".

/// Log a TRACE message: per-pass draws, texture cache activity
///
/// # Example
///
/// ```no_run
/// # use galaxy_shader_graph::engine_trace;
/// # let (name, pass) = ("", "");
/// engine_trace!("shadergraph::RenderScheduler", "Drew '{}' {}", name, pass);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::shadergraph::Engine::log(
            $crate::shadergraph::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message: Surface lifecycle (mount, resize, reboot, drop)
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::shadergraph::Engine::log(
            $crate::shadergraph::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message: Surface creation, context loss and restore
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::shadergraph::Engine::log(
            $crate::shadergraph::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message: configuration and resolution diagnostics, failed loads
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::shadergraph::Engine::log(
            $crate::shadergraph::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with the call site: draw faults
///
/// # Example
///
/// ```no_run
/// # use galaxy_shader_graph::engine_error;
/// # let (pass, error) = ("", "");
/// engine_error!("shadergraph::RenderScheduler", "Failed to draw {}: {}", pass, error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::shadergraph::Engine::log_detailed(
            $crate::shadergraph::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error::BackendError` with the same message
///
/// For failures outside the graph itself, such as a poisoned device or
/// registry lock.
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::shadergraph::Engine::log_detailed(
            $crate::shadergraph::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::shadergraph::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError(..))` from the current function
///
/// # Example
///
/// ```no_run
/// # use galaxy_shader_graph::engine_bail;
/// # fn f() -> Result<(), galaxy_shader_graph::shadergraph::Error> {
/// engine_bail!("shadergraph::ResourceManager", "Graphics device lock poisoned");
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and build an `Error::BackendError` with the same message
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::shadergraph::Engine::log(
            $crate::shadergraph::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::shadergraph::Error::BackendError(message)
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
