//! Diagnostic sink collaborator
//!
//! Negotiation corrections, lifecycle failures and entry-check violations
//! are reported through an injected [`DiagnosticSink`] rather than a global
//! logger: one driver owns one sink reference for its lifetime, so per-core
//! output stays attributable. [`LogSink`] bridges to the `log` crate facade
//! for embedders that already route that somewhere; [`NullSink`] discards.

use core::fmt;

/// Severity levels for diagnostic messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Unrecoverable or critical errors.
    Error = 0,
    /// Conditions that may indicate a problem.
    Warn = 1,
    /// Normal operational messages.
    Info = 2,
    /// Verbose diagnostic output.
    Debug = 3,
    /// Very detailed tracing information.
    Trace = 4,
}

/// Structured logging capability injected into the driver.
///
/// `subsystem` is a short tag (`"vmcs"`, `"controls"`, `"checks"`) so a sink
/// multiplexing several drivers can still split the streams.
pub trait DiagnosticSink {
    fn log(&self, level: LogLevel, subsystem: &'static str, message: fmt::Arguments<'_>);
}

/// Sink that discards everything.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn log(&self, _level: LogLevel, _subsystem: &'static str, _message: fmt::Arguments<'_>) {}
}

/// Sink that forwards to the `log` crate macros.
pub struct LogSink;

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

impl DiagnosticSink for LogSink {
    fn log(&self, level: LogLevel, subsystem: &'static str, message: fmt::Arguments<'_>) {
        log::log!(target: subsystem, level.into(), "{}", message);
    }
}

/// Format-and-forward helper for call sites holding a sink reference.
macro_rules! vmlog {
    ($sink:expr, $level:ident, $sub:expr, $($arg:tt)*) => {
        $sink.log(
            $crate::diag::LogLevel::$level,
            $sub,
            core::format_args!($($arg)*),
        )
    };
}
pub(crate) use vmlog;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_maps_to_log_crate() {
        assert_eq!(log::Level::from(LogLevel::Error), log::Level::Error);
        assert_eq!(log::Level::from(LogLevel::Trace), log::Level::Trace);
    }

    #[test]
    fn test_null_sink_accepts_arguments() {
        let sink = NullSink;
        vmlog!(sink, Info, "vmcs", "value 0x{:x}", 0x10u64);
    }
}
