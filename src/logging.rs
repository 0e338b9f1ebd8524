//! A minimal sink-based logging facade, in the spirit of a game engine's
//! own small logging crate rather than pulling in `log`/`tracing`: a
//! global list of [`Sink`]s that every `log_*!` call fans out to.

use crate::thread_names::thread_name;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt::{self, Arguments};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Copy, Clone)]
pub enum Severity {
    Verbose,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Verbose => write!(f, "verbose"),
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

pub struct Message {
    pub severity: Severity,
    pub message: String,
    pub time: chrono::DateTime<Local>,
    pub thread: thread::ThreadId,
}

/// Receives log messages from the global logger and processes them, e.g.
/// printing to a terminal or appending to a file.
pub trait Sink: Send + Sync {
    fn log(&self, message: &Message);
}

static SINKS: Lazy<RwLock<Vec<Arc<dyn Sink>>>> = Lazy::new(RwLock::default);

#[doc(hidden)]
pub fn internal_log(severity: Severity, args: Arguments) {
    let message = Message {
        severity,
        message: args.to_string(),
        time: Local::now(),
        thread: thread::current().id(),
    };

    for sink in SINKS.read().iter() {
        sink.log(&message);
    }
}

pub fn register_sink(sink: Arc<dyn Sink>) {
    SINKS.write().push(sink);
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => ({
        $crate::logging::internal_log($crate::logging::Severity::Verbose, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => ({
        $crate::logging::internal_log($crate::logging::Severity::Info, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => ({
        $crate::logging::internal_log($crate::logging::Severity::Warn, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => ({
        $crate::logging::internal_log($crate::logging::Severity::Error, format_args!($($arg)*));
    })
}

/// Logs to stdout with a color per severity and the registered name of the
/// emitting thread, if any.
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {})
    }
}

impl Sink for StdoutSink {
    fn log(&self, message: &Message) {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        let color = match message.severity {
            Severity::Verbose => Color::White,
            Severity::Info => Color::Green,
            Severity::Warn => Color::Yellow,
            Severity::Error => Color::Red,
        };

        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));

        let thread_label = thread_name(message.thread)
            .map(|name| (*name).clone())
            .unwrap_or_else(|| format!("{:?}", message.thread));

        let _ = writeln!(
            stdout,
            "[{}] [{}] [{}] {}",
            message.time.format("%H:%M:%S%.3f"),
            thread_label,
            message.severity,
            message.message
        );

        let _ = stdout.reset();
    }
}
