//! Level-gated log file shared by every component of a run.
//!
//! Components log through the `tracing` macros. The [Sink] is installed once
//! as the global subscriber and appends one timestamped line per accepted
//! event to its log file. Severities follow the harness convention where a
//! larger number means more verbose output:
//!
//! | tracing level | severity | label      |
//! |---------------|----------|------------|
//! | `ERROR`       | 1        | `CRITICAL` |
//! | `WARN`        | 5        | `WARNING`  |
//! | `INFO`        | 7        | `INFO`     |
//! | `DEBUG`       | 8        | `DEBUG`    |
//! | `TRACE`       | 9        | `TRACE`    |
//!
//! An event is written when its severity is less than or equal to the
//! configured level.
use crate::errors::FtestError;
use once_cell::sync::OnceCell;
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{
    field::{Field, Visit},
    Event, Level, Metadata, Subscriber,
};
use tracing_subscriber::{layer::Context, prelude::*, Layer};

pub const LOG_CRITICAL: u8 = 1;
pub const LOG_WARNING: u8 = 5;
pub const LOG_INFO: u8 = 7;
pub const LOG_DEBUG: u8 = 8;
pub const DEFAULT_LOG_LEVEL: u8 = LOG_WARNING;
pub const DEFAULT_LOG_FILE: &str = "ftests.log";

/// Severity of a tracing level in the harness numbering.
pub fn severity(level: &Level) -> u8 {
    match *level {
        Level::ERROR => LOG_CRITICAL,
        Level::WARN => LOG_WARNING,
        Level::INFO => LOG_INFO,
        Level::DEBUG => LOG_DEBUG,
        _ => LOG_DEBUG + 1,
    }
}

fn label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "CRITICAL",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        _ => "TRACE",
    }
}

/// The log file. Opened in append mode the first time a line is written and
/// kept open until the process exits.
struct LazyFile {
    path: PathBuf,
    file: OnceCell<Mutex<BufWriter<File>>>,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: OnceCell::new(),
        }
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let file = self.file.get_or_try_init(|| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map(|f| Mutex::new(BufWriter::new(f)))
        })?;
        let mut handle = file.lock().unwrap_or_else(|p| p.into_inner());
        writeln!(handle, "{}", line)?;
        handle.flush()
    }

    fn flush(&self) -> io::Result<()> {
        match self.file.get() {
            Some(file) => file.lock().unwrap_or_else(|p| p.into_inner()).flush(),
            None => Ok(()),
        }
    }
}

/// Collects the `message` field followed by any structured fields.
#[derive(Default)]
struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let rest = std::mem::take(&mut self.0);
            self.0 = format!("{:?}{}", value, rest);
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.insert_str(0, value);
        } else {
            self.0.push_str(&format!(" {}={}", field.name(), value));
        }
    }
}

/// A `tracing` layer that gates events on the harness severity and appends
/// them to the sink's file.
pub struct SinkLayer {
    level: u8,
    file: Arc<LazyFile>,
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        severity(metadata.level()) <= self.level
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = event.metadata().level();
        if severity(level) > self.level {
            return;
        }
        let mut message = Message::default();
        event.record(&mut message);
        let timestamp = chrono::Local::now().format("%b %d %H:%M:%S");
        // Nowhere left to report a failing log write.
        let _ = self.file.write_line(&format!(
            "{}: {}: {}",
            timestamp,
            label(level),
            message.0
        ));
    }
}

/// Flushes the log file when dropped. Keep it alive for the whole run.
#[must_use = "dropping the guard flushes the log immediately"]
pub struct Guard {
    file: Arc<LazyFile>,
}

impl Guard {
    pub fn flush(&self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

/// Process-wide logging context: a severity threshold and a destination.
#[derive(Debug, Clone)]
pub struct Sink {
    level: u8,
    path: PathBuf,
}

impl Default for Sink {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Sink {
    pub fn new(level: u8, path: impl Into<PathBuf>) -> Self {
        Self {
            level,
            path: path.into(),
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the layer without installing it, along with its flush guard.
    pub fn layer(&self) -> (SinkLayer, Guard) {
        let file = Arc::new(LazyFile::new(self.path.clone()));
        (
            SinkLayer {
                level: self.level,
                file: Arc::clone(&file),
            },
            Guard { file },
        )
    }

    /// Install the sink as the global subscriber. Fails if a subscriber is
    /// already installed.
    pub fn install(&self) -> Result<Guard, FtestError> {
        let (layer, guard) = self.layer();
        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|err| {
                FtestError(format!("Failed to install the log sink: {}", err))
            })?;
        Ok(guard)
    }
}
