use env_logger::{Logger, Target};
use log::{Log, Metadata, Record, SetLoggerError};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

const MAX_LOG_ENTRIES: usize = 500;

#[derive(Debug, Clone)]
struct ClientLogEntry {
    timestamp_ms: u64,
    level: String,
    target: String,
    message: String,
}

struct LogRing {
    entries: Mutex<VecDeque<ClientLogEntry>>,
}

impl LogRing {
    fn push(&self, entry: ClientLogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(entry);
        while entries.len() > MAX_LOG_ENTRIES {
            entries.pop_front();
        }
    }

    fn recent_entries(&self) -> Vec<ClientLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

static LOG_RING: LazyLock<LogRing> = LazyLock::new(|| LogRing {
    entries: Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)),
});

struct ClientLogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ClientLogFile {
    fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sysovo")
            .join("logs")
            .join("client.log");
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Opened on first write, so runs that log nothing leave no file behind.
    fn append_entry(&self, entry: &ClientLogEntry) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(_) => return,
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", format_log_line(entry));
            let _ = file.flush();
        }
    }
}

static LOG_FILE: LazyLock<ClientLogFile> = LazyLock::new(ClientLogFile::new);

fn format_log_line(entry: &ClientLogEntry) -> String {
    format!(
        "{} [{}] [{}] {}",
        entry.timestamp_ms,
        entry.level.to_uppercase(),
        entry.target,
        entry.message.replace('\n', "\\n")
    )
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Writes through env_logger to stderr and keeps a copy of every record in
/// the ring and the log file.
struct ClientLogger {
    inner: Logger,
}

impl Log for ClientLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);

        let entry = ClientLogEntry {
            timestamp_ms: now_ms(),
            level: record.level().to_string().to_lowercase(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        LOG_RING.push(entry.clone());
        LOG_FILE.append_entry(&entry);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger. `RUST_LOG` filters as usual; the default is `warn`.
pub fn init() -> Result<(), SetLoggerError> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.target(Target::Stderr);
    let logger = Box::leak(Box::new(ClientLogger {
        inner: builder.build(),
    }));
    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Entries at `warn` or `error` recorded so far.
pub fn warning_count() -> usize {
    LOG_RING
        .recent_entries()
        .iter()
        .filter(|e| e.level == "warn" || e.level == "error")
        .count()
}

pub fn log_file_path() -> String {
    LOG_FILE.path.display().to_string()
}

/// Record a line even when no logger could be installed.
pub fn write_fallback_line(message: &str) {
    let entry = ClientLogEntry {
        timestamp_ms: now_ms(),
        level: "error".to_string(),
        target: "sysovo.log_bridge".to_string(),
        message: message.to_string(),
    };
    LOG_RING.push(entry.clone());
    LOG_FILE.append_entry(&entry);
}
