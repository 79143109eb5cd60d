// log.rs — Append-only audit log.
//
// The durable log is a JSONL file: one `AuditEntry` per line, each linked
// to the previous line by hash. An in-memory mirror of the entries is kept
// so queries and stats never re-read the file.
//
// Appends from many threads go through one mutex, so no write is lost and
// the chain stays linear.
//
// An append either lands as one complete line or leaves the file as it
// was. A failed write is rolled back to the last complete line before the
// error is returned, so a retried append continues the chain cleanly.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::entry::{line_hash, AuditEntry, AuditRecord};
use crate::error::AuditError;

/// Destination for audit records.
///
/// `append` must be durable when it returns Ok; `entries` returns every
/// entry in append order.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError>;

    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError>;

    fn len(&self) -> Result<usize, AuditError> {
        Ok(self.entries()?.len())
    }
}

/// Where the JSONL bytes go. A `File` outside of tests.
trait LogWriter: Write + Send {
    /// Cut the log back to `len` bytes.
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl LogWriter for File {
    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        // In append mode every write goes to the current end of file, so
        // after `set_len` the next line starts right after the cut.
        self.set_len(len)
    }
}

struct LogState {
    /// Unbuffered on purpose: with a `BufWriter`, bytes from a failed
    /// flush would stay in the buffer and be written ahead of the retry.
    writer: Box<dyn LogWriter>,
    /// Length of the file up to the end of the last complete line.
    committed: u64,
    /// Set when a failed write could not be rolled back. The file may end
    /// in a partial line, so further appends are refused until reopened.
    torn: bool,
    /// Hash of the last line written; the next entry's `previous_hash`.
    last_hash: Option<String>,
    entries: Vec<AuditEntry>,
}

/// An append-only audit log backed by a JSONL file.
///
/// In Rust, a `Mutex<T>` owns the value it protects. Holding the guard is
/// the only way to reach the writer and the chain state, so two appends can
/// never interleave their bytes or both link to the same previous hash.
pub struct AuditLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl AuditLog {
    /// Open (or create) an audit log at the given path.
    ///
    /// Existing entries are loaded and the hash chain is resumed so new
    /// entries link correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        let (entries, last_hash) = if path.exists() {
            read_lines(&path)?
        } else {
            (Vec::new(), None)
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        }

        // Append mode: existing lines are never overwritten.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        let committed = file
            .metadata()
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?
            .len();

        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            "opened audit log"
        );

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                writer: Box::new(file),
                committed,
                torn: false,
                last_hash,
                entries,
            }),
        })
    }

    /// Read all entries from a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(read_lines(path.as_ref())?.0)
    }

    /// Verify the hash chain of a log file.
    ///
    /// Returns `Ok(true)` if intact, or an `IntegrityViolation` naming the
    /// first broken line.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<bool, AuditError> {
        let reader = open_reader(path.as_ref())?;
        let mut previous_hash: Option<String> = None;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line, not a re-serialization, so field order can't drift.
            previous_hash = Some(line_hash(&line));
        }

        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for AuditLog {
    fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;

        if state.torn {
            return Err(AuditError::Unavailable(format!(
                "{} ends in a partial line; reopen the log",
                self.path.display()
            )));
        }

        // Link this entry to the previous line, then encode it as one line.
        let entry = AuditEntry::new(record, state.last_hash.clone());
        let json = serde_json::to_string(&entry)?;
        let line = format!("{}\n", json);

        // One `write_all` of the whole line. If it fails part of the line
        // may already be in the file; cut it off again before reporting.
        let writer = &mut state.writer;
        let written = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(e) = written {
            let committed = state.committed;
            if let Err(rollback) = state.writer.truncate(committed) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "could not roll back partial audit line"
                );
                state.torn = true;
            }
            return Err(e.into());
        }

        // Only a fully written line advances the chain.
        state.committed += line.len() as u64;
        state.last_hash = Some(line_hash(&json));
        state.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let state = self
            .state
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;
        Ok(state.entries.clone())
    }

    fn len(&self) -> Result<usize, AuditError> {
        let state = self
            .state
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;
        Ok(state.entries.len())
    }
}

/// In-memory audit log with the same chaining, for embedding and tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    state: Mutex<(Option<String>, Vec<AuditEntry>)>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;
        let (last_hash, entries) = &mut *state;

        let entry = AuditEntry::new(record, last_hash.clone());
        let json = serde_json::to_string(&entry)?;
        *last_hash = Some(line_hash(&json));
        entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let state = self
            .state
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;
        Ok(state.1.clone())
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Parse every entry and compute the hash of the last line.
fn read_lines(path: &Path) -> Result<(Vec<AuditEntry>, Option<String>), AuditError> {
    let reader = open_reader(path)?;
    let mut entries = Vec::new();
    let mut last_hash = None;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
        last_hash = Some(line_hash(&line));
    }

    Ok((entries, last_hash))
}
