//! Ledger store - append-only, mutex-serialized event log
//!
//! Each recorded event is serialized to one JSON line, written and flushed
//! to the backing sink, and only then kept in memory. If the write fails the
//! in-memory log and the sequence counter are left untouched, and a file
//! sink is truncated back to its last complete line.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::event::{EventType, ExperimentEvent};
use crate::{Error, Result};

enum Sink {
    Memory,
    File {
        path: PathBuf,
        file: File,
        committed_len: u64,
    },
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    fn append(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::File {
                file,
                committed_len,
                ..
            } => {
                let written = file.write_all(line).and_then(|()| file.flush());
                match written {
                    Ok(()) => {
                        *committed_len += line.len() as u64;
                        Ok(())
                    }
                    Err(e) => {
                        // drop any partial line
                        let _ = file.set_len(*committed_len);
                        Err(e)
                    }
                }
            }
            Self::Writer(w) => w.write_all(line).and_then(|()| w.flush()),
        }
    }
}

struct Inner {
    sink: Sink,
    events: Vec<ExperimentEvent>,
}

/// Filter for [`Ledger::summarize`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    event_type: Option<EventType>,
    cell_prefix: Option<String>,
    identity: Option<String>,
}

impl EventFilter {
    /// Match every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events of this type.
    #[must_use]
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Only events whose cell id starts with `prefix`.
    #[must_use]
    pub fn cell_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cell_prefix = Some(prefix.into());
        self
    }

    /// Only events that read or produced `identity`.
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ExperimentEvent) -> bool {
        self.event_type.is_none_or(|t| event.event_type() == t)
            && self
                .cell_prefix
                .as_deref()
                .is_none_or(|p| event.cell_id().starts_with(p))
            && self.identity.as_deref().is_none_or(|id| {
                event.output_identity() == Some(id)
                    || event.input_identities().iter().any(|i| i == id)
            })
    }
}

/// The experiment ledger.
///
/// ## Example
///
/// ```rust
/// use denoise_lab::ledger::{EventFilter, EventPayload, EventType, ExperimentEvent, Ledger};
/// use denoise_lab::error::ErrorKind;
/// use denoise_lab::pipeline::CellState;
///
/// let ledger = Ledger::in_memory();
/// let payload = EventPayload::Failure {
///     stage: CellState::Pending,
///     kind: ErrorKind::InvalidParameter,
///     message: "density 1.5 outside [0, 1]".to_string(),
/// };
/// let event = ledger.record(ExperimentEvent::builder("frame/saltpepper_d150", payload).build())?;
/// assert_eq!(event.sequence(), 0);
///
/// let failures = ledger.summarize(&EventFilter::new().event_type(EventType::CellFailed))?;
/// assert_eq!(failures.len(), 1);
/// # Ok::<(), denoise_lab::Error>(())
/// ```
pub struct Ledger {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Ledger");
        if let Ok(inner) = self.inner.lock() {
            let backing = match &inner.sink {
                Sink::Memory => "memory".to_string(),
                Sink::File { path, .. } => path.display().to_string(),
                Sink::Writer(_) => "writer".to_string(),
            };
            s.field("backing", &backing).field("events", &inner.events.len());
        }
        s.finish_non_exhaustive()
    }
}

impl Ledger {
    fn with_sink(sink: Sink, events: Vec<ExperimentEvent>) -> Self {
        Self {
            inner: Mutex::new(Inner { sink, events }),
        }
    }

    /// Ledger that only keeps events in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory, Vec::new())
    }

    /// Ledger that mirrors every event to an arbitrary writer.
    #[must_use]
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self::with_sink(Sink::Writer(writer), Vec::new())
    }

    /// Open (or create) a JSON-lines ledger file, resuming its sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the file cannot be created or an
    /// existing file cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(Error::LedgerIo)?;
        }
        let events = if path.exists() {
            read_events(path)?
        } else {
            Vec::new()
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::LedgerIo)?;
        let committed_len = file.metadata().map_err(Error::LedgerIo)?.len();
        tracing::info!(path = %path.display(), resumed = events.len(), "ledger opened");
        Ok(Self::with_sink(
            Sink::File {
                path: path.to_path_buf(),
                file,
                committed_len,
            },
            events,
        ))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::LedgerIo(io::Error::other("ledger mutex poisoned")))
    }

    /// Append `event`, assigning the next sequence number and the timestamp.
    ///
    /// Returns the stored event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the event could not be persisted; in
    /// that case nothing was appended.
    pub fn record(&self, event: ExperimentEvent) -> Result<ExperimentEvent> {
        let mut inner = self.lock()?;
        let event = event.stamp(inner.events.len() as u64);
        let mut line = serde_json::to_vec(&event)
            .map_err(|e| Error::LedgerIo(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        line.push(b'\n');
        inner.sink.append(&line).map_err(|e| {
            tracing::error!(error = %e, cell = event.cell_id(), "ledger append failed");
            Error::LedgerIo(e)
        })?;
        inner.events.push(event.clone());
        Ok(event)
    }

    /// Number of recorded events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the ledger lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.events.len())
    }

    /// Whether nothing has been recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the ledger lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.events.is_empty())
    }

    /// Snapshot of all events in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the ledger lock is poisoned.
    pub fn events(&self) -> Result<Vec<ExperimentEvent>> {
        Ok(self.lock()?.events.clone())
    }

    /// Events matching `filter`, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the ledger lock is poisoned.
    pub fn summarize(&self, filter: &EventFilter) -> Result<Vec<ExperimentEvent>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    /// The noise or denoise event that produced `output_identity`, if any.
    ///
    /// When the same output was produced more than once, the latest wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerIo`] if the ledger lock is poisoned.
    pub fn producer_of(&self, output_identity: &str) -> Result<Option<ExperimentEvent>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .rev()
            .find(|e| {
                matches!(
                    e.event_type(),
                    EventType::NoiseApplied | EventType::DenoiseApplied
                ) && e.output_identity() == Some(output_identity)
            })
            .cloned())
    }
}

/// Read every event from a JSON-lines ledger file.
///
/// # Errors
///
/// Returns [`Error::LedgerIo`] on read failure or a malformed line.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<ExperimentEvent>> {
    let file = File::open(path.as_ref()).map_err(Error::LedgerIo)?;
    let mut events = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(Error::LedgerIo)?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ExperimentEvent = serde_json::from_str(&line).map_err(|e| {
            Error::LedgerIo(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {e}", n + 1),
            ))
        })?;
        events.push(event);
    }
    Ok(events)
}
