//! The rotation engine: owns every open log file and hands out opaque
//! [`WriteHandle`]s.
//!
//! Files live under `<root>/<YYYY-MM>/<DD>/` and are named with the filename
//! codec. Each `(robot_id, round_id)` pair is one stream with exactly one
//! current file. Lock order is registry, then stream, then the rotation lock,
//! then the active-file set.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::clock::Clock;
use crate::filename::FileIdentifier;
use crate::retention::{self, RetentionPolicy, RetentionReport};
use crate::rotation::{FileSnapshot, RotationPolicy, RotationReason};
use crate::{Error, Result};

// Bounded retries when another process grabs the same part number.
const MAX_CREATE_ATTEMPTS: u32 = 16;

// Process-wide so a handle from one engine never matches a stream in another.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifies the stream a caller wants to write to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifierHint {
    pub robot_id: String,
    pub round_id: String,
}

impl IdentifierHint {
    pub fn new(robot_id: impl Into<String>, round_id: impl Into<String>) -> Self {
        Self {
            robot_id: robot_id.into(),
            round_id: round_id.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (field, value) in [("robot_id", &self.robot_id), ("round_id", &self.round_id)] {
            if value.is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
            if value.contains(['_', '/', '\\']) {
                return Err(Error::Config(format!(
                    "{field} {value:?} must not contain '_' or path separators"
                )));
            }
        }
        Ok(())
    }
}

/// Opaque token for writing to one stream. Not `Clone`: closing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WriteHandle {
    id: u64,
}

/// State of the current log file.
#[derive(Debug)]
struct FileState {
    path: PathBuf,
    id: FileIdentifier,
    file: File,
    /// Bytes written since the file was opened.
    bytes: u64,
    lines: u64,
}

#[derive(Debug, Default)]
struct StreamState {
    current: Option<FileState>,
    closed: bool,
}

impl StreamState {
    fn current_mut(&mut self) -> Result<&mut FileState> {
        self.current
            .as_mut()
            .ok_or_else(|| Error::Io(io::Error::other("log stream has no open file")))
    }
}

#[derive(Debug)]
struct Stream {
    hint: IdentifierHint,
    state: Mutex<StreamState>,
}

#[derive(Debug, Default)]
struct Registry {
    /// Live streams with their number of open handles.
    streams: HashMap<IdentifierHint, (Arc<Stream>, usize)>,
    handles: HashMap<u64, Arc<Stream>>,
}

/// Highest part handed out per `(robot_id, date)`, kept after streams close
/// so retention deleting a file never frees its part number.
#[derive(Debug, Default)]
struct PartMarks {
    marks: HashMap<(String, NaiveDate), u32>,
}

impl PartMarks {
    fn get(&self, robot_id: &str, date: NaiveDate) -> u32 {
        self.marks
            .get(&(robot_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    fn record(&mut self, robot_id: &str, date: NaiveDate, part: u32) {
        // Earlier days can no longer receive new parts.
        self.marks.retain(|(_, day), _| *day >= date);
        let mark = self.marks.entry((robot_id.to_string(), date)).or_insert(0);
        *mark = (*mark).max(part);
    }
}

/// Writes lines to rotating, retention-bounded log files.
pub struct RotationEngine {
    root: PathBuf,
    rotation: RotationPolicy,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    /// Serializes rotation and retention.
    rotation_lock: Mutex<PartMarks>,
    /// Current files of all live streams; retention never deletes these.
    active: Mutex<HashSet<PathBuf>>,
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine")
            .field("root", &self.root)
            .field("rotation", &self.rotation)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl RotationEngine {
    /// Create an engine rooted at `root`, creating the directory if needed.
    pub fn new(
        root: impl Into<PathBuf>,
        rotation: RotationPolicy,
        retention: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            rotation,
            retention,
            clock,
            registry: Mutex::new(Registry::default()),
            rotation_lock: Mutex::new(PartMarks::default()),
            active: Mutex::new(HashSet::new()),
        })
    }

    /// Log root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a writer for the stream named by `hint`.
    ///
    /// The stream's file is opened right away, so a misconfigured root fails
    /// here rather than on the first write.
    pub fn acquire_writer(&self, hint: &IdentifierHint) -> Result<WriteHandle> {
        hint.validate()?;
        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let stream = {
            let mut registry = lock(&self.registry);
            let entry = registry.streams.entry(hint.clone()).or_insert_with(|| {
                let stream = Stream {
                    hint: hint.clone(),
                    state: Mutex::new(StreamState::default()),
                };
                (Arc::new(stream), 0)
            });
            entry.1 += 1;
            let stream = Arc::clone(&entry.0);
            registry.handles.insert(id, Arc::clone(&stream));
            stream
        };
        let handle = WriteHandle { id };

        let opened = {
            let mut state = lock(&stream.state);
            if state.current.is_none() {
                let now = self.clock.now();
                self.rotate(&stream.hint, &mut state, now, RotationReason::NoCurrentFile)
            } else {
                Ok(())
            }
        };
        match opened {
            Ok(()) => Ok(handle),
            Err(e) => {
                let _ = self.close(handle);
                Err(e)
            }
        }
    }

    /// Append `line` plus a newline to the stream's current file, rotating
    /// first if a trigger fires.
    pub fn write(&self, handle: &WriteHandle, line: &str) -> Result<()> {
        let stream = self.stream(handle)?;
        let mut state = lock(&stream.state);
        if state.closed {
            return Err(Error::HandleClosed);
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let now = self.clock.now();
        let snapshot = state.current.as_ref().map(|c| FileSnapshot {
            bytes: c.bytes,
            date: c.id.date,
        });
        if let Some(reason) = self.rotation.evaluate(snapshot, now.date_naive(), buf.len()) {
            self.rotate(&stream.hint, &mut state, now, reason)?;
        }

        let current = state.current_mut()?;
        current
            .file
            .write_all(buf.as_bytes())
            .map_err(|source| Error::Write {
                path: current.path.clone(),
                source,
            })?;
        current.bytes += buf.len() as u64;
        current.lines += 1;
        Ok(())
    }

    /// Revoke `handle`. Closing the last handle of a stream syncs and
    /// releases its file.
    pub fn close(&self, handle: WriteHandle) -> Result<()> {
        let stream = {
            let mut registry = lock(&self.registry);
            let Some(stream) = registry.handles.remove(&handle.id) else {
                return Err(Error::HandleClosed);
            };
            let last = match registry.streams.get_mut(&stream.hint) {
                Some(entry) if Arc::ptr_eq(&entry.0, &stream) => {
                    entry.1 -= 1;
                    entry.1 == 0
                }
                _ => true,
            };
            if !last {
                return Ok(());
            }
            registry.streams.remove(&stream.hint);
            stream
        };

        let mut state = lock(&stream.state);
        state.closed = true;
        let Some(current) = state.current.take() else {
            return Ok(());
        };
        lock(&self.active).remove(&current.path);
        tracing::debug!(
            path = %current.path.display(),
            lines = current.lines,
            bytes = current.bytes,
            "closed log file"
        );
        current.file.sync_all().map_err(|source| Error::Write {
            path: current.path,
            source,
        })
    }

    /// Path of the file `handle` currently writes to.
    pub fn current_path(&self, handle: &WriteHandle) -> Option<PathBuf> {
        let stream = self.stream(handle).ok()?;
        let state = lock(&stream.state);
        state.current.as_ref().map(|c| c.path.clone())
    }

    /// Run a retention pass outside of rotation.
    pub fn enforce_retention(&self) -> RetentionReport {
        let _rotation = lock(&self.rotation_lock);
        self.run_retention()
    }

    fn stream(&self, handle: &WriteHandle) -> Result<Arc<Stream>> {
        lock(&self.registry)
            .handles
            .get(&handle.id)
            .cloned()
            .ok_or(Error::HandleClosed)
    }

    fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(date.format("%Y-%m").to_string())
            .join(date.format("%d").to_string())
    }

    /// Replace the stream's current file with the next part and run retention.
    fn rotate(
        &self,
        hint: &IdentifierHint,
        state: &mut StreamState,
        now: DateTime<FixedOffset>,
        reason: RotationReason,
    ) -> Result<()> {
        let mut marks = lock(&self.rotation_lock);
        let date = now.date_naive();
        let dir = self.day_dir(date);
        fs::create_dir_all(&dir).map_err(|source| Error::Write {
            path: dir.clone(),
            source,
        })?;

        let on_disk = retention::highest_part(&dir, &hint.robot_id, date).unwrap_or(0);
        let in_memory = marks.get(&hint.robot_id, date);
        let (path, id, file) = open_next_part(&dir, hint, on_disk.max(in_memory) + 1, now)?;
        marks.record(&hint.robot_id, date, id.part);

        if let Some(previous) = state.current.take() {
            if let Err(e) = previous.file.sync_all() {
                tracing::warn!(path = %previous.path.display(), error = %e, "failed to sync rotated log file");
            }
            lock(&self.active).remove(&previous.path);
        }
        lock(&self.active).insert(path.clone());
        tracing::debug!(path = %path.display(), reason = %reason, "opened log file");

        state.current = Some(FileState {
            path,
            id,
            file,
            bytes: 0,
            lines: 0,
        });

        self.run_retention();
        Ok(())
    }

    // Caller holds the rotation lock.
    fn run_retention(&self) -> RetentionReport {
        let open_files = lock(&self.active).clone();
        let report = self.retention.enforce(&self.root, &open_files);
        if !report.deleted.is_empty() {
            tracing::debug!(deleted = report.deleted.len(), "retention pass removed old log files");
        }
        report
    }
}

fn open_next_part(
    dir: &Path,
    hint: &IdentifierHint,
    mut part: u32,
    now: DateTime<FixedOffset>,
) -> Result<(PathBuf, FileIdentifier, File)> {
    let mut attempts = 0;
    loop {
        let id = FileIdentifier::new(
            hint.robot_id.as_str(),
            part,
            now.date_naive(),
            now.time(),
            hint.round_id.as_str(),
        );
        let path = dir.join(id.encode());
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, id, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_CREATE_ATTEMPTS => {
                attempts += 1;
                part += 1;
            }
            Err(source) => return Err(Error::Write { path, source }),
        }
    }
}
