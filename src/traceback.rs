//! Compact, bounded tracebacks.
//!
//! A rendered traceback looks like:
//!
//! ```text
//! panic: index out of bounds
//! at src/main.rs:88 in robot::main
//! ... 491 frames omitted ...
//! at src/steps.rs:46 in robot::steps::walk
//! at src/steps.rs:55 in robot::steps::divide
//!     53 |     let total = items.len();
//!   > 55 |     let avg = sum / total;
//!     56 |     avg
//! Caused by: division by zero
//! ```
//!
//! However deep the stack, the output never exceeds
//! [`TracebackRenderer::max_lines`].

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};

use crate::record::ExceptionRecord;

/// Default number of frames kept.
pub const DEFAULT_MAX_FRAMES: usize = 8;
/// Default number of source lines shown around the failing line.
pub const DEFAULT_CONTEXT_LINES: usize = 3;
/// Default number of trailing source lines after the context window.
pub const DEFAULT_EXTRA_LINES: usize = 3;

/// One stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled function path.
    pub function: String,
    /// Source file, when debug info has it.
    pub file: Option<PathBuf>,
    /// 1-based line, when debug info has it.
    pub line: Option<u32>,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: Option<PathBuf>, line: Option<u32>) -> Self {
        Self {
            function: function.into(),
            file,
            line,
        }
    }
}

/// An error or panic before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExceptionInfo {
    /// Short type name.
    pub type_name: String,
    /// Display text of the error itself.
    pub message: String,
    /// Stack frames, outermost (entry point) first, raise site last.
    pub frames: Vec<Frame>,
    /// Display text of each `source()` in the chain, nearest first.
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Describe `err` and its `source()` chain, named after `E`.
    pub fn from_error<E: StdError + 'static>(err: &E) -> Self {
        Self::from_dyn_error(err, short_type_name::<E>())
    }

    /// Describe a type-erased error under an explicit name.
    pub fn from_dyn_error(err: &(dyn StdError + 'static), type_name: &str) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_name: type_name.to_string(),
            message: err.to_string(),
            frames: Vec::new(),
            causes,
        }
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Attach the current call stack.
    pub fn capture_backtrace(self) -> Self {
        let frames = current_frames();
        self.with_frames(frames)
    }
}

/// Last path segment of `T`'s type name, generics included.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Resolve the current stack, outermost first.
///
/// The leading run of frames belonging to the backtrace machinery, the panic
/// runtime and the standard library is dropped, as is everything from the
/// runtime's entry shim outwards.
pub(crate) fn current_frames() -> Vec<Frame> {
    let backtrace = backtrace::Backtrace::new();
    let mut frames: Vec<Frame> = Vec::new();
    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            let Some(name) = symbol.name() else { continue };
            frames.push(Frame::new(
                format!("{name:#}"),
                symbol.filename().map(Path::to_path_buf),
                symbol.lineno(),
            ));
        }
    }

    // Innermost first at this point.
    let start = frames
        .iter()
        .position(|f| !is_runtime_frame(f))
        .unwrap_or(frames.len());
    let end = frames
        .iter()
        .position(|f| f.function.contains("__rust_begin_short_backtrace"))
        .filter(|idx| *idx >= start)
        .unwrap_or(frames.len());

    let mut frames: Vec<Frame> = frames.drain(start..end).collect();
    while frames.last().is_some_and(is_runtime_frame) {
        frames.pop();
    }
    frames.reverse();
    frames
}

fn is_runtime_frame(frame: &Frame) -> bool {
    const PREFIXES: &[&str] = &[
        "backtrace::",
        "std::",
        "core::",
        "alloc::",
        "<std::",
        "<core::",
        "<alloc::",
        "__rustc::",
        "rust_panic",
        "robolog::capture::",
        "robolog::traceback::current_frames",
        "robolog::traceback::ExceptionInfo::capture_backtrace",
        "robolog::logger::RobotLogger::exception",
        "robolog::logger::NamedLogger::exception",
    ];
    let name = frame.function.as_str();
    PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains("rust_begin_unwind")
}

/// Renders [`ExceptionInfo`] into bounded text.
#[derive(Debug, Clone)]
pub struct TracebackRenderer {
    max_frames: usize,
    context_lines: usize,
    extra_lines: usize,
    base_dir: Option<PathBuf>,
}

impl Default for TracebackRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAMES, DEFAULT_CONTEXT_LINES, DEFAULT_EXTRA_LINES)
    }
}

impl TracebackRenderer {
    /// `max_frames` below 1 is treated as 1. Paths are shown relative to the
    /// current directory.
    pub fn new(max_frames: usize, context_lines: usize, extra_lines: usize) -> Self {
        Self {
            max_frames: max_frames.max(1),
            context_lines,
            extra_lines,
            base_dir: std::env::current_dir().ok(),
        }
    }

    /// Show paths relative to `base_dir` instead of the working directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Upper bound on the number of lines [`render`](Self::render) produces.
    pub fn max_lines(&self) -> usize {
        let per_frame = 1 + self.context_lines + self.extra_lines;
        // summary + frames + frame marker + causes + cause marker
        1 + self.max_frames * per_frame + 1 + self.max_frames + 1
    }

    /// Render `exc` into the fields stored on a record.
    pub fn render(&self, exc: &ExceptionInfo) -> ExceptionRecord {
        let mut lines = Vec::new();
        let first_line = exc.message.lines().next().unwrap_or("");
        lines.push(format!("{}: {}", exc.type_name, first_line));

        let mut sources = SourceCache::default();
        let (head, omitted, tail) = self.select_frames(&exc.frames);
        for frame in head {
            self.render_frame(frame, &mut sources, &mut lines);
        }
        if omitted > 0 {
            lines.push(format!("... {omitted} frames omitted ..."));
        }
        for frame in tail {
            self.render_frame(frame, &mut sources, &mut lines);
        }

        for cause in exc.causes.iter().take(self.max_frames) {
            let cause = cause.lines().next().unwrap_or("");
            lines.push(format!("Caused by: {cause}"));
        }
        if exc.causes.len() > self.max_frames {
            lines.push(format!(
                "... {} more causes ...",
                exc.causes.len() - self.max_frames
            ));
        }

        ExceptionRecord {
            exc_type_name: exc.type_name.clone(),
            exc_message: exc.message.clone(),
            rendered_traceback: lines.join("\n"),
        }
    }

    /// Keep the entry-point frame and the frames nearest the raise site.
    fn select_frames<'a>(&self, frames: &'a [Frame]) -> (&'a [Frame], usize, &'a [Frame]) {
        if frames.len() <= self.max_frames {
            return (frames, 0, &[]);
        }
        let head = if self.max_frames > 1 { 1 } else { 0 };
        let tail = self.max_frames - head;
        let omitted = frames.len() - head - tail;
        (&frames[..head], omitted, &frames[frames.len() - tail..])
    }

    fn render_frame(&self, frame: &Frame, sources: &mut SourceCache, out: &mut Vec<String>) {
        let location = match (&frame.file, frame.line) {
            (Some(file), Some(line)) => format!("{}:{}", self.display_path(file), line),
            (Some(file), None) => self.display_path(file),
            _ => "<unknown>".to_string(),
        };
        out.push(format!("at {location} in {}", frame.function));

        let (Some(file), Some(line)) = (&frame.file, frame.line) else {
            return;
        };
        if self.context_lines == 0 || line == 0 {
            return;
        }
        let Some(source) = sources.get(file) else {
            return;
        };

        let line = line as usize;
        let before = (self.context_lines - 1) / 2;
        let after = self.context_lines - 1 - before;
        let first = line.saturating_sub(before).max(1);
        let last = (line + after + self.extra_lines).min(source.len());
        let width = last.to_string().len();
        for n in first..=last {
            let marker = if n == line { ">" } else { " " };
            let text = source[n - 1].trim_end();
            out.push(format!("  {marker} {n:>width$} | {text}"));
        }
    }

    fn display_path(&self, path: &Path) -> String {
        self.base_dir
            .as_deref()
            .and_then(|base| path.strip_prefix(base).ok())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Source files read during one render.
#[derive(Default)]
struct SourceCache {
    files: HashMap<PathBuf, Option<Vec<String>>>,
}

impl SourceCache {
    fn get(&mut self, path: &Path) -> Option<&[String]> {
        self.files
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                fs::read_to_string(path)
                    .ok()
                    .map(|s| s.lines().map(str::to_string).collect())
            })
            .as_deref()
    }
}
