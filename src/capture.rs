//! Process-wide panic capture.
//!
//! [`install`] chains a hook in front of whatever panic hook was registered
//! before, so every panic on any thread is reported to a [`PanicSink`] and
//! then handled exactly as it would have been without us (printed, unwound,
//! or aborted).

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, PanicHookInfo};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::record::SourceLocation;
use crate::traceback::{self, Frame};
use crate::writer::lock;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// A panic as seen by the hook.
#[derive(Debug, Clone)]
pub struct PanicReport {
    /// Name of the panicking thread, `<unnamed>` when it has none.
    pub thread: String,
    /// Panic payload as text.
    pub message: String,
    /// Where `panic!` was invoked.
    pub location: Option<SourceLocation>,
    /// Stack at the panic site, outermost first.
    pub frames: Vec<Frame>,
}

/// Receives every captured panic.
pub trait PanicSink: Send + Sync {
    fn on_panic(&self, report: &PanicReport);
}

static SINK: Lazy<Mutex<Option<Arc<dyn PanicSink>>>> = Lazy::new(|| Mutex::new(None));
static PREVIOUS: Lazy<Mutex<Option<Arc<PanicHook>>>> = Lazy::new(|| Mutex::new(None));

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Route panics to `sink`.
///
/// The first call wraps the current panic hook; later calls only replace the
/// sink, so installing twice never logs a panic twice.
pub fn install(sink: Arc<dyn PanicSink>) {
    let mut previous = lock(&PREVIOUS);
    *lock(&SINK) = Some(sink);
    if previous.is_some() {
        return;
    }
    let prev: Arc<PanicHook> = Arc::new(panic::take_hook());
    *previous = Some(Arc::clone(&prev));
    panic::set_hook(Box::new(move |info| {
        report(info);
        prev(info);
    }));
}

/// Remove the sink and put the wrapped hook back.
pub fn uninstall() {
    let mut previous = lock(&PREVIOUS);
    *lock(&SINK) = None;
    let Some(prev) = previous.take() else {
        return;
    };
    let _ours = panic::take_hook();
    panic::set_hook(Box::new(move |info| prev(info)));
}

/// Whether a sink is currently receiving panics.
pub fn is_installed() -> bool {
    lock(&SINK).is_some()
}

fn report(info: &PanicHookInfo<'_>) {
    if IN_HOOK.with(|flag| flag.replace(true)) {
        return;
    }
    let sink = lock(&SINK).clone();
    if let Some(sink) = sink {
        let current = std::thread::current();
        let report = PanicReport {
            thread: current.name().unwrap_or("<unnamed>").to_string(),
            message: payload_text(info.payload()),
            location: info.location().map(SourceLocation::from),
            frames: traceback::current_frames(),
        };
        sink.on_panic(&report);
    }
    IN_HOOK.with(|flag| flag.set(false));
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_text() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(payload_text(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_text(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(payload_text(s.as_ref()), "Box<dyn Any>");
    }
}
