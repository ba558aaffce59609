// Panic hooks are process-wide, so everything lives in one test.

use std::hint::black_box;

use robolog::{LogConfig, RobotLogger, TracebackConfig, TracebackRenderer, capture};

#[inline(never)]
fn descend(depth: u32) -> u32 {
    if depth == 0 {
        panic!("bottom reached at depth {}", black_box(depth));
    }
    black_box(descend(depth - 1)) + 1
}

fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .expect("read log file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

#[test]
fn test_thread_panic_is_logged_once_with_bounded_traceback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracebacks = TracebackConfig {
        max_frames: 8,
        context_lines: 3,
        extra_lines: 3,
    };
    let cfg = LogConfig::new()
        .with_console(false)
        .with_log_dir(dir.path().to_path_buf())
        .with_tracebacks(tracebacks);
    let logger = RobotLogger::init(cfg).expect("logger");
    let path = logger.current_file().expect("current file");

    logger.install_panic_capture();
    logger.install_panic_capture();
    assert!(capture::is_installed());

    let joined = std::thread::Builder::new()
        .name("deep-worker".to_string())
        .spawn(|| descend(500))
        .expect("spawn")
        .join();
    assert!(joined.is_err());

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 1, "panic logged more than once");
    let line = &lines[0];
    assert_eq!(line["level"], "CRITICAL");
    assert_eq!(line["name"], "panic");
    assert_eq!(line["message"], "Unhandled panic in thread deep-worker");
    assert_eq!(line["exc_name"], "panic");
    assert_eq!(line["exc_message"], "bottom reached at depth 0");
    assert!(line["pathname"].as_str().unwrap().ends_with("panic_capture_tests.rs"));

    let text = line["exc_info"].as_str().unwrap();
    assert!(text.starts_with("panic: bottom reached at depth 0"), "{text}");
    let frames = text.lines().filter(|l| l.starts_with("at ")).count();
    assert!(frames <= 8, "{text}");
    assert_eq!(
        text.lines().filter(|l| l.ends_with("frames omitted ...")).count(),
        1,
        "{text}"
    );
    assert!(text.lines().count() <= TracebackRenderer::new(8, 3, 3).max_lines());

    capture::uninstall();
    assert!(!capture::is_installed());
    let _ = std::thread::spawn(|| panic!("after uninstall")).join();
    assert_eq!(read_lines(&path).len(), 1);
}
