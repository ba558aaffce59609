//! Panic capture example.
//!
//! A worker thread panics deep inside a recursive call; the panic is logged
//! at CRITICAL with a compact traceback before the default hook prints it.
//!
//! Run with:
//! ```bash
//! cargo run --example panic_capture
//! ```

use robolog::TracebackConfig;

fn walk(depth: u32) -> u32 {
    if depth == 0 {
        let steps: Vec<u32> = Vec::new();
        return steps[3];
    }
    walk(depth - 1) + 1
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let guard = robolog::builder()
        .with_log_dir(std::env::temp_dir().join("robolog-demo"))
        .with_robo_id("99")
        .with_tracebacks(TracebackConfig {
            max_frames: 5,
            ..TracebackConfig::default()
        })
        .init()?;

    let worker = std::thread::Builder::new()
        .name("walker".to_string())
        .spawn(|| walk(200))?;
    if worker.join().is_err() {
        tracing::error!("walker thread died");
    }

    if let Some(path) = guard.logger().current_file() {
        println!("panic recorded in {}", path.display());
    }
    Ok(())
}
