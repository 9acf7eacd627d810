//! 可观测性：tracing-subscriber 初始化
//!
//! 默认级别 info，可用 RUST_LOG 覆盖。TUI 模式下日志写入文件，避免破坏全屏界面。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 日志输出到 stderr（一次性 `-p` 模式与 `--list-actions`）
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// 日志追加到文件（TUI 模式）
pub fn init_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init();
    Ok(())
}
