//! 调试文件 sink
//!
//! 每轮写两个文件：`req-NNNNN.json`（发出的请求载荷）与 `choices-NNNNN.json`（响应中的 choices）；
//! 失败时向 `error.debug` 追加完整消息栈。

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::transcript::{FailureReport, TranscriptSink};

pub struct FileTranscriptSink {
    dir: PathBuf,
}

impl FileTranscriptSink {
    /// 目录不存在时创建
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn request_path(&self, turn: usize) -> PathBuf {
        self.dir.join(format!("req-{turn:05}.json"))
    }

    pub fn choices_path(&self, turn: usize) -> PathBuf {
        self.dir.join(format!("choices-{turn:05}.json"))
    }

    pub fn error_path(&self) -> PathBuf {
        self.dir.join("error.debug")
    }

    fn write_json(&self, path: &Path, value: &Value) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        if let Err(e) = fs::write(path, text) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write transcript file");
        }
    }
}

impl TranscriptSink for FileTranscriptSink {
    fn on_request(&self, turn: usize, payload: &Value) {
        self.write_json(&self.request_path(turn), payload);
    }

    fn on_response(&self, turn: usize, raw: &Value) {
        let choices = raw.get("choices").unwrap_or(raw);
        self.write_json(&self.choices_path(turn), choices);
    }

    fn on_failed(&self, report: &FailureReport) {
        let path = self.error_path();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut fp| {
                for msg in &report.history {
                    let text = serde_json::to_string_pretty(msg).unwrap_or_default();
                    writeln!(fp, "{text}")?;
                }
                writeln!(fp, "{}", "-".repeat(80))?;
                writeln!(fp, "turn {}: {}", report.turn, report.error)
            });
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to write error transcript");
        }
    }

    fn artifact_refs(&self, turn: usize) -> Vec<String> {
        vec![
            self.request_path(turn).display().to_string(),
            self.choices_path(turn).display().to_string(),
        ]
    }
}
