//! 对话记录（Transcript Sink）
//!
//! 编排器在每一轮把请求载荷、原始响应、动作结果、最终回答或失败报告交给 TranscriptSink。
//! 内置实现：TracingSink（结构化日志）、FileTranscriptSink（调试文件）、ChannelSink（TUI 调试面板）、
//! FanoutSink（组合多个）。

pub mod file;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::llm::{Message, ToolCall};

pub use file::FileTranscriptSink;

/// 观察者接口；所有方法默认空实现，写入失败只记日志，不影响对话
pub trait TranscriptSink: Send + Sync {
    /// 即将发出的请求载荷（messages / tools / tool_choice）
    fn on_request(&self, _turn: usize, _payload: &Value) {}

    /// 传输层返回的原始 JSON
    fn on_response(&self, _turn: usize, _raw: &Value) {}

    /// 单个动作调用完成
    fn on_dispatch(&self, _turn: usize, _call: &ToolCall, _result: &Value) {}

    /// 对话正常结束，rendered 为 markdown
    fn on_finalized(&self, _turn: usize, _rendered: &str) {}

    fn on_failed(&self, _report: &FailureReport) {}

    /// 该轮产生的诊断文件引用，写入 FailureReport
    fn artifact_refs(&self, _turn: usize) -> Vec<String> {
        Vec::new()
    }
}

/// 失败报告：最后的输入、错误、轮次、完整消息栈与诊断文件
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailureReport {
    pub prompt: String,
    pub error: String,
    pub turn: usize,
    pub history: Vec<Message>,
    pub artifacts: Vec<String>,
}

impl FailureReport {
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# `ERROR`: **Failed to get assistant response**".to_string(),
            format!("- `Message`: **{}**", self.error),
            format!("- `Prompt`: **{}**", self.prompt),
            format!("- `Turn`: **{}**", self.turn),
        ];
        for artifact in &self.artifacts {
            lines.push(format!("- `Debug File`: **{artifact}**"));
        }
        lines.push("# Message Stack".to_string());
        for msg in &self.history {
            lines.push("---".to_string());
            lines.push(format!("- `Role`: **{}**", msg.role.as_str()));
            lines.push(format!("  - `Content`: {}", msg.content_str()));
            if let Some(id) = &msg.tool_call_id {
                lines.push(format!("  - `ToolCall-ID`: **{id}**"));
            }
            for (i, call) in msg.tool_calls.iter().flatten().enumerate() {
                lines.push(format!("  - `Index`: **{i}** -- `ID`: **{}**", call.id));
                lines.push(format!("    - `Type`: **{}**", call.kind));
                lines.push(format!(
                    "    - `Function`: **{}({})**",
                    call.function.name, call.function.arguments
                ));
            }
        }
        lines.join("\n")
    }
}

/// 最终回答的 markdown 呈现
pub fn render_answer(prompt: &str, answer: &str) -> String {
    [
        "# Prompt".to_string(),
        format!("- `Input`: **{prompt}**"),
        "# Response".to_string(),
        answer.to_string(),
    ]
    .join("\n")
}

/// 结构化日志 sink
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TranscriptSink for TracingSink {
    fn on_request(&self, turn: usize, payload: &Value) {
        let messages = payload["messages"].as_array().map_or(0, Vec::len);
        let tools = payload["tools"].as_array().map_or(0, Vec::len);
        tracing::info!(turn, messages, tools, "chat request");
        tracing::debug!(turn, payload = %payload, "chat request payload");
    }

    fn on_response(&self, turn: usize, raw: &Value) {
        let finish = raw["choices"][0]["finish_reason"].as_str().unwrap_or("-");
        tracing::info!(turn, finish_reason = finish, "chat response");
        tracing::debug!(turn, raw = %raw, "chat response payload");
    }

    fn on_dispatch(&self, turn: usize, call: &ToolCall, result: &Value) {
        tracing::debug!(turn, action = call.name(), call_id = %call.id, result = %result, "tool result");
    }

    fn on_finalized(&self, turn: usize, _rendered: &str) {
        tracing::info!(turn, "conversation finalized");
    }

    fn on_failed(&self, report: &FailureReport) {
        tracing::error!(turn = report.turn, error = %report.error, "conversation failed");
    }
}

/// 把调试行推给 TUI 调试面板
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    fn send(&self, line: String) {
        let _ = self.tx.send(line);
    }
}

impl TranscriptSink for ChannelSink {
    fn on_dispatch(&self, _turn: usize, call: &ToolCall, result: &Value) {
        self.send(format!(
            "{} :: Tool: {} - Args: {}",
            chrono::Local::now().format("%H:%M:%S"),
            call.name(),
            call.function.arguments
        ));
        self.send(serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()));
    }

    fn on_failed(&self, report: &FailureReport) {
        self.send(format!(
            "{} :: Failed at turn {}: {}",
            chrono::Local::now().format("%H:%M:%S"),
            report.turn,
            report.error
        ));
    }
}

/// 依次转发给多个 sink
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TranscriptSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TranscriptSink for FanoutSink {
    fn on_request(&self, turn: usize, payload: &Value) {
        self.sinks.iter().for_each(|s| s.on_request(turn, payload));
    }

    fn on_response(&self, turn: usize, raw: &Value) {
        self.sinks.iter().for_each(|s| s.on_response(turn, raw));
    }

    fn on_dispatch(&self, turn: usize, call: &ToolCall, result: &Value) {
        self.sinks.iter().for_each(|s| s.on_dispatch(turn, call, result));
    }

    fn on_finalized(&self, turn: usize, rendered: &str) {
        self.sinks.iter().for_each(|s| s.on_finalized(turn, rendered));
    }

    fn on_failed(&self, report: &FailureReport) {
        self.sinks.iter().for_each(|s| s.on_failed(report));
    }

    fn artifact_refs(&self, turn: usize) -> Vec<String> {
        self.sinks.iter().flat_map(|s| s.artifact_refs(turn)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> FailureReport {
        FailureReport {
            prompt: "close issue 3".into(),
            error: "transport timed out after 60s".into(),
            turn: 2,
            history: vec![
                Message::system("policy"),
                Message::user("close issue 3"),
                Message::tool_request(vec![ToolCall::new("call_1", "close_issue", r#"{"index":3}"#)]),
                Message::tool_result("call_1", &json!({"result": "success"})),
            ],
            artifacts: vec!["req-00002.json".into(), "choices-00002.json".into()],
        }
    }

    #[test]
    fn test_render_answer() {
        let md = render_answer("list labels", "| # | name |");
        assert_eq!(md, "# Prompt\n- `Input`: **list labels**\n# Response\n| # | name |");
    }

    #[test]
    fn test_failure_report_markdown() {
        let md = report().to_markdown();
        assert!(md.starts_with("# `ERROR`"));
        assert!(md.contains("- `Message`: **transport timed out after 60s**"));
        assert!(md.contains("- `Turn`: **2**"));
        assert!(md.contains("**req-00002.json**"));
        assert!(md.contains("**choices-00002.json**"));
        assert!(md.contains("`ToolCall-ID`: **call_1**"));
        assert!(md.contains("close_issue({\"index\":3})"));
        assert_eq!(md.matches("---").count(), 4);
    }

    #[test]
    fn test_fanout_collects_artifacts() {
        struct Refs(&'static str);
        impl TranscriptSink for Refs {
            fn artifact_refs(&self, turn: usize) -> Vec<String> {
                vec![format!("{}-{turn}", self.0)]
            }
        }
        let fan = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(Refs("a")))
            .with(Arc::new(Refs("b")));
        assert_eq!(fan.artifact_refs(4), vec!["a-4", "b-4"]);
    }

    #[test]
    fn test_channel_sink_lines() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        sink.on_dispatch(1, &ToolCall::new("x", "list_labels", "{}"), &json!({"error": "nope"}));
        let head = rx.try_recv().unwrap();
        assert!(head.ends_with(":: Tool: list_labels - Args: {}"));
        assert!(rx.try_recv().unwrap().contains("nope"));
    }
}
