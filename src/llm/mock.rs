//! 脚本回放传输（用于测试，无需 API）
//!
//! 按顺序返回预置的响应或错误，并记录收到的每个请求，便于断言消息顺序与工具目录。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::TransportError;
use crate::llm::{ChatRequest, ChatResponse, ChatTransport, ToolCall};

/// 回放客户端：脚本耗尽后返回 Api 错误
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Value, TransportError>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条原始响应
    pub fn reply_raw(self, raw: Value) -> Self {
        self.push(Ok(raw));
        self
    }

    /// 追加一条纯文本最终回复
    pub fn reply_text(self, content: &str) -> Self {
        self.reply_raw(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    /// 追加一条工具调用回复
    pub fn reply_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.reply_raw(json!({
            "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": calls}}]
        }))
    }

    /// 追加一次传输失败
    pub fn fail(self, err: TransportError) -> Self {
        self.push(Err(err));
        self
    }

    fn push(&self, item: Result<Value, TransportError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    /// 目前为止收到的全部请求
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| TransportError::Api("script lock poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Api("script exhausted".to_string())));
        ChatResponse::from_raw(next?)
    }
}
