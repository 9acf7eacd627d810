//! Chat Completion 传输抽象
//!
//! 编排器只依赖 ChatTransport：提交 (messages, tools, tool_choice)，拿回 assistant 消息与原始 JSON。

use async_trait::async_trait;

use crate::core::TransportError;
use crate::llm::{ChatRequest, ChatResponse};

/// 传输 trait：一次非流式完成
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
