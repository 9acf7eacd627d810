//! OpenAI 兼容 API 传输
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。请求体直接使用本 crate 的线格式
//! （byot：bring your own types），这样 tools 目录与 tool_calls 历史可以原样往返，原始响应也能交给 TranscriptSink。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::core::TransportError;
use crate::llm::{ChatRequest, ChatResponse, ChatTransport};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    /// 从原始响应的 usage 字段累加
    fn record(&self, raw: &Value) {
        let Some(usage) = raw.get("usage") else {
            return;
        };
        let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
        let completion = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0);
        self.add(prompt, completion);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容传输：持有 Client 与 model 名
pub struct OpenAiTransport {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiTransport {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    /// 线格式请求体 + model
    fn body(&self, request: &ChatRequest) -> Value {
        let mut body = request.to_payload();
        if let Value::Object(map) = &mut body {
            map.insert("model".to_string(), Value::String(self.model.clone()));
        }
        body
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let raw: Value = self
            .client
            .chat()
            .create_byot(self.body(request))
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;

        self.usage.record(&raw);
        ChatResponse::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Message, ToolChoice};
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![Message::system("policy"), Message::user("close issue 3")],
            tools: vec![json!({"type": "function", "function": {"name": "close_issue"}})],
            tool_choice: ToolChoice::Auto,
        }
    }

    #[test]
    fn test_body_carries_model_and_wire_payload() {
        let t = OpenAiTransport::new(Some("http://localhost:1/v1/"), "gpt-4o-mini", Some("sk-test"));
        let body = t.body(&request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "close_issue");
    }

    #[test]
    fn test_usage_record() {
        let usage = TokenUsage::new();
        usage.record(&json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5}}));
        usage.record(&json!({}));
        assert_eq!(usage.get(), (10, 5, 15));
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "finish_reason": "tool_calls",
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {"name": "close_issue", "arguments": "{\"index\":3}"}
                            }]
                        }
                    }],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let t = OpenAiTransport::new(Some(&server.url()), "gpt-4o-mini", Some("sk-test"));
        let resp = t.complete(&request()).await.unwrap();
        mock.assert_async().await;

        let calls = resp.message.requested_calls().unwrap();
        assert_eq!(calls[0].name(), "close_issue");
        assert_eq!(resp.raw["id"], "chatcmpl-1");
        assert_eq!(t.token_usage(), (12, 3, 15));
    }
}
