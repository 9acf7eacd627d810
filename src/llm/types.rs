//! 对话消息与 Chat Completion 线格式
//!
//! 与 OpenAI 兼容接口一致：消息 role 为 system/user/assistant/tool，
//! assistant 可携带 tool_calls，tool 消息用 tool_call_id 关联到对应请求。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// 模型发出的函数调用：arguments 是 JSON 编码的字符串，由 Dispatcher 负责解码
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// 单个 tool call 请求
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// 单条消息；未知字段（如 reasoning_content）在反序列化时丢弃
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// 仅携带 tool_calls 的 assistant 消息
    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// tool 结果消息：content 为结果的 JSON 文本
    pub fn tool_result(tool_call_id: impl Into<String>, result: &Value) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.to_string()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// 非空的 tool_calls；空数组视为没有请求
    pub fn requested_calls(&self) -> Option<&[ToolCall]> {
        match &self.tool_calls {
            Some(calls) if !calls.is_empty() => Some(calls),
            _ => None,
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// tool_choice 策略；本系统始终使用 auto
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// 一次 Chat Completion 请求（不含 model，由具体传输实现补上）
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<Value>,
    pub tool_choice: ToolChoice,
}

impl ChatRequest {
    /// 请求的 JSON 形态，供 TranscriptSink 落盘
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 一次 Chat Completion 响应：解码后的 assistant 消息与原始 JSON
#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub message: Message,
    pub raw: Value,
}

impl ChatResponse {
    /// 从原始响应中取 choices[0].message
    pub fn from_raw(raw: Value) -> Result<Self, crate::core::TransportError> {
        let message = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .cloned()
            .ok_or_else(|| {
                crate::core::TransportError::Malformed("missing choices[0].message".to_string())
            })?;
        let message: Message = serde_json::from_value(message)
            .map_err(|e| crate::core::TransportError::Malformed(e.to_string()))?;
        Ok(Self { message, raw })
    }
}
