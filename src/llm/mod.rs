//! LLM 层：消息线格式、传输抽象与实现（OpenAI 兼容 / 脚本回放）

pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::ScriptedTransport;
pub use openai::{OpenAiTransport, TokenUsage};
pub use traits::ChatTransport;
pub use types::{ChatRequest, ChatResponse, FunctionCall, Message, Role, ToolCall, ToolChoice};
