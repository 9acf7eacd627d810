//! 错误类型
//!
//! 三个层级：
//! - 编译期（Registry 构建）：SchemaCompileError / RegistryError，直接让构建失败；
//! - 动作级：ActionError，由 Dispatcher 吞下并转为 tool 结果消息，交给模型自行处理；
//! - 对话级：TransportError / TurnLimitExceeded，终止当前对话并生成 FailureReport。

use thiserror::Error;

/// 文档块编译失败：动作整体不可用，而不是「半描述」地暴露给模型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaCompileError {
    #[error("action `{action}` has no description line")]
    MissingDescription { action: String },

    #[error("action `{action}` requires undeclared parameter `{param}`")]
    UnknownRequired { action: String, param: String },

    #[error("action `{action}` declares parameter `{param}` more than once")]
    DuplicateParameter { action: String, param: String },
}

/// Registry 构建失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Compile(#[from] SchemaCompileError),

    #[error("action `{0}` is registered more than once")]
    DuplicateAction(String),
}

/// 单次动作调用失败；Display 文本即为 `<name> raised an error: <message>` 中的 message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` must be {expected}")]
    InvalidArgument { name: String, expected: &'static str },

    #[error("invalid arguments: {0}")]
    InvalidPayload(String),

    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),

    #[error("{0}")]
    Provider(String),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// 传输层失败（超时、API 报错、响应格式不对）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("API error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// 终止对话的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("turn limit exceeded ({0} turns)")]
    TurnLimitExceeded(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_messages() {
        assert_eq!(
            ActionError::MissingArgument("owner".into()).to_string(),
            "missing required argument `owner`"
        );
        assert_eq!(
            ActionError::InvalidArgument { name: "index".into(), expected: "an integer" }.to_string(),
            "argument `index` must be an integer"
        );
        assert_eq!(ActionError::Timeout(30).to_string(), "timed out after 30s");
        assert_eq!(
            ActionError::UnexpectedArgument("status".into()).to_string(),
            "unexpected argument `status`"
        );
    }

    #[test]
    fn test_turn_limit_message() {
        let err = ConversationError::TurnLimitExceeded(4);
        assert!(err.to_string().contains("turn limit exceeded"));
    }

    #[test]
    fn test_registry_error_wraps_compile_error() {
        let err: RegistryError = SchemaCompileError::MissingDescription { action: "x".into() }.into();
        assert_eq!(err.to_string(), "action `x` has no description line");
    }
}
