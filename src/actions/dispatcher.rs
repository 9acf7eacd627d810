//! 动作分发器
//!
//! 持有 ActionRegistry 与单次调用超时；dispatch(call) 解码参数、按名查找并调用动作。
//! 任何失败（未知动作、参数错误、后端报错、超时）都变成 `{"error": ...}` 结果，绝不上抛；
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;

use crate::actions::{ActionArgs, ActionRegistry};
use crate::core::ActionError;
use crate::llm::ToolCall;

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 单次分发的结果
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchOutcome {
    pub ok: bool,
    pub value: Value,
}

/// 动作分发器：对每次调用施加超时，失败转为错误结果
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// 执行一个 tool call；结果总能写成 tool 消息
    pub async fn dispatch(&self, call: &ToolCall) -> DispatchOutcome {
        let name = call.name();
        let start = Instant::now();

        let Some(action) = self.registry.get(name) else {
            tracing::warn!(action = name, "unknown action requested");
            return DispatchOutcome {
                ok: false,
                value: json!({ "error": format!("unknown action {name}") }),
            };
        };

        let result = match self.checked_args(name, &call.function.arguments) {
            Ok(args) => match timeout(self.timeout, action.invoke(args)).await {
                Ok(r) => r,
                Err(_) => Err(ActionError::Timeout(self.timeout.as_secs())),
            },
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ActionError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = json!({
            "event": "action_audit",
            "action": name,
            "call_id": call.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.function.arguments),
        });
        tracing::info!(audit = %audit, "action");

        match result {
            Ok(value) => DispatchOutcome { ok: true, value },
            Err(e) => {
                tracing::warn!(action = name, error = %e, "action failed");
                DispatchOutcome {
                    ok: false,
                    value: json!({ "error": format!("{name} raised an error: {e}") }),
                }
            }
        }
    }

    /// 解码参数并对照描述符：未声明的参数名直接拒绝，不静默丢弃
    fn checked_args(&self, name: &str, raw: &str) -> Result<ActionArgs, ActionError> {
        let args = ActionArgs::parse(raw)?;
        if let Some(descriptor) = self.registry.descriptor(name) {
            if let Some(key) = args.keys().find(|k| descriptor.parameter(k).is_none()) {
                return Err(ActionError::UnexpectedArgument(key.to_string()));
            }
        }
        Ok(args)
    }
}

fn args_preview(raw: &str) -> String {
    if raw.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", raw.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        raw.to_string()
    }
}
