//! 状态定义：Conversation（单次对话）与 UiState 投影
//!
//! Conversation 只允许追加消息，历史对外只读；阶段变化由 Orchestrator 驱动。
//! UI 只持有轻量的 UiState（阶段、正文、锁、错误）。

use serde::Serialize;

use crate::llm::{Message, ToolCall};
use crate::transcript::{render_answer, FailureReport};

/// 对话阶段
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Init,
    AwaitingModel,
    /// 本轮待执行的调用，按模型给出的顺序
    Dispatching { calls: Vec<ToolCall> },
    Finalized { answer: String },
    Failed { report: FailureReport },
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finalized { .. } | Phase::Failed { .. })
    }

    pub fn label(&self) -> PhaseLabel {
        match self {
            Phase::Init => PhaseLabel::Idle,
            Phase::AwaitingModel => PhaseLabel::AwaitingModel,
            Phase::Dispatching { .. } => PhaseLabel::Dispatching,
            Phase::Finalized { .. } => PhaseLabel::Finalized,
            Phase::Failed { .. } => PhaseLabel::Failed,
        }
    }
}

/// 单次用户输入对应的一段对话
#[derive(Clone, Debug)]
pub struct Conversation {
    system_prompt: String,
    prompt: String,
    messages: Vec<Message>,
    turn: usize,
    phase: Phase,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            messages: Vec::new(),
            turn: 0,
            phase: Phase::Init,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 已完成的传输调用次数
    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn answer(&self) -> Option<&str> {
        match &self.phase {
            Phase::Finalized { answer } => Some(answer),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&FailureReport> {
        match &self.phase {
            Phase::Failed { report } => Some(report),
            _ => None,
        }
    }

    /// 写入 system 与 user 两条起始消息
    pub(crate) fn seed(&mut self) {
        self.messages.push(Message::system(self.system_prompt.clone()));
        self.messages.push(Message::user(self.prompt.clone()));
    }

    pub(crate) fn next_turn(&mut self) -> usize {
        self.turn += 1;
        self.turn
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// 追加 assistant 的 tool_calls 消息；若历史末尾已是相同的调用列表则跳过，返回是否追加
    pub(crate) fn append_tool_request(&mut self, message: Message) -> bool {
        let duplicate = self.messages.last().is_some_and(|last| {
            last.tool_calls.is_some() && last.tool_calls == message.tool_calls
        });
        if !duplicate {
            self.messages.push(message);
        }
        !duplicate
    }

    /// 一次性追加整批 tool 结果
    pub(crate) fn append_batch(&mut self, batch: Vec<Message>) {
        self.messages.extend(batch);
    }

    /// 面向 UI 的投影
    pub fn project(&self) -> UiState {
        let body = match &self.phase {
            Phase::Finalized { answer } => render_answer(&self.prompt, answer),
            Phase::Failed { report } => report.to_markdown(),
            _ => format!("# Prompt\n- `Input`: **{}**", self.prompt),
        };
        UiState {
            phase: self.phase.label(),
            body,
            turn: self.turn,
            input_locked: !self.is_terminal(),
            error_message: self.report().map(|r| r.error.clone()),
        }
    }
}

/// UI 看到的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PhaseLabel {
    Idle,
    AwaitingModel,
    Dispatching,
    Finalized,
    Failed,
}

impl PhaseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Idle => "idle",
            PhaseLabel::AwaitingModel => "awaiting model",
            PhaseLabel::Dispatching => "dispatching",
            PhaseLabel::Finalized => "done",
            PhaseLabel::Failed => "failed",
        }
    }
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub phase: PhaseLabel,
    /// markdown 正文：最终回答或失败报告
    pub body: String,
    pub turn: usize,
    pub input_locked: bool,
    pub error_message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            phase: PhaseLabel::Idle,
            body: String::new(),
            turn: 0,
            input_locked: false,
            error_message: None,
        }
    }
}
