//! 对话编排器：核心状态机
//!
//! Init → AwaitingModel → {Dispatching → AwaitingModel}* → {Finalized | Failed}
//!
//! - AwaitingModel：携带完整历史与完整工具目录调用传输层（tool_choice = auto）；
//!   有 tool_calls 则追加 assistant 消息并进入 Dispatching，否则把内容作为最终回答
//! - Dispatching：逐个（或并发）执行调用，按模型给出的顺序整批追加 tool 结果
//! - 传输失败或超过 max_turns 进入 Failed，附带完整历史与失败报告
//!
//! `step` 需要 `&mut Conversation`，同一对话任一时刻最多一个在途请求。

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::actions::{DispatchOutcome, Dispatcher};
use crate::core::state::{Conversation, Phase};
use crate::core::{ConversationError, TransportError};
use crate::llm::{ChatRequest, ChatTransport, Message, ToolCall, ToolChoice};
use crate::transcript::{render_answer, FailureReport, TracingSink, TranscriptSink};

/// 未配置 system_prompt 时使用的默认策略文本
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a task automation assistant specialized in project repository management. Your primary directives are:
1. Categorization First. Always prefer labels/tags when available. If labels are missing but logical for the context (e.g., `Priority/High`, `Kind/Bug`), create them proactively. Mandatory label for new issues: `Agent/Review` (verify existence; create if absent).
2. Resource Descriptions. When descriptions are unspecified, use your best judgement based on the title.
3. Formatting Rules. Markdown required for all responses. For lists >3 items, always use numbered tables.
4. Issue Creation Protocol. Assign to the default user (retrieved via `default_user` tool unless overridden).
5. Tool Usage. Verify label existence *before* issue creation via `list_labels`.";

/// 编排参数（构造时传入，之后不变）
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    /// 单次对话允许的传输调用次数
    pub max_turns: usize,
    pub request_timeout_secs: u64,
    /// 同一批调用是否并发执行（结果仍按顺序追加）
    pub parallel_dispatch: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: 16,
            request_timeout_secs: 60,
            parallel_dispatch: false,
        }
    }
}

/// 对话结果
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Finalized { answer: String, rendered: String },
    Failed(FailureReport),
}

impl Outcome {
    /// 面向用户的 markdown
    pub fn to_markdown(&self) -> String {
        match self {
            Outcome::Finalized { rendered, .. } => rendered.clone(),
            Outcome::Failed(report) => report.to_markdown(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Outcome::Finalized { .. })
    }
}

pub struct Orchestrator {
    transport: Arc<dyn ChatTransport>,
    dispatcher: Dispatcher,
    sink: Arc<dyn TranscriptSink>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: Dispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            sink: Arc::new(TracingSink),
            config,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 为一次用户输入创建新对话（Init）
    pub fn begin(&self, prompt: &str) -> Conversation {
        Conversation::new(self.config.system_prompt.clone(), prompt)
    }

    /// 执行一次状态转移；终态下为空操作
    pub async fn step(&self, conv: &mut Conversation) {
        let pending = match conv.phase() {
            Phase::Init => {
                conv.seed();
                conv.set_phase(Phase::AwaitingModel);
                return;
            }
            Phase::AwaitingModel => None,
            Phase::Dispatching { calls } => Some(calls.clone()),
            Phase::Finalized { .. } | Phase::Failed { .. } => return,
        };
        match pending {
            None => self.await_model(conv).await,
            Some(calls) => self.dispatch(conv, calls).await,
        }
    }

    /// 一直 step 到终态
    pub async fn drive(&self, conv: &mut Conversation) -> Outcome {
        loop {
            match conv.phase() {
                Phase::Finalized { answer } => {
                    return Outcome::Finalized {
                        answer: answer.clone(),
                        rendered: render_answer(conv.prompt(), answer),
                    }
                }
                Phase::Failed { report } => return Outcome::Failed(report.clone()),
                _ => self.step(conv).await,
            }
        }
    }

    /// begin + drive
    pub async fn run(&self, prompt: &str) -> Outcome {
        let mut conv = self.begin(prompt);
        self.drive(&mut conv).await
    }

    async fn await_model(&self, conv: &mut Conversation) {
        if conv.turn() >= self.config.max_turns {
            self.fail(conv, ConversationError::TurnLimitExceeded(self.config.max_turns));
            return;
        }
        let turn = conv.next_turn();

        let request = ChatRequest {
            messages: conv.messages().to_vec(),
            tools: self.dispatcher.registry().tool_catalog().to_vec(),
            tool_choice: ToolChoice::Auto,
        };
        self.sink.on_request(turn, &request.to_payload());

        let secs = self.config.request_timeout_secs;
        let result = match timeout(Duration::from_secs(secs), self.transport.complete(&request)).await {
            Ok(r) => r,
            Err(_) => Err(TransportError::Timeout(secs)),
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.fail(conv, e.into());
                return;
            }
        };
        self.sink.on_response(turn, &response.raw);

        match response.message.requested_calls() {
            Some(calls) => {
                let calls = calls.to_vec();
                tracing::info!(turn, calls = calls.len(), "model requested actions");
                if !conv.append_tool_request(response.message.clone()) {
                    tracing::debug!(turn, "identical tool-call message already in history");
                }
                conv.set_phase(Phase::Dispatching { calls });
            }
            None => {
                let answer = response.message.content_str().to_string();
                self.sink.on_finalized(turn, &render_answer(conv.prompt(), &answer));
                conv.set_phase(Phase::Finalized { answer });
            }
        }
    }

    async fn dispatch(&self, conv: &mut Conversation, calls: Vec<ToolCall>) {
        let turn = conv.turn();
        let outcomes: Vec<DispatchOutcome> = if self.config.parallel_dispatch {
            join_all(calls.iter().map(|call| self.dispatcher.dispatch(call))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in &calls {
                outcomes.push(self.dispatcher.dispatch(call).await);
            }
            outcomes
        };

        let batch = calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| {
                self.sink.on_dispatch(turn, call, &outcome.value);
                Message::tool_result(call.id.clone(), &outcome.value)
            })
            .collect();
        conv.append_batch(batch);
        conv.set_phase(Phase::AwaitingModel);
    }

    fn fail(&self, conv: &mut Conversation, error: ConversationError) {
        let report = FailureReport {
            prompt: conv.prompt().to_string(),
            error: error.to_string(),
            turn: conv.turn(),
            history: conv.messages().to_vec(),
            artifacts: self.sink.artifact_refs(conv.turn()),
        };
        self.sink.on_failed(&report);
        conv.set_phase(Phase::Failed { report });
    }
}
