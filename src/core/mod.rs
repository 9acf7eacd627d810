//! 核心层：错误分类、对话状态、编排状态机、UI 会话任务

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use error::{
    ActionError, ConversationError, RegistryError, SchemaCompileError, TransportError,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Outcome, DEFAULT_SYSTEM_PROMPT};
pub use session::{spawn_session, Command};
pub use state::{Conversation, Phase, PhaseLabel, UiState};
