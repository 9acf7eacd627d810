//! UI 会话任务
//!
//! 在后台任务中消费用户命令（Submit/Clear/Quit），每次 Submit 新建一段对话，
//! 逐步 step 并把每次转移后的投影发到 state 通道。对话进行中输入被锁定。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::core::{Orchestrator, UiState};

/// 从 UI 发往会话任务的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 提交用户输入，开始一段新对话
    Submit(String),
    /// 清空正文
    Clear,
    Quit,
}

/// 启动会话任务：返回命令发送端与状态接收端
pub fn spawn_session(
    orchestrator: Arc<Orchestrator>,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState::default());

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Submit(input) => {
                    let mut conv = orchestrator.begin(&input);
                    loop {
                        let _ = state_tx.send(conv.project());
                        if conv.is_terminal() {
                            break;
                        }
                        orchestrator.step(&mut conv).await;
                    }
                }
                Command::Clear => {
                    let _ = state_tx.send(UiState::default());
                }
                Command::Quit => break,
            }
        }
        tracing::debug!("session task stopped");
    });

    (cmd_tx, state_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionRegistry, Dispatcher};
    use crate::core::{OrchestratorConfig, PhaseLabel};
    use crate::llm::ScriptedTransport;

    #[tokio::test]
    async fn test_submit_reaches_terminal_projection() {
        let transport = Arc::new(ScriptedTransport::new().reply_text("all good"));
        let registry = Arc::new(ActionRegistry::build(Vec::new()).unwrap());
        let orch = Orchestrator::new(
            transport,
            Dispatcher::new(registry, 1),
            OrchestratorConfig::default(),
        );
        let (cmd_tx, mut state_rx) = spawn_session(Arc::new(orch));

        cmd_tx.send(Command::Submit("status?".into())).unwrap();
        loop {
            state_rx.changed().await.unwrap();
            let state = state_rx.borrow().clone();
            if state.phase == PhaseLabel::Finalized {
                assert!(!state.input_locked);
                assert!(state.body.contains("all good"));
                break;
            }
        }

        cmd_tx.send(Command::Clear).unwrap();
        state_rx.changed().await.unwrap();
        assert_eq!(state_rx.borrow().phase, PhaseLabel::Idle);
        cmd_tx.send(Command::Quit).unwrap();
    }
}
