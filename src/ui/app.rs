//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx、调试通道与键盘事件，将用户输入与快捷键转为 Command 发送给会话任务，
//! 每帧用 draw 渲染 UiState 与输入缓冲。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::core::{Command, UiState};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::draw;

/// 调试面板保留的最大行数
const MAX_DEBUG_LINES: usize = 2000;

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
///
/// `debug_rx` 为 None 时不显示调试面板。
pub async fn run_app(
    state_rx: watch::Receiver<UiState>,
    mut debug_rx: Option<mpsc::UnboundedReceiver<String>>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(cmd_tx);
    let mut input_buffer = String::new();
    let mut body_scroll = 0usize;
    let mut last_body_len = 0usize;
    let mut debug_lines: Vec<String> = Vec::new();

    loop {
        let state = state_rx.borrow().clone();

        // 新正文回到顶部
        if state.body.len() != last_body_len {
            last_body_len = state.body.len();
            body_scroll = 0;
        }

        if let Some(rx) = debug_rx.as_mut() {
            while let Ok(line) = rx.try_recv() {
                debug_lines.push(line);
            }
            if debug_lines.len() > MAX_DEBUG_LINES {
                let excess = debug_lines.len() - MAX_DEBUG_LINES;
                debug_lines.drain(..excess);
            }
        }

        if let Some(ev) = event_handler.poll()? {
            match ev {
                AppEvent::Command(Command::Quit) => break,
                AppEvent::Command(_) => {}
                AppEvent::Key(key) => match key.code {
                    KeyCode::Enter if !state.input_locked => {
                        let input = input_buffer.trim().to_string();
                        input_buffer.clear();
                        if !input.is_empty() {
                            if matches!(input.to_lowercase().as_str(), "/exit" | "exit" | "/quit" | "quit") {
                                break;
                            }
                            event_handler.send_submit(input);
                        }
                    }
                    KeyCode::Backspace => {
                        input_buffer.pop();
                    }
                    KeyCode::Char(c) => input_buffer.push(c),
                    KeyCode::Up => body_scroll = body_scroll.saturating_sub(1),
                    KeyCode::Down => body_scroll = body_scroll.saturating_add(1),
                    KeyCode::PageUp => body_scroll = body_scroll.saturating_sub(10),
                    KeyCode::PageDown => body_scroll = body_scroll.saturating_add(10),
                    KeyCode::Home => body_scroll = 0,
                    KeyCode::End => body_scroll = usize::MAX,
                    _ => {}
                },
            }
        }

        let mut scroll_info = (0usize, 0usize);
        let debug_view = debug_rx.as_ref().map(|_| debug_lines.as_slice());
        terminal.draw(|f| {
            draw(f, &state, &input_buffer, body_scroll, debug_view, &mut scroll_info);
        })?;
        let (total_lines, viewport_height) = scroll_info;
        body_scroll = body_scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }

    restore_terminal(&mut terminal)?;
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
