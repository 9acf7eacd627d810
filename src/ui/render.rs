//! 界面渲染
//!
//! 标题栏显示 phase；主体为 markdown 正文（最终回答或失败报告，按宽度换行），
//! 开启调试时右侧为调试面板（动作调用与结果）；底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{PhaseLabel, UiState};

/// 调试面板只显示最近的这些行
const DEBUG_TAIL_LINES: usize = 200;

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

/// markdown 行的简单着色：标题加粗、分隔线变暗
fn style_markdown(line: &str) -> Style {
    if line.starts_with('#') {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else if line == "---" {
        Style::default().fg(Color::DarkGray)
    } else if line.starts_with("- `") || line.starts_with("  - `") {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn markdown_lines(body: &str, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for raw in body.lines() {
        let style = style_markdown(raw);
        for piece in wrap_text(raw, width) {
            lines.push(Line::from(Span::styled(piece, style)));
        }
    }
    lines
}

fn phase_color(phase: PhaseLabel) -> Color {
    match phase {
        PhaseLabel::Idle | PhaseLabel::Finalized => Color::Yellow,
        PhaseLabel::AwaitingModel | PhaseLabel::Dispatching => Color::Magenta,
        PhaseLabel::Failed => Color::Red,
    }
}

fn draw_debug(f: &mut Frame, area: Rect, debug_lines: &[String]) {
    let width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let start = debug_lines.len().saturating_sub(DEBUG_TAIL_LINES);
    let mut lines: Vec<Line> = Vec::new();
    for entry in &debug_lines[start..] {
        for piece in wrap_text(entry, width.max(20)) {
            lines.push(Line::from(Span::styled(piece, Style::default().fg(Color::Gray))));
        }
    }
    let skip = lines.len().saturating_sub(height);
    let block = Block::default()
        .title(" Debug ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((skip as u16, 0));
    f.render_widget(paragraph, area);
}

/// 绘制一帧；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    state: &UiState,
    input_buffer: &str,
    body_scroll: usize,
    debug_lines: Option<&[String]>,
    out: &mut (usize, usize),
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());

    let body_area = match debug_lines {
        Some(lines) => {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[0]);
            draw_debug(f, cols[1], lines);
            cols[0]
        }
        None => chunks[0],
    };
    let content_width = body_area.width.saturating_sub(3) as usize; // 边框 + 滚动条

    let title = if state.turn > 0 {
        format!(" Geris │ {} │ turn {} ", state.phase.as_str(), state.turn)
    } else {
        format!(" Geris │ {} ", state.phase.as_str())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(phase_color(state.phase)));

    let text_lines = markdown_lines(&state.body, content_width.max(20));
    let content_height = body_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = body_scroll.min(max_scroll);

    let inner = block.inner(body_area);
    f.render_widget(block, body_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    let input_prompt = if state.input_locked {
        " Working… ".to_string()
    } else if let Some(err) = &state.error_message {
        format!(" Error: {} ", err.chars().take(48).collect::<String>())
    } else {
        " Ask ".to_string()
    };
    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter submit │ ↑↓ PgUp/PgDn scroll │ Ctrl+L clear │ Esc/Ctrl+Q quit ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .style(if state.input_locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        });
    f.render_widget(input, chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn test_wrap_text_keeps_blank_lines() {
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_markdown_styles() {
        assert!(style_markdown("# Prompt").add_modifier.contains(Modifier::BOLD));
        assert_eq!(style_markdown("---").fg, Some(Color::DarkGray));
        assert_eq!(style_markdown("plain").fg, None);
    }

    #[test]
    fn test_draw_reports_line_counts() {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        let state = UiState {
            body: "# Prompt\n- `Input`: **hi**\n# Response\nhello".into(),
            phase: PhaseLabel::Finalized,
            ..UiState::default()
        };
        let debug = vec!["12:00:00 :: Tool: list_labels - Args: {}".to_string()];
        let mut out = (0, 0);
        terminal
            .draw(|f| draw(f, &state, "", 0, Some(&debug), &mut out))
            .unwrap();
        assert_eq!(out.0, 4);
        assert_eq!(out.1, 15);
    }
}
