use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, ChatRole, InputMode, OutputTone};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat log, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_settings {
        render_settings_popup(app, frame, area);
    } else if app.show_code_modal {
        render_code_modal(app, frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Pocket AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Chat ");
    let inner = block.inner(area);

    // Remember the chat viewport so scroll-to-bottom can do wrap math
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let mut lines: Vec<Line> = Vec::new();

    for msg in &app.chat_messages {
        let role_line = match msg.role {
            ChatRole::User => Line::from(Span::styled(
                "You",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            ChatRole::System => Line::from(Span::styled(
                "Pocket AI",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
        };
        lines.push(role_line);

        for content_line in msg.content.lines() {
            lines.push(Line::from(content_line.to_string()));
        }
        lines.push(Line::default());
    }

    // Transient indicator while a request is in flight
    if app.waiting_for_response {
        lines.push(Line::from(Span::styled(
            "Pocket AI",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{dots}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let border_style = match app.input_mode {
        InputMode::Editing => Style::default().fg(Color::Yellow),
        InputMode::Normal => Style::default(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(" Task ");
    let inner = block.inner(area);

    // Keep the cursor visible on long input by scrolling horizontally
    let visible_width = inner.width.saturating_sub(1) as usize;
    let scroll = app.chat_cursor.saturating_sub(visible_width);

    let input = Paragraph::new(app.chat_input.as_str())
        .block(block)
        .scroll((0, scroll as u16));
    frame.render_widget(input, area);

    if app.input_mode == InputMode::Editing && !app.show_settings && !app.show_code_modal {
        let cursor_x = inner.x + (app.chat_cursor - scroll) as u16;
        frame.set_cursor_position((cursor_x.min(inner.x + inner.width), inner.y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.show_settings {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else if app.show_code_modal {
        vec![
            Span::styled(" Ctrl+R ", key_style),
            Span::styled(" run ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" language ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" keys ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" c ", key_style),
                Span::styled(" code ", label_style),
                Span::styled(" b/s/a ", key_style),
                Span::styled(" tools ", label_style),
                Span::styled(" S ", key_style),
                Span::styled(" settings ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_settings_popup(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask the key, showing only the last 4 characters
    let char_count = app.settings_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let tail: String = app.settings_input.chars().skip(char_count - 4).collect();
        format!("{}{}", "*".repeat(char_count - 4), tail)
    };

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(Paragraph::new(display_text), input_area);

    let cursor_x = input_area.x + (app.settings_cursor as u16).min(input_area.width);
    frame.set_cursor_position((cursor_x, input_area.y));
}

fn render_code_modal(app: &App, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(8).min(100);
    let popup_height = area.height.saturating_sub(4).min(30);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Run Code ({}) ", app.language.display_name()));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [editor_area, output_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(8),
    ])
    .areas(inner);

    let editor = Paragraph::new(app.code_input.as_str())
        .block(Block::default().borders(Borders::ALL).title(" Editor "));
    frame.render_widget(editor, editor_area);

    let output_style = match app.output_tone {
        OutputTone::Normal => Style::default(),
        OutputTone::Error => Style::default().fg(Color::Red),
    };
    let output = Paragraph::new(app.code_output.as_str())
        .style(output_style)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Output "));
    frame.render_widget(output, output_area);

    // Place the cursor inside the editor at the logical position
    let before_cursor: String = app.code_input.chars().take(app.code_cursor).collect();
    let row = before_cursor.matches('\n').count() as u16;
    let col = before_cursor
        .rsplit('\n')
        .next()
        .map(|line| line.chars().count())
        .unwrap_or(0) as u16;

    let editor_inner = Rect::new(
        editor_area.x + 1,
        editor_area.y + 1,
        editor_area.width.saturating_sub(2),
        editor_area.height.saturating_sub(2),
    );
    if row < editor_inner.height {
        frame.set_cursor_position((
            (editor_inner.x + col).min(editor_inner.x + editor_inner.width),
            editor_inner.y + row,
        ));
    }
}
