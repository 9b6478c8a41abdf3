use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, InputMode, Tool};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Popups capture the keyboard while open
    if app.show_settings {
        handle_settings_key(app, key);
        return Ok(());
    }
    if app.show_code_modal {
        handle_code_modal_key(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_settings_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.close_settings();
        }
        KeyCode::Enter => {
            // Empty keys are rejected and leave the popup open
            if app.save_api_key() {
                let _ = app.config.save();
            }
        }
        KeyCode::Backspace => {
            if app.settings_cursor > 0 {
                app.settings_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.settings_input, app.settings_cursor);
                app.settings_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.settings_cursor = app.settings_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.settings_input.chars().count();
            app.settings_cursor = (app.settings_cursor + 1).min(char_count);
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.settings_input, app.settings_cursor);
            app.settings_input.insert(byte_pos, c);
            app.settings_cursor += 1;
        }
        _ => {}
    }
}

fn handle_code_modal_key(app: &mut App, key: KeyEvent) {
    // Ctrl+R runs the editor content; overlapping runs are allowed
    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
        if let Some((code, language)) = app.start_code_run() {
            let client = app.client.clone();
            let results = app.code_results_sender();
            tokio::spawn(async move {
                let outcome = client.execute_code(&code, language.as_str()).await;
                let _ = results.send(outcome);
            });
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.close_code_modal();
        }
        KeyCode::Tab => {
            app.language = app.language.next();
        }
        KeyCode::Enter => {
            let byte_pos = char_to_byte_index(&app.code_input, app.code_cursor);
            app.code_input.insert(byte_pos, '\n');
            app.code_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.code_cursor > 0 {
                app.code_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.code_input, app.code_cursor);
                app.code_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.code_input.chars().count();
            if app.code_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.code_input, app.code_cursor);
                app.code_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.code_cursor = app.code_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.code_input.chars().count();
            app.code_cursor = (app.code_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.code_cursor = 0;
        }
        KeyCode::End => {
            app.code_cursor = app.code_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.code_input, app.code_cursor);
            app.code_input.insert(byte_pos, c);
            app.code_cursor += 1;
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Tool shortcuts route through the identifier dispatcher
    let tool_id = match key.code {
        KeyCode::Char('c') => Some("code"),
        KeyCode::Char('b') => Some("browser"),
        KeyCode::Char('s') => Some("search"),
        KeyCode::Char('a') => Some("analyze"),
        _ => None,
    };
    if let Some(id) = tool_id {
        if let Some(tool) = Tool::from_id(id) {
            app.dispatch_tool(tool);
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Settings popup
        KeyCode::Char('S') => app.open_settings(),

        // Back to the input line
        KeyCode::Char('i') | KeyCode::Tab | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            // No-op while empty or a request is already in flight
            if let Some(task) = app.send_message() {
                let client = app.client.clone();
                let api_key = app.api_key.clone();
                app.agent_task = Some(tokio::spawn(async move {
                    client.run_task(&task, &api_key).await
                }));
            }
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_to_byte_index_handles_multibyte_text() {
        let s = "ポケットAI";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 3);
        assert_eq!(char_to_byte_index(s, 4), 12);
        assert_eq!(char_to_byte_index(s, 99), s.len());
    }
}
