use std::path::PathBuf;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;
use crate::app::{App, AppStatus, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            if app.is_busy() {
                app.tick_animation();
            }
        }
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::EditingContext => handle_context_editing(app, key),
        InputMode::EditingPath => handle_path_editing(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,

        // Upload / replace asset
        KeyCode::Char('o') => {
            app.path_input.clear();
            app.input_mode = InputMode::EditingPath;
        }

        // Drafting context
        KeyCode::Char('e') | KeyCode::Char('i') | KeyCode::Tab => {
            if app.selected_image.is_some() {
                app.context.end();
                app.input_mode = InputMode::EditingContext;
            }
        }

        // Generate
        KeyCode::Char('g') | KeyCode::Enter => {
            if app.is_empty_workspace() {
                app.path_input.clear();
                app.input_mode = InputMode::EditingPath;
            } else {
                app.submit();
            }
        }

        // Export
        KeyCode::Char('s') => {
            if app.result.is_some() {
                app.export_to_default_dir();
            }
        }

        // Reset workspace
        KeyCode::Char('r') => {
            if !app.is_empty_workspace() {
                app.reset();
            }
        }

        _ => {}
    }
}

fn handle_context_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            app.submit();
        }
        KeyCode::Backspace => app.context.backspace(),
        KeyCode::Delete => app.context.delete(),
        KeyCode::Left => app.context.left(),
        KeyCode::Right => app.context.right(),
        KeyCode::Home => app.context.home(),
        KeyCode::End => app.context.end(),
        KeyCode::Char(c) => app.context.insert(c),
        _ => {}
    }
}

fn handle_path_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.path_input.clear();
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            if let Some(path) = parse_path(&app.path_input.text) {
                app.begin_upload(path);
            }
            app.path_input.clear();
        }
        KeyCode::Backspace => app.path_input.backspace(),
        KeyCode::Delete => app.path_input.delete(),
        KeyCode::Left => app.path_input.left(),
        KeyCode::Right => app.path_input.right(),
        KeyCode::Home => app.path_input.home(),
        KeyCode::End => app.path_input.end(),
        KeyCode::Char(c) => app.path_input.insert(c),
        _ => {}
    }
}

/// Pasted text; in normal mode a pasted path (drag and drop) opens the file.
fn handle_paste(app: &mut App, text: &str) {
    match app.input_mode {
        InputMode::EditingContext => app.context.insert_str(text),
        InputMode::EditingPath => app.path_input.insert_str(text),
        InputMode::Normal => {
            if let Some(path) = parse_path(text) {
                debug!(path = %path.display(), "path dropped onto workspace");
                app.begin_upload(path);
            }
        }
    }
}

/// Turns typed or dropped text into a path: trims quotes, expands `~`,
/// and undoes `file://` URLs.
pub fn parse_path(input: &str) -> Option<PathBuf> {
    let trimmed = input.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(trimmed);
    let raw = unquoted.strip_prefix("file://").unwrap_or(unquoted);

    if raw.is_empty() {
        return None;
    }

    // Terminals escape spaces in dropped paths
    let raw = raw.replace("\\ ", " ");

    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Some(home.join(rest));
        }
    }
    Some(PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::gemini::DrawingGenerator;
    use async_trait::async_trait;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl DrawingGenerator for Echo {
        async fn generate(&self, image: &str, mime: &str, _context: &str) -> error::Result<Option<String>> {
            Ok(Some(format!("data:{mime};base64,{image}")))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn app() -> App {
        App::new(Arc::new(Echo), PathBuf::from("."))
    }

    fn loaded_app() -> App {
        let mut app = app();
        app.finish_upload(crate::data_uri::SourceImage {
            data_uri: "data:image/png;base64,AAA".into(),
            file_name: "a.png".into(),
            byte_len: 3,
        });
        app
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("  /tmp/a.png "), Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(parse_path("'/tmp/my chair.png'"), Some(PathBuf::from("/tmp/my chair.png")));
        assert_eq!(parse_path("/tmp/my\\ chair.png"), Some(PathBuf::from("/tmp/my chair.png")));
        assert_eq!(parse_path("file:///tmp/a.png"), Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(parse_path("   "), None);
        assert_eq!(parse_path("\"\""), None);
    }

    #[tokio::test]
    async fn test_typing_context_then_enter_submits() {
        let mut app = loaded_app();

        handle_event(&mut app, key(KeyCode::Char('e'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::EditingContext);
        for c in "red chair".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).await.unwrap();
        }
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.context.text, "red chair");
        assert!(matches!(app.status, AppStatus::Generating | AppStatus::Success));

        app.wait_for_tasks().await;
        assert_eq!(app.result.as_ref().unwrap().prompt, "red chair");
    }

    #[tokio::test]
    async fn test_context_editing_needs_an_image() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('e'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_generate_on_empty_workspace_opens_picker() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('g'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::EditingPath);
        assert_eq!(app.status, AppStatus::Idle);
    }

    #[tokio::test]
    async fn test_escape_cancels_path_entry() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('o'))).await.unwrap();
        handle_event(&mut app, AppEvent::Paste("/tmp/x.png".into())).await.unwrap();
        assert_eq!(app.path_input.text, "/tmp/x.png");
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();

        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.path_input.text.is_empty());
        assert_eq!(app.status, AppStatus::Idle);
    }

    #[tokio::test]
    async fn test_reset_key_clears_workspace() {
        let mut app = loaded_app();
        app.context.insert_str("lamp");
        handle_event(&mut app, key(KeyCode::Char('r'))).await.unwrap();

        assert!(app.is_empty_workspace());
        assert!(app.context.text.is_empty());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_while_editing() {
        let mut app = loaded_app();
        app.input_mode = InputMode::EditingContext;
        let event = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, event).await.unwrap();
        assert!(app.should_quit);
        assert!(app.context.text.is_empty());
    }
}
