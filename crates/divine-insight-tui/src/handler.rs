use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use divine_insight_core::{AnnotationKind, PanelKey};

use crate::app::{App, EditTarget, FocusPane, InputMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Flow(completion) => app.on_flow_completed(completion),
    }
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
        InputMode::Editing(_) => handle_editing_mode(app, key),
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        // Escape closes the open panel, otherwise drops the selection
        KeyCode::Esc => {
            if app.panels.is_open() {
                app.close_panel();
            } else if app.notice.is_some() {
                app.dismiss_notice();
            } else {
                app.clear_selection();
            }
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Books => FocusPane::Verses,
                FocusPane::Verses if app.panels.is_open() => FocusPane::Panel,
                FocusPane::Verses | FocusPane::Panel => FocusPane::Books,
            };
        }

        // Chapter stepping and panel openers work from every pane
        KeyCode::Char(']') => app.next_chapter(),
        KeyCode::Char('[') => app.prev_chapter(),
        KeyCode::Char('/') if app.focus != FocusPane::Panel || app.panels.key() != Some(PanelKey::Library) => {
            app.begin_editing(EditTarget::Search, "");
        }
        KeyCode::Char('m') => app.open_annotations(AnnotationKind::Bookmark),
        KeyCode::Char('L') => app.open_library(),
        KeyCode::Char('s') => app.summarize_chapter(),
        KeyCode::Char('R') => app.retry(),
        KeyCode::Char('?') => app.begin_question(),

        _ => match app.focus {
            FocusPane::Books => handle_books(app, key),
            FocusPane::Verses => handle_verses(app, key),
            FocusPane::Panel => handle_panel(app, key),
        },
    }
}

fn handle_books(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.book_down(),
        KeyCode::Char('k') | KeyCode::Up => app.book_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.open_highlighted_book(),
        _ => {}
    }
}

fn handle_verses(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => app.cursor_up(),
        KeyCode::Char('g') => app.cursor_first(),
        KeyCode::Char('G') => app.cursor_last(),
        KeyCode::Left => app.focus = FocusPane::Books,

        // Plain select replaces, `v` adds to the selection
        KeyCode::Enter | KeyCode::Char(' ') => app.select_cursor_verse(false),
        KeyCode::Char('v') => app.select_cursor_verse(true),

        // Annotations
        KeyCode::Char('b') => app.toggle_bookmark(),
        KeyCode::Char('h') => app.highlight(),
        KeyCode::Char('H') => app.clear_highlight(),
        KeyCode::Char('c') => app.cycle_highlight_color(),
        KeyCode::Char('n') => app.begin_note(),

        // AI
        KeyCode::Char('a') => app.explain_selection(),
        KeyCode::Char('r') => app.cross_reference(),
        _ => {}
    }
}

fn handle_panel(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.panel_down(),
        KeyCode::Char('k') | KeyCode::Up => app.panel_up(),
        KeyCode::Enter => app.open_panel_entry(),
        KeyCode::Left => app.focus = FocusPane::Verses,
        _ => {}
    }

    match (app.panels.key(), key.code) {
        (Some(PanelKey::Annotations), KeyCode::Char('1')) => app.set_annotation_tab(AnnotationKind::Bookmark),
        (Some(PanelKey::Annotations), KeyCode::Char('2')) => app.set_annotation_tab(AnnotationKind::Highlight),
        (Some(PanelKey::Annotations), KeyCode::Char('3')) => app.set_annotation_tab(AnnotationKind::Note),
        (Some(PanelKey::Annotations), KeyCode::Char('e')) => app.edit_panel_entry(),
        (Some(PanelKey::Annotations), KeyCode::Char('d')) => app.delete_panel_entry(),
        (Some(PanelKey::Library), KeyCode::Char('/')) => app.begin_library_filter(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use divine_insight_core::{
        AnnotationSlot, AnnotationStore, Config, Corpus, FlowGateway, MemorySlot, PersistencePolicy,
        Provider, UnconfiguredGateway,
    };
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let slot: Box<dyn AnnotationSlot> = Box::new(MemorySlot::new());
        let store = AnnotationStore::load(slot, PersistencePolicy::BestEffort);
        let gateway: Arc<dyn FlowGateway> = Arc::new(UnconfiguredGateway::new(Provider::Ollama));
        App::new(&Config::default(), Corpus::kjv(), store, gateway, tx)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_escape_closes_panel_then_clears_selection() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.panels.key(), Some(PanelKey::Library));

        press(&mut app, KeyCode::Esc);
        assert!(!app.panels.is_open());
        assert_eq!(app.reader.selection().len(), 1);

        app.dismiss_notice();
        press(&mut app, KeyCode::Esc);
        assert!(app.reader.selection().is_empty());
    }

    #[tokio::test]
    async fn test_additive_selection_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('v'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('v'));
        assert_eq!(app.reader.selection().len(), 2);

        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.reader.selection().len(), 1);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.reader.selection().is_empty());
    }

    #[tokio::test]
    async fn test_search_prompt_navigates_by_reference() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "Exodus 1");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.reader.title(), "Exodus 1");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_escape_cancels_input_without_closing_panel() {
        let mut app = app();
        press(&mut app, KeyCode::Char('L'));
        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.input_mode, InputMode::Editing(EditTarget::LibraryFilter));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.panels.key(), Some(PanelKey::Library));
    }

    #[tokio::test]
    async fn test_annotation_tabs() {
        let mut app = app();
        press(&mut app, KeyCode::Char('b'));
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.panel_entries().len(), 1);

        press(&mut app, KeyCode::Char('3'));
        assert!(app.panel_entries().is_empty());
        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char('d'));
        assert!(app.store.is_empty());
    }
}
