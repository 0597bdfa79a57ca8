use std::collections::VecDeque;
use std::sync::Arc;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::{debug, info};

use divine_insight_core::annotations::HIGHLIGHT_COLORS;
use divine_insight_core::panel::run_dispatch;
use divine_insight_core::{
    AiMode, AnnotationError, AnnotationKind, AnnotationSlot, AnnotationStore, Completion, Config,
    Corpus, Dispatch, FlowGateway, FlowResponse, FlowStatus, Lexicon, Notice, PanelCoordinator,
    PanelPayload, Reader, Verse, VerseRef,
};

use crate::tui::AppEvent;

pub type Store = AnnotationStore<Box<dyn AnnotationSlot>>;

const NOTICE_TICKS: u16 = 12;
const LOCAL_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Books,
    Verses,
    Panel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing(EditTarget),
}

/// What the input line is being used for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    Search,
    NewNote(VerseRef),
    EditNote(String),
    Question,
    LibraryFilter,
}

impl EditTarget {
    pub fn prompt(&self) -> String {
        match self {
            EditTarget::Search => "Search (keyword or reference)".to_string(),
            EditTarget::NewNote(verse) => format!("Note for {}", verse),
            EditTarget::EditNote(_) => "Edit note".to_string(),
            EditTarget::Question => "Ask about the verse(s)".to_string(),
            EditTarget::LibraryFilter => "Filter lexicon".to_string(),
        }
    }
}

/// A row in a panel list that can be jumped to
#[derive(Debug, Clone, PartialEq)]
pub struct PanelEntry {
    pub reference: VerseRef,
    pub text: String,
    pub detail: Option<String>,
    pub annotation_id: Option<String>,
    pub kind: Option<AnnotationKind>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn color_name(color: &str) -> &'static str {
    HIGHLIGHT_COLORS
        .iter()
        .find(|(_, c)| *c == color)
        .map(|(name, _)| *name)
        .unwrap_or("Custom")
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub input: String,
    pub input_cursor: usize,
    pub focus: FocusPane,

    pub corpus: Corpus,
    pub store: Store,
    pub reader: Reader,
    pub panels: PanelCoordinator,
    pub lexicon: Lexicon,

    pub book_state: ListState,
    pub verse_cursor: usize,
    pub panel_state: ListState,
    pub highlight_color: usize,
    pub local_results: Vec<VerseRef>,

    pub notice: Option<Notice>,
    queued_notices: VecDeque<Notice>,
    notice_ticks: u16,
    pub animation_frame: usize,

    gateway: Arc<dyn FlowGateway>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        config: &Config,
        corpus: Corpus,
        store: Store,
        gateway: Arc<dyn FlowGateway>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let reader = Reader::new(&corpus);
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            input_cursor: 0,
            focus: FocusPane::Verses,

            corpus,
            store,
            reader,
            panels: PanelCoordinator::new(config.navigation),
            lexicon: Lexicon::builtin(),

            book_state: ListState::default(),
            verse_cursor: 0,
            panel_state: ListState::default(),
            highlight_color: 0,
            local_results: Vec::new(),

            notice: None,
            queued_notices: VecDeque::new(),
            notice_ticks: 0,
            animation_frame: 0,

            gateway,
            events,
        };
        app.sync_book_state();
        app.absorb_notices();
        app
    }

    // Notices

    /// Shown right away, or after the current notice expires
    pub fn show_notice(&mut self, notice: Notice) {
        if self.notice.is_some() {
            self.queued_notices.push_back(notice);
        } else {
            self.notice = Some(notice);
            self.notice_ticks = NOTICE_TICKS;
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = self.queued_notices.pop_front();
        self.notice_ticks = NOTICE_TICKS;
    }

    fn absorb_notices(&mut self) {
        for notice in self.store.take_notices() {
            self.show_notice(notice);
        }
    }

    pub fn tick(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 4;
        if self.notice.is_some() {
            self.notice_ticks = self.notice_ticks.saturating_sub(1);
            if self.notice_ticks == 0 {
                self.dismiss_notice();
            }
        }
    }

    // Reader

    pub fn verses(&self) -> &[Verse] {
        self.reader.verses(&self.corpus)
    }

    pub fn cursor_verse(&self) -> Option<&Verse> {
        self.verses().get(self.verse_cursor)
    }

    /// Selected verses, or the verse under the cursor when nothing is selected
    pub fn target_verses(&self) -> Vec<Verse> {
        let selected = self.reader.selected_verses(&self.corpus);
        if selected.is_empty() {
            self.cursor_verse().cloned().into_iter().collect()
        } else {
            selected.into_iter().cloned().collect()
        }
    }

    fn sync_book_state(&mut self) {
        let idx = self
            .corpus
            .books()
            .iter()
            .position(|b| b.name == self.reader.book());
        self.book_state.select(idx.or(Some(0)));
    }

    /// Common tail of every reader move
    fn after_navigate(&mut self) {
        self.sync_book_state();
        self.verse_cursor = self
            .reader
            .selection()
            .verses()
            .first()
            .and_then(|sel| self.verses().iter().position(|v| v.is(sel)))
            .unwrap_or(0);
        if self.panels.on_navigate() {
            self.panel_state.select(None);
            if self.focus == FocusPane::Panel {
                self.focus = FocusPane::Verses;
            }
        }
    }

    pub fn book_down(&mut self) {
        let len = self.corpus.books().len();
        if len > 0 {
            let i = self.book_state.selected().unwrap_or(0);
            self.book_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn book_up(&mut self) {
        let i = self.book_state.selected().unwrap_or(0);
        self.book_state.select(Some(i.saturating_sub(1)));
    }

    pub fn open_highlighted_book(&mut self) {
        let Some(name) = self
            .book_state
            .selected()
            .and_then(|i| self.corpus.books().get(i))
            .map(|b| b.name.clone())
        else {
            return;
        };
        if self.reader.select_book(&self.corpus, &name) {
            self.after_navigate();
            self.focus = FocusPane::Verses;
        }
    }

    pub fn next_chapter(&mut self) {
        if self.reader.next_chapter(&self.corpus) {
            self.after_navigate();
        }
    }

    pub fn prev_chapter(&mut self) {
        if self.reader.prev_chapter(&self.corpus) {
            self.after_navigate();
        }
    }

    pub fn cursor_down(&mut self) {
        let len = self.verses().len();
        if len > 0 {
            self.verse_cursor = (self.verse_cursor + 1).min(len - 1);
        }
    }

    pub fn cursor_up(&mut self) {
        self.verse_cursor = self.verse_cursor.saturating_sub(1);
    }

    pub fn cursor_first(&mut self) {
        self.verse_cursor = 0;
    }

    pub fn cursor_last(&mut self) {
        self.verse_cursor = self.verses().len().saturating_sub(1);
    }

    pub fn select_cursor_verse(&mut self, additive: bool) {
        if let Some(verse) = self.cursor_verse().map(Verse::reference) {
            self.reader.select(verse, additive);
        }
    }

    pub fn clear_selection(&mut self) {
        self.reader.clear_selection();
    }

    // Annotations

    fn report(&mut self, result: Result<(), AnnotationError>) {
        if let Err(err) = result {
            debug!(error = %err, validation = err.is_validation(), "annotation action rejected");
        }
        self.absorb_notices();
    }

    pub fn toggle_bookmark(&mut self) {
        for verse in self.target_verses() {
            let result = self.store.toggle_bookmark(&verse.reference()).map(|_| ());
            self.report(result);
        }
    }

    pub fn highlight(&mut self) {
        let color = HIGHLIGHT_COLORS[self.highlight_color].1;
        for verse in self.target_verses() {
            let result = self.store.set_highlight(&verse.reference(), color).map(|_| ());
            self.report(result);
        }
    }

    pub fn clear_highlight(&mut self) {
        for verse in self.target_verses() {
            let result = self.store.clear_highlight(&verse.reference()).map(|_| ());
            self.report(result);
        }
    }

    pub fn cycle_highlight_color(&mut self) {
        self.highlight_color = (self.highlight_color + 1) % HIGHLIGHT_COLORS.len();
    }

    pub fn begin_note(&mut self) {
        if let Some(verse) = self.target_verses().first().map(Verse::reference) {
            self.begin_editing(EditTarget::NewNote(verse), "");
        }
    }

    // Panels

    fn dispatch(&self, dispatch: Option<Dispatch>) {
        let Some(dispatch) = dispatch else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let completion = run_dispatch(gateway.as_ref(), dispatch).await;
            let _ = tx.send(AppEvent::Flow(completion));
        });
    }

    fn opened_panel(&mut self, dispatch: Option<Dispatch>) {
        self.panel_state.select(None);
        self.focus = FocusPane::Panel;
        self.dispatch(dispatch);
        self.reset_panel_cursor();
    }

    fn reset_panel_cursor(&mut self) {
        let first = (!self.panel_entries().is_empty()).then_some(0);
        self.panel_state.select(first);
    }

    pub fn explain_selection(&mut self) {
        let verses = self.target_verses();
        if verses.is_empty() {
            return;
        }
        let dispatch = self.panels.open_ai(AiMode::VerseExplanation {
            verses,
            question: None,
        });
        self.opened_panel(dispatch);
    }

    pub fn summarize_chapter(&mut self) {
        let Some(passage_text) = self.corpus.chapter_text(self.reader.book(), self.reader.chapter()) else {
            return;
        };
        let dispatch = self.panels.open_ai(AiMode::PassageSummary {
            title: self.reader.title(),
            passage_text,
        });
        self.opened_panel(dispatch);
    }

    /// Cross references for the single selected verse, else the cursor verse
    pub fn cross_reference(&mut self) {
        let selected = self.reader.selected_verses(&self.corpus);
        let verse = match selected.as_slice() {
            [only] => Some((*only).clone()),
            _ => self.cursor_verse().cloned(),
        };
        if let Some(verse) = verse {
            let dispatch = self.panels.open_ai(AiMode::CrossReference { verse });
            self.opened_panel(dispatch);
        }
    }

    pub fn open_annotations(&mut self, tab: AnnotationKind) {
        let dispatch = self.panels.open_annotations(tab);
        self.opened_panel(dispatch);
    }

    pub fn set_annotation_tab(&mut self, tab: AnnotationKind) {
        self.panels.set_annotation_tab(tab);
        self.reset_panel_cursor();
    }

    pub fn open_library(&mut self) {
        let dispatch = self.panels.open_library();
        self.opened_panel(dispatch);
    }

    pub fn close_panel(&mut self) {
        self.panels.close();
        self.panel_state.select(None);
        if self.focus == FocusPane::Panel {
            self.focus = FocusPane::Verses;
        }
    }

    pub fn retry(&mut self) {
        let dispatch = self.panels.retry();
        self.dispatch(dispatch);
    }

    pub fn on_flow_completed(&mut self, completion: Completion) {
        if self.panels.resolve(completion) {
            self.reset_panel_cursor();
        }
    }

    /// A typed reference navigates; anything else is a keyword search
    pub fn submit_search(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }

        if let Some(parsed) = self.corpus.parse_reference(term) {
            info!(term, "search term is a reference, navigating");
            let moved = match parsed.verse {
                Some(verse) => {
                    let target = VerseRef::new(parsed.book_name, parsed.chapter, verse);
                    self.reader.navigate_to(&self.corpus, &target);
                    true
                }
                None if self.corpus.find_chapter(&parsed.book_name, parsed.chapter).is_some() => {
                    self.reader.select_book(&self.corpus, &parsed.book_name);
                    self.reader.select_chapter(parsed.chapter);
                    true
                }
                None => false,
            };
            if moved {
                self.after_navigate();
                self.focus = FocusPane::Verses;
                return;
            }
        }

        self.local_results = self
            .corpus
            .search(term, LOCAL_SEARCH_LIMIT)
            .into_iter()
            .map(Verse::reference)
            .collect();
        let dispatch = self.panels.open_search(term);
        self.opened_panel(dispatch);
    }

    /// Navigable rows of the open panel, in display order
    pub fn panel_entries(&self) -> Vec<PanelEntry> {
        match self.panels.active() {
            Some(PanelPayload::Search { status, .. }) => {
                let mut entries: Vec<PanelEntry> = self
                    .local_results
                    .iter()
                    .filter_map(|r| self.corpus.resolve(r))
                    .map(|v| PanelEntry {
                        reference: v.reference(),
                        text: v.text.clone(),
                        detail: None,
                        annotation_id: None,
                        kind: None,
                    })
                    .collect();
                if let FlowStatus::Ready(FlowResponse::KeywordSearch(out)) = status {
                    entries.extend(out.verses.iter().map(|v| PanelEntry {
                        reference: v.reference(),
                        text: v.text.clone(),
                        detail: Some(format!("relevance {:.0}%", v.relevance_score * 100.0)),
                        annotation_id: None,
                        kind: None,
                    }));
                }
                entries
            }
            Some(PanelPayload::Ai {
                status: FlowStatus::Ready(FlowResponse::CrossReference(out)),
                ..
            }) => out
                .cross_references
                .iter()
                .map(|c| PanelEntry {
                    reference: c.reference(),
                    text: c.text.clone(),
                    detail: Some(c.connection.clone()),
                    annotation_id: None,
                    kind: None,
                })
                .collect(),
            Some(PanelPayload::Annotations { tab }) => self
                .store
                .find_by_kind(*tab)
                .into_iter()
                .map(|a| {
                    let reference = a.reference();
                    let text = self
                        .corpus
                        .resolve(&reference)
                        .map(|v| v.text.clone())
                        .unwrap_or_default();
                    let detail = match a.kind {
                        AnnotationKind::Note => a.note_text.clone(),
                        AnnotationKind::Highlight => a.color.as_deref().map(|c| color_name(c).to_string()),
                        AnnotationKind::Bookmark => None,
                    };
                    PanelEntry {
                        reference,
                        text,
                        detail,
                        annotation_id: Some(a.id.clone()),
                        kind: Some(a.kind),
                    }
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn selected_entry(&self) -> Option<PanelEntry> {
        let idx = self.panel_state.selected()?;
        self.panel_entries().into_iter().nth(idx)
    }

    pub fn panel_down(&mut self) {
        let len = self.panel_entries().len();
        if len > 0 {
            let i = self.panel_state.selected().unwrap_or(0);
            self.panel_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn panel_up(&mut self) {
        let i = self.panel_state.selected().unwrap_or(0);
        self.panel_state.select(Some(i.saturating_sub(1)));
    }

    /// Jump the reader to the highlighted panel row
    pub fn open_panel_entry(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        if !self.reader.navigate_to(&self.corpus, &entry.reference) {
            self.show_notice(Notice::info(
                "Verse not available",
                format!("{} is not part of this text.", entry.reference),
            ));
        }
        self.after_navigate();
    }

    pub fn delete_panel_entry(&mut self) {
        let Some(id) = self.selected_entry().and_then(|e| e.annotation_id) else {
            return;
        };
        let result = self.store.remove(&id).map(|_| ());
        self.report(result);

        let len = self.panel_entries().len();
        let clamped = self.panel_state.selected().map(|i| i.min(len.saturating_sub(1)));
        self.panel_state.select(if len == 0 { None } else { clamped });
    }

    pub fn edit_panel_entry(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        if let (Some(id), Some(AnnotationKind::Note)) = (entry.annotation_id, entry.kind) {
            let text = entry.detail.unwrap_or_default();
            self.begin_editing(EditTarget::EditNote(id), &text);
        }
    }

    // Input line

    pub fn begin_editing(&mut self, target: EditTarget, initial: &str) {
        self.input = initial.to_string();
        self.input_cursor = self.input.chars().count();
        self.input_mode = InputMode::Editing(target);
    }

    pub fn begin_question(&mut self) {
        if matches!(
            self.panels.active(),
            Some(PanelPayload::Ai { mode: AiMode::VerseExplanation { .. }, .. })
        ) {
            self.begin_editing(EditTarget::Question, "");
        }
    }

    pub fn begin_library_filter(&mut self) {
        if let Some(PanelPayload::Library { filter }) = self.panels.active() {
            let filter = filter.clone();
            self.begin_editing(EditTarget::LibraryFilter, &filter);
        }
    }

    pub fn cancel_input(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(idx, c);
        self.input_cursor += 1;
        self.input_changed();
    }

    pub fn delete_char(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let idx = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(idx);
            self.input_changed();
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    /// The library filter applies while typing
    fn input_changed(&mut self) {
        if self.input_mode == InputMode::Editing(EditTarget::LibraryFilter) {
            self.panels.set_library_filter(&self.input);
        }
    }

    pub fn submit_input(&mut self) {
        let InputMode::Editing(target) = std::mem::replace(&mut self.input_mode, InputMode::Normal) else {
            return;
        };
        let text = std::mem::take(&mut self.input);
        self.input_cursor = 0;

        match target {
            EditTarget::Search => self.submit_search(&text),
            EditTarget::NewNote(verse) => {
                let result = self.store.add_note(&verse, &text).map(|_| ());
                self.report(result);
            }
            EditTarget::EditNote(id) => {
                let result = self.store.update_note_text(&id, &text).map(|_| ());
                self.report(result);
            }
            EditTarget::Question => {
                let dispatch = self.panels.ask(&text);
                self.dispatch(dispatch);
            }
            EditTarget::LibraryFilter => self.panels.set_library_filter(&text),
        }
    }
}
