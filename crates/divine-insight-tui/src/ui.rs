use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use divine_insight_core::annotations::HIGHLIGHT_COLORS;
use divine_insight_core::{
    AiMode, AnnotationKind, FlowResponse, FlowStatus, NoticeLevel, PanelPayload,
};

use crate::app::{color_name, App, FocusPane, InputMode, PanelEntry};

const SPINNER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];

/// Terminal colour for a stored `rgba(r, g, b, a)` highlight
fn highlight_bg(color: &str) -> Color {
    let channels: Vec<u8> = color
        .trim_start_matches("rgba(")
        .trim_end_matches(')')
        .split(',')
        .take(3)
        .filter_map(|c| c.trim().parse().ok())
        .collect();
    match channels.as_slice() {
        [r, g, b] => Color::Rgb(*r, *g, *b),
        _ => Color::Yellow,
    }
}

/// Greedy word wrap; a word longer than `width` gets its own line
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(10);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let editing = matches!(app.input_mode, InputMode::Editing(_));
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(if editing { 3 } else { 0 }),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let panel_width = if app.panels.is_open() { 45 } else { 0 };
    let [books_area, verses_area, panel_area] = Layout::horizontal([
        Constraint::Length(16),
        Constraint::Min(0),
        Constraint::Percentage(panel_width),
    ])
    .areas(body_area);

    render_books(app, frame, books_area);
    render_verses(app, frame, verses_area);
    if app.panels.is_open() {
        render_panel(app, frame, panel_area);
    }

    if editing {
        render_input(app, frame, input_area);
    }
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let selected = app.reader.selection().len();
    let selection_indicator = if selected > 0 {
        format!(" [{} selected]", selected)
    } else {
        String::new()
    };
    let (color_label, color) = HIGHLIGHT_COLORS[app.highlight_color];

    let title = Line::from(vec![
        Span::styled(" Divine Insight ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.reader.title(), Style::default().fg(Color::White)),
        Span::styled(selection_indicator, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!(" {} ", color_label),
            Style::default().bg(highlight_bg(color)).fg(Color::Black),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_books(app: &mut App, frame: &mut Frame, area: Rect) {
    let current = app.reader.book().to_string();
    let items: Vec<ListItem> = app
        .corpus
        .books()
        .iter()
        .map(|b| {
            let style = if b.name == current {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(b.name.clone(), style))
        })
        .collect();

    let focused = app.focus == FocusPane::Books;
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Books ")
                .borders(Borders::ALL)
                .border_style(border_style(focused)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.book_state);
}

fn render_verses(app: &App, frame: &mut Frame, area: Rect) {
    let text_width = area.width.saturating_sub(8) as usize;
    let focused = app.focus == FocusPane::Verses;

    let items: Vec<ListItem> = app
        .verses()
        .iter()
        .map(|verse| {
            let reference = verse.reference();
            let annotations = app.store.find_for_verse(&reference);
            let highlight = annotations
                .iter()
                .find(|a| a.kind == AnnotationKind::Highlight)
                .and_then(|a| a.color.as_deref());
            let bookmarked = annotations.iter().any(|a| a.kind == AnnotationKind::Bookmark);
            let notes = annotations.iter().filter(|a| a.kind == AnnotationKind::Note).count();
            let selected = app.reader.selection().contains(&reference);

            let mut text_style = Style::default();
            if let Some(color) = highlight {
                text_style = text_style.bg(highlight_bg(color)).fg(Color::Black);
            }
            if selected {
                text_style = text_style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }

            let mut markers = String::new();
            if bookmarked {
                markers.push('★');
            }
            if notes > 0 {
                markers.push('✎');
            }

            let mut lines: Vec<Line> = Vec::new();
            for (i, chunk) in wrap_text(&verse.text, text_width).into_iter().enumerate() {
                let gutter = if i == 0 {
                    Span::styled(format!("{:>3} ", verse.verse), Style::default().fg(Color::Yellow))
                } else {
                    Span::raw("    ")
                };
                let mut spans = vec![gutter, Span::styled(chunk, text_style)];
                if i == 0 && !markers.is_empty() {
                    spans.push(Span::styled(format!(" {}", markers), Style::default().fg(Color::Magenta)));
                }
                lines.push(Line::from(spans));
            }
            ListItem::new(Text::from(lines))
        })
        .collect();

    let empty = items.is_empty();
    let block = Block::default()
        .title(format!(" {} ", app.reader.title()))
        .borders(Borders::ALL)
        .border_style(border_style(focused));

    if empty {
        let fallback = Paragraph::new("No verses available for this chapter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(fallback, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(if focused {
            Style::default().bg(Color::Rgb(40, 40, 60))
        } else {
            Style::default()
        })
        .highlight_symbol("▌");

    let mut state = ListState::default().with_selected(Some(app.verse_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(payload) = app.panels.active().cloned() else {
        return;
    };
    let focused = app.focus == FocusPane::Panel;
    let block = Block::default()
        .title(format!(" {} ", payload.key().title()))
        .borders(Borders::ALL)
        .border_style(border_style(focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let spinner = SPINNER[app.animation_frame % SPINNER.len()];
    let entries = app.panel_entries();

    match &payload {
        PanelPayload::Ai { mode, status } => {
            let mut lines = vec![Line::from(Span::styled(mode.title(), Style::default().bold()))];
            lines.push(Line::default());
            match status {
                FlowStatus::Idle => {
                    if let AiMode::VerseExplanation { verses, .. } = mode {
                        for v in verses {
                            lines.push(Line::from(format!("{} - {}", v.reference(), v.text)));
                        }
                        lines.push(Line::default());
                    }
                    lines.push(Line::from(Span::styled(
                        "Press ? to ask a question about these verses.",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                FlowStatus::Loading => lines.push(Line::from(format!("{} Thinking...", spinner))),
                FlowStatus::Failed(message) => push_failure(&mut lines, message),
                FlowStatus::Ready(FlowResponse::PassageSummary(out)) => push_paragraphs(&mut lines, &out.summary),
                FlowStatus::Ready(FlowResponse::VerseExplanation(out)) => {
                    push_paragraphs(&mut lines, &out.explanation);
                    lines.push(Line::default());
                    lines.push(Line::from(Span::styled(
                        "Press ? to ask a follow-up question.",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                FlowStatus::Ready(FlowResponse::CrossReference(out)) => {
                    push_paragraphs(&mut lines, &out.original_verse_context);
                }
                FlowStatus::Ready(_) => {}
            }
            render_text_and_entries(app, frame, inner, lines, &entries, focused);
        }
        PanelPayload::Search { term, status } => {
            let mut lines = vec![Line::from(vec![
                Span::raw("Results for "),
                Span::styled(format!("\"{}\"", term), Style::default().fg(Color::Cyan)),
            ])];
            match status {
                FlowStatus::Loading => lines.push(Line::from(format!("{} Asking the model...", spinner))),
                FlowStatus::Failed(message) => push_failure(&mut lines, message),
                FlowStatus::Ready(FlowResponse::KeywordSearch(out)) => push_paragraphs(&mut lines, &out.summary),
                _ => {}
            }
            render_text_and_entries(app, frame, inner, lines, &entries, focused);
        }
        PanelPayload::Annotations { tab } => {
            let [tabs_area, list_area] =
                Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);
            let selected = AnnotationKind::all().iter().position(|k| k == tab).unwrap_or(0);
            let tabs = Tabs::new(vec!["1 Bookmarks", "2 Highlights", "3 Notes"])
                .select(selected)
                .highlight_style(Style::default().fg(Color::Cyan).bold());
            frame.render_widget(tabs, tabs_area);

            if entries.is_empty() {
                let empty = Paragraph::new(format!("No {}s yet.", tab.as_str()))
                    .style(Style::default().fg(Color::DarkGray));
                frame.render_widget(empty, list_area);
            } else {
                render_entries(app, frame, list_area, &entries, focused);
            }
        }
        PanelPayload::Library { filter } => {
            let mut lines = vec![Line::from(vec![
                Span::styled("Filter: ", Style::default().fg(Color::DarkGray)),
                Span::raw(filter.clone()),
            ])];
            lines.push(Line::default());
            let matches = app.lexicon.filter(filter);
            if matches.is_empty() {
                lines.push(Line::from(Span::styled(
                    "No terms match.",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            for entry in matches {
                let mut head = vec![Span::styled(entry.term.clone(), Style::default().fg(Color::Yellow).bold())];
                if let Some(greek) = &entry.greek {
                    head.push(Span::raw(format!("  {}", greek)));
                }
                if let Some(hebrew) = &entry.hebrew {
                    head.push(Span::raw(format!("  {}", hebrew)));
                }
                lines.push(Line::from(head));
                lines.push(Line::from(entry.definition.clone()));
                lines.push(Line::default());
            }
            let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
            frame.render_widget(paragraph, inner);
        }
    }
}

fn push_paragraphs(lines: &mut Vec<Line<'static>>, text: &str) {
    lines.extend(text.lines().map(|l| Line::from(l.to_string())));
}

fn push_failure(lines: &mut Vec<Line<'static>>, message: &str) {
    lines.push(Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))));
    lines.push(Line::from(Span::styled(
        "Press R to retry.",
        Style::default().fg(Color::DarkGray),
    )));
}

fn render_text_and_entries(
    app: &mut App,
    frame: &mut Frame,
    area: Rect,
    lines: Vec<Line<'static>>,
    entries: &[PanelEntry],
    focused: bool,
) {
    if entries.is_empty() {
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
        return;
    }
    let [text_area, list_area] =
        Layout::vertical([Constraint::Percentage(35), Constraint::Percentage(65)]).areas(area);
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), text_area);
    render_entries(app, frame, list_area, entries, focused);
}

fn render_entries(app: &mut App, frame: &mut Frame, area: Rect, entries: &[PanelEntry], focused: bool) {
    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let mut lines = vec![Line::from(Span::styled(
                entry.reference.to_string(),
                Style::default().fg(Color::Yellow).bold(),
            ))];
            lines.extend(wrap_text(&entry.text, width).into_iter().map(Line::from));
            if let Some(detail) = &entry.detail {
                lines.extend(
                    wrap_text(detail, width)
                        .into_iter()
                        .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::Gray).italic()))),
                );
            }
            ListItem::new(Text::from(lines))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::TOP))
        .highlight_style(if focused {
            Style::default().bg(Color::Rgb(40, 40, 60))
        } else {
            Style::default()
        })
        .highlight_symbol("▌");
    frame.render_stateful_widget(list, area, &mut app.panel_state);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let InputMode::Editing(target) = &app.input_mode else {
        return;
    };
    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .title(format!(" {} ", target.prompt()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(input, area);

    frame.set_cursor_position((input_cursor_x(area, app.input_cursor), area.y + 1));
}

/// Column of the input cursor, clamped inside the box border
fn input_cursor_x(area: Rect, cursor: usize) -> u16 {
    let offset = u16::try_from(cursor).unwrap_or(u16::MAX);
    area.x
        .saturating_add(1)
        .saturating_add(offset)
        .min(area.right().saturating_sub(2))
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing(_) => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " READ ",
        InputMode::Editing(_) => " INPUT ",
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(notice) = &app.notice {
        let color = match notice.level {
            NoticeLevel::Info => Color::Green,
            NoticeLevel::Warning => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        spans.push(Span::styled(format!("{}: ", notice.title), Style::default().fg(color).bold()));
        spans.push(Span::raw(notice.description.clone()));
    } else {
        let hints = match (&app.input_mode, app.focus) {
            (InputMode::Editing(_), _) => "Enter submit  Esc cancel",
            (_, FocusPane::Books) => "j/k move  Enter open  Tab focus  / search  q quit",
            (_, FocusPane::Verses) => {
                "Space select  v add  b bookmark  h highlight  c colour  n note  a explain  r xrefs  s summary  [ ] chapter  m marks  L library"
            }
            (_, FocusPane::Panel) => "j/k move  Enter go to verse  e edit  d delete  1-3 tabs  R retry  Esc close",
        };
        spans.push(Span::styled(hints, Style::default().fg(Color::DarkGray)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_bg_parses_rgba() {
        assert_eq!(highlight_bg("rgba(255, 243, 128, 0.5)"), Color::Rgb(255, 243, 128));
        assert_eq!(highlight_bg("tomato"), Color::Yellow);
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("In the beginning God created the heaven and the earth.", 16);
        assert_eq!(lines[0], "In the beginning");
        assert!(lines.iter().all(|l| l.chars().count() <= 16));
        assert_eq!(lines.join(" "), "In the beginning God created the heaven and the earth.");
    }

    #[test]
    fn test_input_cursor_stays_inside_box() {
        let area = Rect::new(4, 10, 20, 3);
        assert_eq!(input_cursor_x(area, 0), 5);
        assert_eq!(input_cursor_x(area, 3), 8);
        assert_eq!(input_cursor_x(area, 500), 22);
        assert_eq!(input_cursor_x(area, 70_000), 22);
        assert_eq!(input_cursor_x(Rect::new(u16::MAX - 5, 0, 5, 3), usize::MAX), u16::MAX - 2);
    }

    #[test]
    fn test_palette_names_round_trip() {
        for (name, color) in HIGHLIGHT_COLORS {
            assert_eq!(color_name(color), name);
        }
    }
}
