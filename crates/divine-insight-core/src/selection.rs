//! Reader location and verse selection.
//!
//! The selection is a set of verse identities kept in the order they were
//! picked. Its observable state is derived from its size: `Empty`, `Single`,
//! or `Multi` (two or more verses).

use tracing::debug;

use crate::scripture::{Corpus, Verse, VerseRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState<'a> {
    Empty,
    Single(&'a VerseRef),
    Multi(&'a [VerseRef]),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    verses: Vec<VerseRef>,
}

impl Selection {
    pub fn state(&self) -> SelectionState<'_> {
        match self.verses.as_slice() {
            [] => SelectionState::Empty,
            [only] => SelectionState::Single(only),
            all => SelectionState::Multi(all),
        }
    }

    /// Plain select replaces the selection, or clears it when `verse` is
    /// already the only selected verse. Additive select toggles `verse` in
    /// or out of the set.
    pub fn select(&mut self, verse: VerseRef, additive: bool) {
        let existing = self.verses.iter().position(|v| *v == verse);

        if additive {
            match existing {
                Some(idx) => {
                    self.verses.remove(idx);
                }
                None => self.verses.push(verse),
            }
        } else if existing.is_some() && self.verses.len() == 1 {
            self.verses.clear();
        } else {
            self.verses = vec![verse];
        }
    }

    pub fn set_single(&mut self, verse: VerseRef) {
        self.verses = vec![verse];
    }

    pub fn clear(&mut self) {
        self.verses.clear();
    }

    pub fn contains(&self, verse: &VerseRef) -> bool {
        self.verses.contains(verse)
    }

    pub fn verses(&self) -> &[VerseRef] {
        &self.verses
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}

/// The displayed book and chapter plus the selection scoped to them.
#[derive(Debug, Clone)]
pub struct Reader {
    book: String,
    chapter: u32,
    selection: Selection,
}

impl Reader {
    pub fn new(corpus: &Corpus) -> Self {
        let (book, chapter) = corpus.first_location().unwrap_or(("", 0));
        Self::at(book, chapter)
    }

    pub fn at(book: impl Into<String>, chapter: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
            selection: Selection::default(),
        }
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select(&mut self, verse: VerseRef, additive: bool) {
        self.selection.select(verse, additive);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Show the first chapter of `name`. Unknown books leave the reader untouched.
    pub fn select_book(&mut self, corpus: &Corpus, name: &str) -> bool {
        let Some(book) = corpus.find_book(name) else {
            return false;
        };
        let Some(first) = book.first_chapter() else {
            return false;
        };

        self.book = book.name.clone();
        self.chapter = first;
        self.selection.clear();
        debug!(book = %self.book, chapter = self.chapter, "book selected");
        true
    }

    pub fn select_chapter(&mut self, number: u32) {
        self.chapter = number;
        self.selection.clear();
        debug!(book = %self.book, chapter = number, "chapter selected");
    }

    pub fn next_chapter(&mut self, corpus: &Corpus) -> bool {
        match corpus.next_chapter(&self.book, self.chapter) {
            Some((book, chapter)) => {
                self.book = book.to_string();
                self.select_chapter(chapter);
                true
            }
            None => false,
        }
    }

    pub fn prev_chapter(&mut self, corpus: &Corpus) -> bool {
        match corpus.prev_chapter(&self.book, self.chapter) {
            Some((book, chapter)) => {
                self.book = book.to_string();
                self.select_chapter(chapter);
                true
            }
            None => false,
        }
    }

    /// Jump to a verse from a search result or cross reference. The reader
    /// always moves to the target chapter; the verse ends up as the only
    /// selection when the corpus contains it, otherwise nothing is selected.
    pub fn navigate_to(&mut self, corpus: &Corpus, target: &VerseRef) -> bool {
        let canonical = corpus
            .find_book(&target.book_name)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| target.book_name.clone());

        self.book = canonical;
        self.chapter = target.chapter;

        match corpus.find_verse(&self.book, target.chapter, target.verse) {
            Some(verse) => {
                self.selection.set_single(verse.reference());
                debug!(verse = %verse.reference(), "navigated to verse");
                true
            }
            None => {
                self.selection.clear();
                debug!(%target, "navigation target not in corpus");
                false
            }
        }
    }

    pub fn verses<'c>(&self, corpus: &'c Corpus) -> &'c [Verse] {
        corpus
            .find_chapter(&self.book, self.chapter)
            .map(|c| c.verses.as_slice())
            .unwrap_or(&[])
    }

    /// Selected verses resolved against the corpus, in selection order
    pub fn selected_verses<'c>(&self, corpus: &'c Corpus) -> Vec<&'c Verse> {
        self.selection
            .verses()
            .iter()
            .filter_map(|r| corpus.resolve(r))
            .collect()
    }

    pub fn title(&self) -> String {
        format!("{} {}", self.book, self.chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u32) -> VerseRef {
        VerseRef::new("Genesis", 1, n)
    }

    #[test]
    fn test_plain_select_toggles_off() {
        let mut sel = Selection::default();
        sel.select(v(1), false);
        assert_eq!(sel.state(), SelectionState::Single(&v(1)));
        sel.select(v(1), false);
        assert_eq!(sel.state(), SelectionState::Empty);
    }

    #[test]
    fn test_plain_select_replaces() {
        let mut sel = Selection::default();
        sel.select(v(1), true);
        sel.select(v(2), true);
        sel.select(v(3), false);
        assert_eq!(sel.verses(), &[v(3)]);
    }

    #[test]
    fn test_plain_select_inside_multi_collapses_to_single() {
        let mut sel = Selection::default();
        sel.select(v(1), true);
        sel.select(v(2), true);
        sel.select(v(2), false);
        assert_eq!(sel.state(), SelectionState::Single(&v(2)));
    }

    #[test]
    fn test_additive_select_twice_restores_previous_state() {
        for start in [vec![], vec![v(1)], vec![v(1), v(2)]] {
            let mut sel = Selection::default();
            for r in &start {
                sel.select(r.clone(), true);
            }
            let before = sel.clone();

            sel.select(v(9), true);
            assert!(sel.contains(&v(9)));
            sel.select(v(9), true);
            assert_eq!(sel, before);
        }
    }

    #[test]
    fn test_additive_select_promotes_to_multi() {
        let mut sel = Selection::default();
        sel.select(v(1), false);
        sel.select(v(2), true);
        match sel.state() {
            SelectionState::Multi(all) => assert_eq!(all, &[v(1), v(2)]),
            other => panic!("expected multi, got {:?}", other),
        }

        sel.select(v(1), true);
        sel.select(v(2), true);
        assert_eq!(sel.state(), SelectionState::Empty);
    }

    #[test]
    fn test_changing_chapter_clears_selection() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::new(&corpus);
        reader.select(v(1), false);
        reader.select_chapter(2);
        assert!(reader.selection().is_empty());
        assert_eq!(reader.chapter(), 2);
    }

    #[test]
    fn test_changing_book_clears_selection_and_opens_first_chapter() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::at("Genesis", 2);
        reader.select(VerseRef::new("Genesis", 2, 1), false);

        assert!(reader.select_book(&corpus, "John"));
        assert_eq!((reader.book(), reader.chapter()), ("John", 1));
        assert!(reader.selection().is_empty());

        assert!(!reader.select_book(&corpus, "Romans"));
        assert_eq!(reader.book(), "John");
    }

    #[test]
    fn test_navigate_to_selects_only_target() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::new(&corpus);
        reader.select(v(1), true);
        reader.select(v(2), true);

        assert!(reader.navigate_to(&corpus, &VerseRef::new("john", 1, 14)));
        assert_eq!((reader.book(), reader.chapter()), ("John", 1));
        assert_eq!(reader.selection().verses(), &[VerseRef::new("John", 1, 14)]);
    }

    #[test]
    fn test_navigate_to_unknown_verse_leaves_empty_selection() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::new(&corpus);
        reader.select(v(1), false);

        assert!(!reader.navigate_to(&corpus, &VerseRef::new("Romans", 8, 28)));
        assert_eq!((reader.book(), reader.chapter()), ("Romans", 8));
        assert!(reader.selection().is_empty());
        assert!(reader.verses(&corpus).is_empty());
    }

    #[test]
    fn test_chapter_stepping() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::new(&corpus);
        assert!(reader.next_chapter(&corpus));
        assert!(reader.next_chapter(&corpus));
        assert_eq!(reader.title(), "Exodus 1");
        assert!(reader.prev_chapter(&corpus));
        assert_eq!(reader.title(), "Genesis 2");
    }

    #[test]
    fn test_selected_verses_resolve_in_order() {
        let corpus = Corpus::kjv();
        let mut reader = Reader::new(&corpus);
        reader.select(v(3), true);
        reader.select(v(1), true);
        let numbers: Vec<u32> = reader.selected_verses(&corpus).iter().map(|v| v.verse).collect();
        assert_eq!(numbers, vec![3, 1]);
    }
}
