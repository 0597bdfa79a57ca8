use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use anyhow::Result;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use tracing::{debug, info};

/// Identity of a verse: (book name, chapter, verse)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRef {
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
}

impl VerseRef {
    pub fn new(book_name: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book_name: book_name.into(),
            chapter,
            verse,
        }
    }
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book_name, self.chapter, self.verse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

impl Verse {
    pub fn reference(&self) -> VerseRef {
        VerseRef::new(self.book_name.clone(), self.chapter, self.verse)
    }

    pub fn is(&self, reference: &VerseRef) -> bool {
        self.book_name == reference.book_name
            && self.chapter == reference.chapter
            && self.verse == reference.verse
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "chapter")]
    pub chapter_number: u32,
    pub verses: Vec<Verse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    pub abbreviation: String,
    pub chapters: Vec<Chapter>,
}

impl Book {
    pub fn first_chapter(&self) -> Option<u32> {
        self.chapters.first().map(|c| c.chapter_number)
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.abbreviation.eq_ignore_ascii_case(name)
    }
}

/// A reference typed by the user, e.g. "John 1:14" or "Gen 2"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub book_name: String,
    pub chapter: u32,
    pub verse: Option<u32>,
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(.+?)\.?\s+(\d+)(?:\s*:\s*(\d+))?\s*$").expect("valid reference regex")
    })
}

/// Immutable Book -> Chapter -> Verse lookup over a fixed corpus.
///
/// Book order is canonical and drives chapter-to-chapter navigation.
pub struct Corpus {
    books: Vec<Book>,
}

impl Corpus {
    pub fn from_books(books: Vec<Book>) -> Self {
        Self { books }
    }

    /// The built-in King James sample corpus
    pub fn kjv() -> Self {
        Self::from_books(crate::kjv::books())
    }

    pub async fn load_from_json(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let books: Vec<Book> = serde_json::from_str(&content)?;

        info!(path, books = books.len(), "loaded corpus");
        Ok(Self::from_books(books))
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn find_book(&self, name: &str) -> Option<&Book> {
        let name = name.trim();
        self.books.iter().find(|b| b.matches(name))
    }

    pub fn find_chapter(&self, book: &str, number: u32) -> Option<&Chapter> {
        self.find_book(book)?
            .chapters
            .iter()
            .find(|c| c.chapter_number == number)
    }

    pub fn find_verse(&self, book: &str, chapter: u32, number: u32) -> Option<&Verse> {
        self.find_chapter(book, chapter)?
            .verses
            .iter()
            .find(|v| v.verse == number)
    }

    pub fn resolve(&self, reference: &VerseRef) -> Option<&Verse> {
        self.find_verse(&reference.book_name, reference.chapter, reference.verse)
    }

    /// Where a fresh session starts reading
    pub fn first_location(&self) -> Option<(&str, u32)> {
        let book = self.books.first()?;
        Some((book.name.as_str(), book.first_chapter()?))
    }

    pub fn next_chapter(&self, book: &str, chapter: u32) -> Option<(&str, u32)> {
        let locations = self.locations();
        let idx = locations
            .iter()
            .position(|(b, c)| b.eq_ignore_ascii_case(book) && *c == chapter)?;
        locations.get(idx + 1).copied()
    }

    pub fn prev_chapter(&self, book: &str, chapter: u32) -> Option<(&str, u32)> {
        let locations = self.locations();
        let idx = locations
            .iter()
            .position(|(b, c)| b.eq_ignore_ascii_case(book) && *c == chapter)?;
        idx.checked_sub(1).and_then(|i| locations.get(i).copied())
    }

    fn locations(&self) -> Vec<(&str, u32)> {
        self.books
            .iter()
            .flat_map(|b| b.chapters.iter().map(move |c| (b.name.as_str(), c.chapter_number)))
            .collect()
    }

    /// Whole chapter as one passage, for summaries
    pub fn chapter_text(&self, book: &str, chapter: u32) -> Option<String> {
        let chapter = self.find_chapter(book, chapter)?;
        Some(
            chapter
                .verses
                .iter()
                .map(|v| v.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Parse "Book C" or "Book C:V" against the corpus book names and abbreviations
    pub fn parse_reference(&self, input: &str) -> Option<ParsedReference> {
        let caps = reference_pattern().captures(input)?;
        let book = self.find_book(caps.get(1)?.as_str())?;
        let chapter = caps.get(2)?.as_str().parse().ok()?;
        let verse = match caps.get(3) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };

        Some(ParsedReference {
            book_name: book.name.clone(),
            chapter,
            verse,
        })
    }

    /// Stemmed keyword search: every query word must match a word of the verse
    /// ("create" matches "created").
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Verse> {
        let stemmer = Stemmer::create(Algorithm::English);
        let wanted: Vec<String> = tokenize(query)
            .map(|w| stemmer.stem(&w).into_owned())
            .collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        let results: Vec<&Verse> = self
            .books
            .iter()
            .flat_map(|b| b.chapters.iter())
            .flat_map(|c| c.verses.iter())
            .filter(|verse| {
                let stems: HashSet<String> = tokenize(&verse.text)
                    .map(|w| stemmer.stem(&w).into_owned())
                    .collect();
                wanted.iter().all(|w| stems.contains(w))
            })
            .take(limit)
            .collect();

        debug!(query, hits = results.len(), "local search");
        results
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_chapter_orders_verses() {
        let corpus = Corpus::kjv();
        let chapter = corpus.find_chapter("Genesis", 1).unwrap();
        let numbers: Vec<u32> = chapter.verses.iter().map(|v| v.verse).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_chapter_is_none() {
        let corpus = Corpus::kjv();
        assert!(corpus.find_chapter("Genesis", 99).is_none());
        assert!(corpus.find_book("Leviticus").is_none());
        assert!(corpus.find_verse("John", 1, 4).is_none());
    }

    #[test]
    fn test_find_verse_text() {
        let corpus = Corpus::kjv();
        let verse = corpus.find_verse("Genesis", 1, 1).unwrap();
        assert_eq!(
            verse.text,
            "In the beginning God created the heaven and the earth."
        );
        assert_eq!(verse.reference().to_string(), "Genesis 1:1");
    }

    #[test]
    fn test_find_book_by_abbreviation() {
        let corpus = Corpus::kjv();
        assert_eq!(corpus.find_book("joh").unwrap().name, "John");
        assert_eq!(corpus.find_book("GENESIS").unwrap().name, "Genesis");
    }

    #[test]
    fn test_chapter_navigation_follows_book_order() {
        let corpus = Corpus::kjv();
        assert_eq!(corpus.first_location(), Some(("Genesis", 1)));
        assert_eq!(corpus.next_chapter("Genesis", 1), Some(("Genesis", 2)));
        assert_eq!(corpus.next_chapter("Genesis", 2), Some(("Exodus", 1)));
        assert_eq!(corpus.prev_chapter("Exodus", 1), Some(("Genesis", 2)));
        assert_eq!(corpus.prev_chapter("Genesis", 1), None);
        assert_eq!(corpus.next_chapter("John", 1), None);
    }

    #[test]
    fn test_parse_reference() {
        let corpus = Corpus::kjv();
        assert_eq!(
            corpus.parse_reference("John 1:14"),
            Some(ParsedReference {
                book_name: "John".to_string(),
                chapter: 1,
                verse: Some(14),
            })
        );
        assert_eq!(
            corpus.parse_reference("gen. 2").map(|r| (r.book_name, r.chapter, r.verse)),
            Some(("Genesis".to_string(), 2, None))
        );
        assert!(corpus.parse_reference("Romans 8:28").is_none());
        assert!(corpus.parse_reference("light").is_none());
    }

    #[test]
    fn test_search_is_stemmed() {
        let corpus = Corpus::kjv();
        let hits = corpus.search("create", 10);
        let refs: Vec<String> = hits.iter().map(|v| v.reference().to_string()).collect();
        assert!(refs.contains(&"Genesis 1:1".to_string()));
        assert!(refs.contains(&"Genesis 2:3".to_string()));
    }

    #[test]
    fn test_search_respects_limit_and_empty_query() {
        let corpus = Corpus::kjv();
        assert_eq!(corpus.search("God", 2).len(), 2);
        assert!(corpus.search("  ", 10).is_empty());
    }

    #[test]
    fn test_chapter_text_joins_verses() {
        let corpus = Corpus::kjv();
        let text = corpus.chapter_text("Exodus", 1).unwrap();
        assert!(text.starts_with("Now these are the names"));
        assert!(text.ends_with("Reuben, Simeon, Levi, and Judah,"));
    }

    #[tokio::test]
    async fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        let json = r#"[{"name":"Ruth","abbreviation":"Rut","chapters":[{"chapter":1,"verses":[
            {"book_name":"Ruth","chapter":1,"verse":16,"text":"Whither thou goest, I will go"}]}]}]"#;
        std::fs::write(&path, json).unwrap();

        let corpus = Corpus::load_from_json(path.to_str().unwrap()).await.unwrap();
        assert_eq!(corpus.books().len(), 1);
        assert!(corpus.find_verse("Ruth", 1, 16).is_some());
    }
}
