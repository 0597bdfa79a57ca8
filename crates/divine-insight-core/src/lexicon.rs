//! Reference library: a small theological lexicon.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub term: String,
    pub definition: String,
    pub greek: Option<String>,
    pub hebrew: Option<String>,
}

impl LexiconEntry {
    fn new(term: &str, definition: &str, greek: Option<&str>, hebrew: Option<&str>) -> Self {
        Self {
            term: term.to_string(),
            definition: definition.to_string(),
            greek: greek.map(str::to_string),
            hebrew: hebrew.map(str::to_string),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(needle);
        contains(&self.term)
            || contains(&self.definition)
            || self.greek.as_deref().is_some_and(contains)
            || self.hebrew.as_deref().is_some_and(contains)
    }
}

pub struct Lexicon {
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                LexiconEntry::new(
                    "Agape",
                    "Selfless, sacrificial, unconditional love, the highest form of love.",
                    Some("ἀγάπη"),
                    None,
                ),
                LexiconEntry::new(
                    "Logos",
                    "The Word; a concept referring to divine reason or plan, often identified with Jesus Christ.",
                    Some("λόγος"),
                    None,
                ),
                LexiconEntry::new(
                    "Shalom",
                    "Peace, harmony, wholeness, completeness, prosperity, welfare and tranquility.",
                    None,
                    Some("שָׁלוֹם"),
                ),
                LexiconEntry::new(
                    "Amen",
                    "So be it; truly. An affirmation of truth or agreement.",
                    None,
                    Some("אָמֵן"),
                ),
                LexiconEntry::new(
                    "Hallelujah",
                    "Praise the Lord. An expression of worship or rejoicing.",
                    None,
                    Some("הַלְלוּיָהּ"),
                ),
            ],
        }
    }

    /// Case-insensitive filter over every field, sorted by term
    pub fn filter(&self, query: &str) -> Vec<&LexiconEntry> {
        let needle = query.trim().to_lowercase();
        let mut hits: Vec<&LexiconEntry> = self
            .entries
            .iter()
            .filter(|e| needle.is_empty() || e.matches(&needle))
            .collect();
        hits.sort_by(|a, b| a.term.cmp(&b.term));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_lists_all_sorted() {
        let lexicon = Lexicon::builtin();
        let terms: Vec<&str> = lexicon.filter("").iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["Agape", "Amen", "Hallelujah", "Logos", "Shalom"]);
    }

    #[test]
    fn test_filter_matches_definition_and_original_language() {
        let lexicon = Lexicon::builtin();
        let by_definition: Vec<&str> = lexicon.filter("PEACE").iter().map(|e| e.term.as_str()).collect();
        assert_eq!(by_definition, vec!["Shalom"]);

        let by_greek = lexicon.filter("λόγος");
        assert_eq!(by_greek.len(), 1);
        assert_eq!(by_greek[0].term, "Logos");
    }

    #[test]
    fn test_no_match() {
        assert!(Lexicon::builtin().filter("zzz").is_empty());
    }
}
