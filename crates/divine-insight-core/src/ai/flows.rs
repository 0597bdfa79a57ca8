//! The four analysis flows: request/response shapes and their prompts.
//!
//! Each flow is a prompt template plus a JSON output schema. Responses are
//! deserialized straight from the model output, so field names match the
//! schema the prompt describes.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use regex::Regex;

use crate::error::GatewayError;
use crate::scripture::{Verse, VerseRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageSummaryInput {
    pub passage_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageSummaryOutput {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseExplanationInput {
    pub verse: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl VerseExplanationInput {
    /// One `Book C:V - text` line per verse
    pub fn for_verses(verses: &[Verse], question: Option<&str>) -> Self {
        let verse = verses
            .iter()
            .map(|v| format!("{} {}:{} - {}", v.book_name, v.chapter, v.verse, v.text))
            .collect::<Vec<_>>()
            .join("\n");
        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        Self { verse, question }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseExplanationOutput {
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSearchInput {
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordVerse {
    pub book: String,
    pub chapter: u32,
    pub verse_number: u32,
    pub text: String,
    pub relevance_score: f64,
}

impl KeywordVerse {
    pub fn reference(&self) -> VerseRef {
        VerseRef::new(self.book.clone(), self.chapter, self.verse_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSearchOutput {
    pub verses: Vec<KeywordVerse>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceInput {
    pub book_name: String,
    pub chapter: u32,
    pub verse_number: u32,
    pub verse_text: String,
}

impl From<&Verse> for CrossReferenceInput {
    fn from(v: &Verse) -> Self {
        Self {
            book_name: v.book_name.clone(),
            chapter: v.chapter,
            verse_number: v.verse,
            verse_text: v.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    pub book: String,
    pub chapter: u32,
    pub verse_number: u32,
    pub text: String,
    pub connection: String,
}

impl CrossReference {
    pub fn reference(&self) -> VerseRef {
        VerseRef::new(self.book.clone(), self.chapter, self.verse_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceOutput {
    pub cross_references: Vec<CrossReference>,
    pub original_verse_context: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowRequest {
    PassageSummary(PassageSummaryInput),
    VerseExplanation(VerseExplanationInput),
    KeywordSearch(KeywordSearchInput),
    CrossReference(CrossReferenceInput),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowResponse {
    PassageSummary(PassageSummaryOutput),
    VerseExplanation(VerseExplanationOutput),
    KeywordSearch(KeywordSearchOutput),
    CrossReference(CrossReferenceOutput),
}

const KJV_THEOLOGIAN: &str =
    "You are a theologian with deep knowledge of the King James Version (KJV) of the Bible.";

impl FlowRequest {
    pub fn name(&self) -> &'static str {
        match self {
            FlowRequest::PassageSummary(_) => "passageSummary",
            FlowRequest::VerseExplanation(_) => "verseExplanation",
            FlowRequest::KeywordSearch(_) => "keywordSearch",
            FlowRequest::CrossReference(_) => "crossReference",
        }
    }

    /// Message shown in the panel when the flow fails
    pub fn failure_message(&self) -> &'static str {
        match self {
            FlowRequest::PassageSummary(_) => "Failed to summarize passage. Please try again.",
            FlowRequest::VerseExplanation(_) => "Failed to explain verse(s). Please try again.",
            FlowRequest::KeywordSearch(_) => "Failed to perform search. Please try again.",
            FlowRequest::CrossReference(_) => "Failed to find cross-references. Please try again.",
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            FlowRequest::PassageSummary(input) => format!(
                "{KJV_THEOLOGIAN}\n\n\
                 Summarize the following passage, identifying its key themes and messages:\n\n\
                 {}\n\n\
                 Respond with a JSON object of the form {{\"summary\": string}}.",
                input.passage_text
            ),
            FlowRequest::VerseExplanation(input) => {
                let mut prompt = format!(
                    "{KJV_THEOLOGIAN}\n\n\
                     Provide a theological explanation of the following verse, using the King James \
                     Version as your primary reference:\n\n\
                     Verse: {}\n",
                    input.verse
                );
                if let Some(question) = &input.question {
                    prompt.push_str(&format!(
                        "\nIn addition, answer the following question about the verse:\n\nQuestion: {}\n",
                        question
                    ));
                }
                prompt.push_str("\nRespond with a JSON object of the form {\"explanation\": string}.");
                prompt
            }
            FlowRequest::KeywordSearch(input) => format!(
                "{KJV_THEOLOGIAN}\n\n\
                 Based on the provided keyword, find relevant verses or passages in the KJV Bible and \
                 summarize the theological concept and its relevance to the verses you found.\n\n\
                 Keyword: {}\n\n\
                 Respond with a JSON object of the form {{\"verses\": [{{\"book\": string, \"chapter\": number, \
                 \"verseNumber\": number, \"text\": string, \"relevanceScore\": number between 0 and 1}}], \
                 \"summary\": string}}.",
                input.keyword
            ),
            FlowRequest::CrossReference(input) => format!(
                "{KJV_THEOLOGIAN} You know chain reference systems such as the Thompson Chain Reference.\n\n\
                 Given the following KJV verse:\n\
                 Book: {}\nChapter: {}\nVerse: {}\nText: \"{}\"\n\n\
                 1. Identify the key theological themes, concepts, people, places or keywords in this verse.\n\
                 2. Find 5 to 7 other KJV verses strongly related to those themes: parallel passages, \
                 contrasting ideas or later developments.\n\
                 3. For each, give the book, chapter, verse number and full KJV text.\n\
                 4. For each, briefly explain its connection to the original verse.\n\
                 5. Summarize the themes of the original verse that guided your selection.\n\n\
                 Prefer meaningful theological connections over simple word matches.\n\
                 Respond with a JSON object of the form {{\"crossReferences\": [{{\"book\": string, \
                 \"chapter\": number, \"verseNumber\": number, \"text\": string, \"connection\": string}}], \
                 \"originalVerseContext\": string}}.",
                input.book_name, input.chapter, input.verse_number, input.verse_text
            ),
        }
    }

    /// Decode raw model output into this flow's response type
    pub fn parse_response(&self, raw: &str) -> Result<FlowResponse, GatewayError> {
        let json = extract_json(raw).ok_or(GatewayError::EmptyResponse)?;
        let flow = self.name();
        let malformed = |source: serde_json::Error| GatewayError::MalformedOutput { flow, source };

        let response = match self {
            FlowRequest::PassageSummary(_) => {
                FlowResponse::PassageSummary(serde_json::from_str(json).map_err(malformed)?)
            }
            FlowRequest::VerseExplanation(_) => {
                FlowResponse::VerseExplanation(serde_json::from_str(json).map_err(malformed)?)
            }
            FlowRequest::KeywordSearch(_) => {
                FlowResponse::KeywordSearch(serde_json::from_str(json).map_err(malformed)?)
            }
            FlowRequest::CrossReference(_) => {
                FlowResponse::CrossReference(serde_json::from_str(json).map_err(malformed)?)
            }
        };
        Ok(response)
    }
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence regex"))
}

/// Pull the JSON object out of a model reply, tolerating code fences and
/// chatter around the object.
fn extract_json(raw: &str) -> Option<&str> {
    let body = fence_pattern()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john_1_1() -> Verse {
        Verse {
            book_name: "John".to_string(),
            chapter: 1,
            verse: 1,
            text: "In the beginning was the Word".to_string(),
        }
    }

    #[test]
    fn test_verse_explanation_input_joins_lines() {
        let mut second = john_1_1();
        second.verse = 2;
        second.text = "The same was in the beginning with God.".to_string();

        let input = VerseExplanationInput::for_verses(&[john_1_1(), second], Some("  "));
        assert_eq!(
            input.verse,
            "John 1:1 - In the beginning was the Word\nJohn 1:2 - The same was in the beginning with God."
        );
        assert_eq!(input.question, None);
    }

    #[test]
    fn test_prompt_includes_question_only_when_present() {
        let with = FlowRequest::VerseExplanation(VerseExplanationInput::for_verses(
            &[john_1_1()],
            Some("Who is the Word?"),
        ));
        assert!(with.prompt().contains("Question: Who is the Word?"));

        let without = FlowRequest::VerseExplanation(VerseExplanationInput::for_verses(&[john_1_1()], None));
        assert!(!without.prompt().contains("Question:"));
    }

    #[test]
    fn test_cross_reference_prompt_names_verse() {
        let request = FlowRequest::CrossReference(CrossReferenceInput::from(&john_1_1()));
        let prompt = request.prompt();
        assert!(prompt.contains("Book: John"));
        assert!(prompt.contains("Text: \"In the beginning was the Word\""));
    }

    #[test]
    fn test_parse_fenced_cross_reference() {
        let raw = "Here you go:\n```json\n{\"crossReferences\":[{\"book\":\"Genesis\",\"chapter\":1,\
                   \"verseNumber\":1,\"text\":\"In the beginning God created\",\"connection\":\"Creation\"}],\
                   \"originalVerseContext\":\"The eternal Word\"}\n```";
        let request = FlowRequest::CrossReference(CrossReferenceInput::from(&john_1_1()));

        match request.parse_response(raw).unwrap() {
            FlowResponse::CrossReference(out) => {
                assert_eq!(out.cross_references.len(), 1);
                assert_eq!(out.cross_references[0].reference(), VerseRef::new("Genesis", 1, 1));
                assert_eq!(out.original_verse_context, "The eternal Word");
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_parse_keyword_search_with_chatter() {
        let raw = "Sure! {\"verses\":[{\"book\":\"John\",\"chapter\":3,\"verseNumber\":16,\
                   \"text\":\"For God so loved the world\",\"relevanceScore\":0.95}],\"summary\":\"Love\"} Hope this helps.";
        let request = FlowRequest::KeywordSearch(KeywordSearchInput { keyword: "love".into() });

        match request.parse_response(raw).unwrap() {
            FlowResponse::KeywordSearch(out) => {
                assert_eq!(out.verses[0].verse_number, 16);
                assert!((out.verses[0].relevance_score - 0.95).abs() < 1e-9);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        let request = FlowRequest::PassageSummary(PassageSummaryInput { passage_text: "x".into() });
        assert!(matches!(
            request.parse_response("no json here"),
            Err(GatewayError::EmptyResponse)
        ));
        assert!(matches!(
            request.parse_response("{\"wrong\": 1}"),
            Err(GatewayError::MalformedOutput { flow: "passageSummary", .. })
        ));
    }
}
