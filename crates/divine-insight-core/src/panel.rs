//! Single-active-panel coordinator.
//!
//! At most one panel is open. Every open, close or re-dispatch bumps a
//! generation counter; gateway calls carry the generation they were
//! dispatched under and their results are dropped unless it is still current.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::flows::{
    CrossReferenceInput, FlowRequest, FlowResponse, KeywordSearchInput, PassageSummaryInput,
    VerseExplanationInput,
};
use crate::ai::FlowGateway;
use crate::annotations::AnnotationKind;
use crate::error::GatewayError;
use crate::scripture::Verse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKey {
    Ai,
    Annotations,
    Search,
    Library,
}

impl PanelKey {
    pub fn title(&self) -> &'static str {
        match self {
            PanelKey::Ai => "AI Analysis",
            PanelKey::Annotations => "Annotations",
            PanelKey::Search => "Search",
            PanelKey::Library => "Library",
        }
    }
}

/// Whether navigating the reader closes the open panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    #[default]
    KeepOpen,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiMode {
    PassageSummary { title: String, passage_text: String },
    VerseExplanation { verses: Vec<Verse>, question: Option<String> },
    CrossReference { verse: Verse },
}

impl AiMode {
    pub fn title(&self) -> String {
        match self {
            AiMode::PassageSummary { title, .. } => format!("Summary of {}", title),
            AiMode::VerseExplanation { verses, .. } => match verses.as_slice() {
                [one] => format!("Explanation of {}", one.reference()),
                many => format!("Explanation of {} verses", many.len()),
            },
            AiMode::CrossReference { verse } => format!("Cross references for {}", verse.reference()),
        }
    }

    /// Multi-verse explanations wait for a question before calling the gateway
    fn request(&self) -> Option<FlowRequest> {
        match self {
            AiMode::PassageSummary { passage_text, .. } => {
                Some(FlowRequest::PassageSummary(PassageSummaryInput {
                    passage_text: passage_text.clone(),
                }))
            }
            AiMode::VerseExplanation { verses, question } => {
                if verses.is_empty() || (verses.len() > 1 && question.is_none()) {
                    return None;
                }
                Some(FlowRequest::VerseExplanation(VerseExplanationInput::for_verses(
                    verses,
                    question.as_deref(),
                )))
            }
            AiMode::CrossReference { verse } => {
                Some(FlowRequest::CrossReference(CrossReferenceInput::from(verse)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStatus {
    Idle,
    Loading,
    Ready(FlowResponse),
    Failed(String),
}

impl FlowStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, FlowStatus::Loading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelPayload {
    Ai { mode: AiMode, status: FlowStatus },
    Annotations { tab: AnnotationKind },
    Search { term: String, status: FlowStatus },
    Library { filter: String },
}

impl PanelPayload {
    pub fn key(&self) -> PanelKey {
        match self {
            PanelPayload::Ai { .. } => PanelKey::Ai,
            PanelPayload::Annotations { .. } => PanelKey::Annotations,
            PanelPayload::Search { .. } => PanelKey::Search,
            PanelPayload::Library { .. } => PanelKey::Library,
        }
    }

    pub fn status(&self) -> Option<&FlowStatus> {
        match self {
            PanelPayload::Ai { status, .. } | PanelPayload::Search { status, .. } => Some(status),
            _ => None,
        }
    }

    fn status_mut(&mut self) -> Option<&mut FlowStatus> {
        match self {
            PanelPayload::Ai { status, .. } | PanelPayload::Search { status, .. } => Some(status),
            _ => None,
        }
    }

    fn request(&self) -> Option<FlowRequest> {
        match self {
            PanelPayload::Ai { mode, .. } => mode.request(),
            PanelPayload::Search { term, .. } => {
                let keyword = term.trim();
                (!keyword.is_empty()).then(|| {
                    FlowRequest::KeywordSearch(KeywordSearchInput {
                        keyword: keyword.to_string(),
                    })
                })
            }
            _ => None,
        }
    }
}

/// Generation a gateway call was dispatched under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// A gateway call the caller must run and hand back via [`PanelCoordinator::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: FlowRequest,
}

#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub flow: &'static str,
    pub failure_message: &'static str,
    pub result: Result<FlowResponse, GatewayError>,
}

/// Run a dispatched request against the gateway
pub async fn run_dispatch(gateway: &dyn FlowGateway, dispatch: Dispatch) -> Completion {
    let result = gateway.run(&dispatch.request).await;
    Completion {
        ticket: dispatch.ticket,
        flow: dispatch.request.name(),
        failure_message: dispatch.request.failure_message(),
        result,
    }
}

#[derive(Debug, Default)]
pub struct PanelCoordinator {
    active: Option<PanelPayload>,
    generation: u64,
    policy: NavigationPolicy,
}

impl PanelCoordinator {
    pub fn new(policy: NavigationPolicy) -> Self {
        Self {
            active: None,
            generation: 0,
            policy,
        }
    }

    pub fn active(&self) -> Option<&PanelPayload> {
        self.active.as_ref()
    }

    pub fn key(&self) -> Option<PanelKey> {
        self.active.as_ref().map(PanelPayload::key)
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace whatever is open. Returns the gateway call to run, if the
    /// payload needs one.
    pub fn open(&mut self, mut payload: PanelPayload) -> Option<Dispatch> {
        self.generation += 1;
        let request = payload.request();
        if let (Some(status), true) = (payload.status_mut(), request.is_some()) {
            *status = FlowStatus::Loading;
        }
        debug!(panel = ?payload.key(), generation = self.generation, "panel opened");
        self.active = Some(payload);

        request.map(|request| self.dispatch(request))
    }

    pub fn open_ai(&mut self, mode: AiMode) -> Option<Dispatch> {
        self.open(PanelPayload::Ai {
            mode,
            status: FlowStatus::Idle,
        })
    }

    pub fn open_search(&mut self, term: &str) -> Option<Dispatch> {
        self.open(PanelPayload::Search {
            term: term.trim().to_string(),
            status: FlowStatus::Idle,
        })
    }

    pub fn open_annotations(&mut self, tab: AnnotationKind) -> Option<Dispatch> {
        self.open(PanelPayload::Annotations { tab })
    }

    pub fn open_library(&mut self) -> Option<Dispatch> {
        self.open(PanelPayload::Library {
            filter: String::new(),
        })
    }

    /// Close unconditionally. Any call still in flight becomes stale.
    pub fn close(&mut self) {
        self.generation += 1;
        if let Some(payload) = self.active.take() {
            debug!(panel = ?payload.key(), generation = self.generation, "panel closed");
        }
    }

    /// The reader moved to another book, chapter or verse. Returns true if
    /// that closed the panel.
    pub fn on_navigate(&mut self) -> bool {
        if self.policy == NavigationPolicy::Close && self.active.is_some() {
            self.close();
            return true;
        }
        false
    }

    /// Ask a follow-up question in a verse explanation panel
    pub fn ask(&mut self, question: &str) -> Option<Dispatch> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        match self.active.as_mut() {
            Some(PanelPayload::Ai {
                mode: AiMode::VerseExplanation { question: q, .. },
                ..
            }) => {
                *q = Some(question.to_string());
            }
            _ => return None,
        }
        self.redispatch()
    }

    /// Re-run the open panel's flow, typically after a failure
    pub fn retry(&mut self) -> Option<Dispatch> {
        self.redispatch()
    }

    fn redispatch(&mut self) -> Option<Dispatch> {
        let payload = self.active.as_mut()?;
        let request = payload.request()?;
        if let Some(status) = payload.status_mut() {
            *status = FlowStatus::Loading;
        }
        self.generation += 1;
        Some(self.dispatch(request))
    }

    fn dispatch(&self, request: FlowRequest) -> Dispatch {
        debug!(flow = request.name(), generation = self.generation, "dispatching flow");
        Dispatch {
            ticket: Ticket {
                generation: self.generation,
            },
            request,
        }
    }

    /// Apply a finished gateway call. Returns false when the result was
    /// stale and has been discarded.
    pub fn resolve(&mut self, completion: Completion) -> bool {
        if completion.ticket.generation != self.generation {
            warn!(
                flow = completion.flow,
                dispatched = completion.ticket.generation,
                current = self.generation,
                "discarding stale flow result"
            );
            return false;
        }

        let Some(status) = self.active.as_mut().and_then(PanelPayload::status_mut) else {
            return false;
        };
        if !status.is_loading() {
            return false;
        }

        *status = match completion.result {
            Ok(response) => FlowStatus::Ready(response),
            Err(err) => {
                debug!(flow = completion.flow, error = %err, "flow result is a failure");
                FlowStatus::Failed(completion.failure_message.to_string())
            }
        };
        true
    }

    pub fn set_library_filter(&mut self, value: &str) {
        if let Some(PanelPayload::Library { filter }) = self.active.as_mut() {
            *filter = value.to_string();
        }
    }

    pub fn set_annotation_tab(&mut self, kind: AnnotationKind) {
        if let Some(PanelPayload::Annotations { tab }) = self.active.as_mut() {
            *tab = kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::flows::{
        CrossReference, CrossReferenceOutput, KeywordSearchOutput, PassageSummaryOutput,
        VerseExplanationOutput,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every flow with a canned response, or fails every call
    struct ScriptedGateway {
        fail: bool,
        seen: Mutex<Vec<FlowRequest>>,
    }

    impl ScriptedGateway {
        fn ok() -> Self {
            Self { fail: false, seen: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { fail: true, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl FlowGateway for ScriptedGateway {
        async fn run(&self, request: &FlowRequest) -> Result<FlowResponse, GatewayError> {
            self.seen.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(GatewayError::Timeout);
            }
            Ok(match request {
                FlowRequest::PassageSummary(_) => FlowResponse::PassageSummary(PassageSummaryOutput {
                    summary: "Creation".into(),
                }),
                FlowRequest::VerseExplanation(_) => {
                    FlowResponse::VerseExplanation(VerseExplanationOutput {
                        explanation: "The Word is Christ".into(),
                    })
                }
                FlowRequest::KeywordSearch(_) => FlowResponse::KeywordSearch(KeywordSearchOutput {
                    verses: Vec::new(),
                    summary: "Love".into(),
                }),
                FlowRequest::CrossReference(input) => {
                    FlowResponse::CrossReference(CrossReferenceOutput {
                        cross_references: vec![CrossReference {
                            book: "Genesis".into(),
                            chapter: 1,
                            verse_number: 1,
                            text: "In the beginning God created the heaven and the earth.".into(),
                            connection: format!("Echoes {}", input.book_name),
                        }],
                        original_verse_context: "The eternal Word".into(),
                    })
                }
            })
        }
    }

    fn verse(book: &str, chapter: u32, number: u32, text: &str) -> Verse {
        Verse {
            book_name: book.into(),
            chapter,
            verse: number,
            text: text.into(),
        }
    }

    fn john_1_1() -> Verse {
        verse("John", 1, 1, "In the beginning was the Word, and the Word was with God, and the Word was God.")
    }

    #[tokio::test]
    async fn test_cross_reference_closed_before_response_stays_closed() {
        let gateway = ScriptedGateway::ok();
        let mut panels = PanelCoordinator::default();

        let dispatch = panels
            .open_ai(AiMode::CrossReference { verse: john_1_1() })
            .expect("cross reference dispatches immediately");
        assert_eq!(panels.key(), Some(PanelKey::Ai));

        panels.close();
        let completion = run_dispatch(&gateway, dispatch).await;
        assert!(completion.result.is_ok());

        assert!(!panels.resolve(completion));
        assert_eq!(panels.active(), None);
    }

    #[tokio::test]
    async fn test_reopened_panel_ignores_earlier_response() {
        let gateway = ScriptedGateway::ok();
        let mut panels = PanelCoordinator::default();

        let first = panels.open_ai(AiMode::CrossReference { verse: john_1_1() }).unwrap();
        let genesis = verse("Genesis", 1, 1, "In the beginning God created the heaven and the earth.");
        let second = panels.open_ai(AiMode::CrossReference { verse: genesis }).unwrap();

        let (newer, older) = tokio::join!(run_dispatch(&gateway, second), run_dispatch(&gateway, first));
        assert!(!panels.resolve(older));
        assert!(panels.resolve(newer));

        match panels.active() {
            Some(PanelPayload::Ai { status: FlowStatus::Ready(FlowResponse::CrossReference(out)), .. }) => {
                assert_eq!(out.cross_references[0].connection, "Echoes Genesis");
            }
            other => panic!("unexpected panel state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_is_shown_and_retryable() {
        let mut panels = PanelCoordinator::default();
        let dispatch = panels
            .open_ai(AiMode::PassageSummary {
                title: "Genesis 1".into(),
                passage_text: "In the beginning".into(),
            })
            .unwrap();

        let completion = run_dispatch(&ScriptedGateway::failing(), dispatch).await;
        assert!(panels.resolve(completion));
        assert_eq!(
            panels.active().and_then(PanelPayload::status),
            Some(&FlowStatus::Failed("Failed to summarize passage. Please try again.".into()))
        );

        let retry = panels.retry().expect("retry re-dispatches");
        assert_eq!(panels.active().and_then(PanelPayload::status), Some(&FlowStatus::Loading));
        assert!(panels.resolve(run_dispatch(&ScriptedGateway::ok(), retry).await));
        assert!(matches!(
            panels.active().and_then(PanelPayload::status),
            Some(FlowStatus::Ready(FlowResponse::PassageSummary(_)))
        ));
    }

    #[tokio::test]
    async fn test_multi_verse_explanation_waits_for_question() {
        let gateway = ScriptedGateway::ok();
        let mut panels = PanelCoordinator::default();
        let verses = vec![john_1_1(), verse("John", 1, 2, "The same was in the beginning with God.")];

        assert!(panels
            .open_ai(AiMode::VerseExplanation { verses, question: None })
            .is_none());
        assert_eq!(panels.active().and_then(PanelPayload::status), Some(&FlowStatus::Idle));
        assert!(panels.ask("   ").is_none());

        let dispatch = panels.ask("Who is the Word?").unwrap();
        assert!(panels.resolve(run_dispatch(&gateway, dispatch).await));

        let seen = gateway.seen.lock().unwrap();
        match &seen[0] {
            FlowRequest::VerseExplanation(input) => {
                assert_eq!(input.question.as_deref(), Some("Who is the Word?"));
                assert_eq!(input.verse.lines().count(), 2);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_single_verse_explanation_dispatches_immediately() {
        let mut panels = PanelCoordinator::default();
        let dispatch = panels
            .open_ai(AiMode::VerseExplanation { verses: vec![john_1_1()], question: None })
            .unwrap();
        assert_eq!(dispatch.request.name(), "verseExplanation");
    }

    #[test]
    fn test_search_needs_a_term() {
        let mut panels = PanelCoordinator::default();
        assert!(panels.open_search("  ").is_none());
        assert_eq!(panels.key(), Some(PanelKey::Search));

        let dispatch = panels.open_search(" love ").unwrap();
        assert_eq!(
            dispatch.request,
            FlowRequest::KeywordSearch(KeywordSearchInput { keyword: "love".into() })
        );
    }

    #[test]
    fn test_open_replaces_without_stacking() {
        let mut panels = PanelCoordinator::default();
        panels.open_library();
        panels.set_library_filter("logos");
        panels.open_annotations(AnnotationKind::Bookmark);
        panels.set_annotation_tab(AnnotationKind::Note);
        panels.set_library_filter("ignored");

        assert_eq!(
            panels.active(),
            Some(&PanelPayload::Annotations { tab: AnnotationKind::Note })
        );
        panels.close();
        assert!(!panels.is_open());
    }

    #[test]
    fn test_navigation_policy() {
        let mut keep = PanelCoordinator::new(NavigationPolicy::KeepOpen);
        keep.open_search("light");
        assert!(!keep.on_navigate());
        assert_eq!(keep.key(), Some(PanelKey::Search));

        let mut close = PanelCoordinator::new(NavigationPolicy::Close);
        close.open_search("light");
        assert!(close.on_navigate());
        assert!(!close.is_open());
        assert!(!close.on_navigate());
    }

    #[tokio::test]
    async fn test_navigation_under_close_policy_discards_pending_result() {
        let mut panels = PanelCoordinator::new(NavigationPolicy::Close);
        let dispatch = panels.open_search("light").unwrap();
        panels.on_navigate();
        assert!(!panels.resolve(run_dispatch(&ScriptedGateway::ok(), dispatch).await));
    }

    #[test]
    fn test_ask_outside_explanation_is_ignored() {
        let mut panels = PanelCoordinator::default();
        panels.open_ai(AiMode::CrossReference { verse: john_1_1() });
        let generation = panels.generation();
        assert!(panels.ask("Why?").is_none());
        assert_eq!(panels.generation(), generation);
    }
}
