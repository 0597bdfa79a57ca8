pub mod ai;
pub mod annotations;
pub mod config;
pub mod error;
mod kjv;
pub mod lexicon;
pub mod notice;
pub mod panel;
pub mod provider;
pub mod scripture;
pub mod selection;
pub mod storage;

// Re-export main types for convenience
pub use ai::{FlowGateway, FlowRequest, FlowResponse, LlmClient, LlmGateway, UnconfiguredGateway};
pub use annotations::{Annotation, AnnotationKind, AnnotationStore, PersistencePolicy};
pub use config::Config;
pub use error::{AnnotationError, GatewayError, StorageError};
pub use lexicon::{Lexicon, LexiconEntry};
pub use notice::{Notice, NoticeLevel, Notices};
pub use panel::{AiMode, Completion, Dispatch, FlowStatus, NavigationPolicy, PanelCoordinator, PanelKey, PanelPayload};
pub use provider::Provider;
pub use scripture::{Book, Chapter, Corpus, ParsedReference, Verse, VerseRef};
pub use selection::{Reader, Selection, SelectionState};
pub use storage::{AnnotationSlot, MemorySlot, SqliteSlot};
