//! Error types for the core library.
//!
//! Not-found conditions are modelled as `Option`s by the stores and never
//! show up here.

use thiserror::Error;

use crate::annotations::AnnotationKind;
use crate::scripture::VerseRef;

/// Failure reading or writing the durable annotation slot
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("annotation data is corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("could not determine data directory")]
    NoDataDir,

    #[error("{0}")]
    Unavailable(String),
}

/// A rejected annotation mutation
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("note text must not be empty")]
    EmptyNote,

    #[error("{verse} already has a {kind}")]
    Duplicate { verse: VerseRef, kind: AnnotationKind },

    #[error("annotation {0} is not a note")]
    NotANote(String),

    #[error("annotations could not be saved: {0}")]
    Persistence(#[from] StorageError),
}

impl AnnotationError {
    /// Validation rejections are user mistakes, not system failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnnotationError::EmptyNote
                | AnnotationError::Duplicate { .. }
                | AnnotationError::NotANote(_)
        )
    }
}

/// Failure of a call to the AI flow gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("model returned malformed output for {flow}: {source}")]
    MalformedOutput {
        flow: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        let dup = AnnotationError::Duplicate {
            verse: VerseRef::new("Genesis", 1, 1),
            kind: AnnotationKind::Bookmark,
        };
        assert!(dup.is_validation());
        assert!(AnnotationError::EmptyNote.is_validation());

        let persist = AnnotationError::Persistence(StorageError::Unavailable("disk full".into()));
        assert!(!persist.is_validation());
    }

    #[test]
    fn test_duplicate_message_names_verse_and_kind() {
        let dup = AnnotationError::Duplicate {
            verse: VerseRef::new("John", 1, 14),
            kind: AnnotationKind::Highlight,
        };
        assert_eq!(dup.to_string(), "John 1:14 already has a highlight");
    }
}
