//! Bookmarks, highlights and notes attached to verses.
//!
//! The [`AnnotationStore`] owns the whole collection and persists it as a
//! single JSON array to an [`AnnotationSlot`] after every mutation. At most
//! one bookmark and one highlight may exist per verse; notes are unlimited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AnnotationError, StorageError};
use crate::notice::{Notice, Notices};
use crate::scripture::VerseRef;
use crate::storage::AnnotationSlot;

/// Highlight palette as (name, css colour)
pub const HIGHLIGHT_COLORS: [(&str, &str); 5] = [
    ("Yellow", "rgba(255, 243, 128, 0.5)"),
    ("Blue", "rgba(173, 216, 230, 0.5)"),
    ("Green", "rgba(144, 238, 144, 0.5)"),
    ("Pink", "rgba(255, 192, 203, 0.5)"),
    ("Purple", "rgba(221, 160, 221, 0.5)"),
];

pub fn default_highlight_color() -> &'static str {
    HIGHLIGHT_COLORS[0].1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Bookmark,
    Highlight,
    Note,
}

impl AnnotationKind {
    pub fn all() -> [AnnotationKind; 3] {
        [
            AnnotationKind::Bookmark,
            AnnotationKind::Highlight,
            AnnotationKind::Note,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Bookmark => "bookmark",
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Note => "note",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnnotationKind::Bookmark => "Bookmark",
            AnnotationKind::Highlight => "Highlight",
            AnnotationKind::Note => "Note",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            AnnotationKind::Bookmark => "bookmarked",
            AnnotationKind::Highlight => "highlighted",
            AnnotationKind::Note => "annotated",
        }
    }

    /// Bookmarks and highlights are unique per verse
    pub fn is_unique_per_verse(&self) -> bool {
        !matches!(self, AnnotationKind::Note)
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    fn new(verse: &VerseRef, kind: AnnotationKind, note_text: Option<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            book_name: verse.book_name.clone(),
            chapter: verse.chapter,
            verse: verse.verse,
            kind,
            note_text,
            color,
            created_at: Utc::now(),
        }
    }

    pub fn reference(&self) -> VerseRef {
        VerseRef::new(self.book_name.clone(), self.chapter, self.verse)
    }

    pub fn is_for(&self, verse: &VerseRef) -> bool {
        self.book_name == verse.book_name && self.chapter == verse.chapter && self.verse == verse.verse
    }
}

/// What happens to an in-memory mutation whose durable write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Keep the change for this session and warn that it may not survive a restart
    #[default]
    BestEffort,
    /// Roll the change back and report the failure
    FailClosed,
}

pub struct AnnotationStore<S: AnnotationSlot> {
    slot: S,
    annotations: Vec<Annotation>,
    policy: PersistencePolicy,
    notices: Notices,
    persistence_warned: bool,
    degraded: bool,
}

impl<S: AnnotationSlot> AnnotationStore<S> {
    /// Read the slot. Unreadable or corrupted data never fails the store: it
    /// starts empty, queues a warning and stops writing to the slot for the
    /// rest of the session so the stored data is left as it was.
    pub fn load(slot: S, policy: PersistencePolicy) -> Self {
        let mut notices = Notices::default();

        let (annotations, degraded) = match slot.read().and_then(|raw| parse_collection(raw.as_deref())) {
            Ok(annotations) => (annotations, false),
            Err(err) => {
                warn!(error = %err, "failed to load annotations, keeping changes in memory only");
                notices.push(Notice::error(
                    "Error",
                    "Could not load your annotations. They might be corrupted. Changes made now will not be saved.",
                ));
                (Vec::new(), true)
            }
        };

        let annotations = drop_duplicates(repair_records(annotations));
        info!(count = annotations.len(), degraded, "annotations loaded");

        Self {
            slot,
            annotations,
            policy,
            notices,
            persistence_warned: false,
            degraded,
        }
    }

    /// True when the slot could not be read and nothing is written back
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut S {
        &mut self.slot
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn find(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn find_for_verse(&self, verse: &VerseRef) -> Vec<&Annotation> {
        self.annotations.iter().filter(|a| a.is_for(verse)).collect()
    }

    pub fn find_kind_for_verse(&self, verse: &VerseRef, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.kind == kind && a.is_for(verse))
    }

    /// Most recent first; equal timestamps keep the later insertion first
    pub fn find_by_kind(&self, kind: AnnotationKind) -> Vec<&Annotation> {
        let mut found: Vec<&Annotation> = self
            .annotations
            .iter()
            .rev()
            .filter(|a| a.kind == kind)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub fn add(
        &mut self,
        verse: &VerseRef,
        kind: AnnotationKind,
        note_text: Option<&str>,
        color: Option<&str>,
    ) -> Result<Annotation, AnnotationError> {
        let note_text = match kind {
            AnnotationKind::Note => {
                let text = note_text.map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    self.notices.push(Notice::warning(
                        "Note is empty",
                        "Please write something in your note.",
                    ));
                    return Err(AnnotationError::EmptyNote);
                }
                Some(text.to_string())
            }
            _ => None,
        };

        if kind.is_unique_per_verse() && self.find_kind_for_verse(verse, kind).is_some() {
            debug!(%verse, %kind, "rejected duplicate annotation");
            self.notices.push(Notice::info(
                format!("{} already exists", kind.title()),
                format!("Verse {} is already {}.", verse, kind.past_tense()),
            ));
            return Err(AnnotationError::Duplicate {
                verse: verse.clone(),
                kind,
            });
        }

        let color = match kind {
            AnnotationKind::Highlight => Some(color.unwrap_or(default_highlight_color()).to_string()),
            _ => None,
        };

        let annotation = Annotation::new(verse, kind, note_text, color);
        let added = annotation.clone();
        self.apply(move |all| all.push(annotation))?;

        info!(id = %added.id, %verse, %kind, "annotation added");
        self.notices.push(Notice::info(
            format!("{} added", kind.title()),
            format!("Verse {} has been {}.", verse, kind.past_tense()),
        ));
        Ok(added)
    }

    pub fn bookmark(&mut self, verse: &VerseRef) -> Result<Annotation, AnnotationError> {
        self.add(verse, AnnotationKind::Bookmark, None, None)
    }

    pub fn highlight(&mut self, verse: &VerseRef, color: &str) -> Result<Annotation, AnnotationError> {
        self.add(verse, AnnotationKind::Highlight, None, Some(color))
    }

    pub fn add_note(&mut self, verse: &VerseRef, text: &str) -> Result<Annotation, AnnotationError> {
        self.add(verse, AnnotationKind::Note, Some(text), None)
    }

    /// Returns the removed annotation, or `None` when the id is unknown
    pub fn remove(&mut self, id: &str) -> Result<Option<Annotation>, AnnotationError> {
        let Some(idx) = self.annotations.iter().position(|a| a.id == id) else {
            debug!(id, "remove: annotation not found");
            return Ok(None);
        };

        let removed = self.apply(move |all| all.remove(idx))?;

        info!(id, kind = %removed.kind, "annotation removed");
        self.notices.push(Notice::info(
            "Annotation removed",
            "The annotation has been removed.",
        ));
        Ok(Some(removed))
    }

    /// Edit a note in place, keeping its id and creation time
    pub fn update_note_text(
        &mut self,
        id: &str,
        new_text: &str,
    ) -> Result<Option<Annotation>, AnnotationError> {
        let Some(idx) = self.annotations.iter().position(|a| a.id == id) else {
            debug!(id, "update: annotation not found");
            return Ok(None);
        };

        if self.annotations[idx].kind != AnnotationKind::Note {
            return Err(AnnotationError::NotANote(id.to_string()));
        }

        let text = new_text.trim();
        if text.is_empty() {
            self.notices.push(Notice::warning(
                "Note is empty",
                "Please enter some text for your note or cancel.",
            ));
            return Err(AnnotationError::EmptyNote);
        }

        let text = text.to_string();
        let updated = self.apply(move |all| {
            all[idx].note_text = Some(text);
            all[idx].clone()
        })?;

        info!(id, "note updated");
        self.notices.push(Notice::info(
            "Note updated",
            "Your note has been successfully updated.",
        ));
        Ok(Some(updated))
    }

    /// Add a bookmark, or remove the existing one. Returns the new bookmark
    /// when one was added.
    pub fn toggle_bookmark(&mut self, verse: &VerseRef) -> Result<Option<Annotation>, AnnotationError> {
        let existing = self
            .find_kind_for_verse(verse, AnnotationKind::Bookmark)
            .map(|a| a.id.clone());
        match existing {
            Some(id) => self.remove(&id).map(|_| None),
            None => self.bookmark(verse).map(Some),
        }
    }

    /// Replace any existing highlight on the verse with one in `color`. The
    /// swap is a single write.
    pub fn set_highlight(&mut self, verse: &VerseRef, color: &str) -> Result<Annotation, AnnotationError> {
        let Some(idx) = self
            .annotations
            .iter()
            .position(|a| a.kind == AnnotationKind::Highlight && a.is_for(verse))
        else {
            return self.highlight(verse, color);
        };
        if self.annotations[idx].color.as_deref() == Some(color) {
            return Ok(self.annotations[idx].clone());
        }

        let replacement = Annotation::new(verse, AnnotationKind::Highlight, None, Some(color.to_string()));
        let added = replacement.clone();
        let replaced = self.apply(move |all| {
            let old = all.remove(idx);
            all.push(replacement);
            old
        })?;

        info!(old = %replaced.id, new = %added.id, %verse, "highlight replaced");
        self.notices.push(Notice::info(
            "Highlight updated",
            format!("Verse {} has a new highlight colour.", verse),
        ));
        Ok(added)
    }

    pub fn clear_highlight(&mut self, verse: &VerseRef) -> Result<Option<Annotation>, AnnotationError> {
        let existing = self
            .find_kind_for_verse(verse, AnnotationKind::Highlight)
            .map(|a| a.id.clone());
        match existing {
            Some(id) => self.remove(&id),
            None => Ok(None),
        }
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(&self.annotations)?)
    }

    /// Mutate the collection, then write it out. Under `FailClosed` a failed
    /// write restores the previous collection.
    fn apply<T>(&mut self, mutate: impl FnOnce(&mut Vec<Annotation>) -> T) -> Result<T, AnnotationError> {
        let previous = match self.policy {
            PersistencePolicy::FailClosed => Some(self.annotations.clone()),
            PersistencePolicy::BestEffort => None,
        };

        let result = mutate(&mut self.annotations);

        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => {
                    warn!(error = %err, "annotation write failed, rolling back");
                    self.annotations = previous;
                    self.notices.push(Notice::error(
                        "Error",
                        "Could not save your annotations. The change was not applied.",
                    ));
                    return Err(AnnotationError::Persistence(err));
                }
                None => {
                    warn!(error = %err, "annotation write failed, keeping change in memory");
                    if !self.persistence_warned {
                        self.persistence_warned = true;
                        self.notices.push(Notice::error(
                            "Error",
                            "Could not save your annotations. Your changes might not persist.",
                        ));
                    }
                }
            }
        }

        Ok(result)
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        if self.degraded {
            debug!("slot unreadable at load, skipping write");
            return Ok(());
        }
        let json = self.to_json()?;
        self.slot.write(&json)
    }
}

fn parse_collection(raw: Option<&str>) -> Result<Vec<Annotation>, StorageError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(raw)?),
        _ => Ok(Vec::new()),
    }
}

/// Bring stored records in line with their kind: notes need text, highlights
/// need a colour, and neither field appears on any other kind. Notes without
/// text are dropped; the rest are repaired.
fn repair_records(annotations: Vec<Annotation>) -> Vec<Annotation> {
    annotations
        .into_iter()
        .filter_map(|mut a| {
            match a.kind {
                AnnotationKind::Note => {
                    if a.note_text.as_deref().map_or(true, |t| t.trim().is_empty()) {
                        warn!(id = %a.id, "dropping stored note without text");
                        return None;
                    }
                }
                AnnotationKind::Highlight if a.color.is_none() => {
                    warn!(id = %a.id, "stored highlight has no colour, using default");
                    a.color = Some(default_highlight_color().to_string());
                }
                _ => {}
            }
            if a.kind != AnnotationKind::Note && a.note_text.take().is_some() {
                warn!(id = %a.id, kind = %a.kind, "dropping note text from stored annotation");
            }
            if a.kind != AnnotationKind::Highlight && a.color.take().is_some() {
                warn!(id = %a.id, kind = %a.kind, "dropping colour from stored annotation");
            }
            Some(a)
        })
        .collect()
}

/// Keep the first bookmark and first highlight of each verse
fn drop_duplicates(annotations: Vec<Annotation>) -> Vec<Annotation> {
    let mut seen: HashSet<(VerseRef, AnnotationKind)> = HashSet::new();
    annotations
        .into_iter()
        .filter(|a| {
            if !a.kind.is_unique_per_verse() {
                return true;
            }
            let fresh = seen.insert((a.reference(), a.kind));
            if !fresh {
                warn!(id = %a.id, kind = %a.kind, "dropping duplicate stored annotation");
            }
            fresh
        })
        .collect()
}
