//! Sticky-notes board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ProfitdashError, Result},
    subscription::UserId,
};

const MAX_TITLE_CHARS: usize = 100;
const MAX_BODY_CHARS: usize = 2000;

/// Color of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteColor {
    /// Yellow.
    #[default]
    Yellow,
    /// Pink.
    Pink,
    /// Blue.
    Blue,
    /// Green.
    Green,
    /// Purple.
    Purple,
}

/// A sticky note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Note ID.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Title, 1-100 characters.
    pub title: String,
    /// Body, up to 2000 characters.
    pub body: String,
    /// Color.
    pub color: NoteColor,
    /// Pinned notes sort first.
    pub pinned: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Input for a new note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    /// Title.
    pub title: String,
    /// Body.
    #[serde(default)]
    pub body: String,
    /// Color, yellow when omitted.
    #[serde(default)]
    pub color: NoteColor,
    /// Pinned flag.
    #[serde(default)]
    pub pinned: bool,
}

impl NewNote {
    /// Validates the input and builds the note.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] if the title or body is out of bounds.
    pub fn into_note(self, user_id: UserId, now: DateTime<Utc>) -> Result<Note> {
        let title = validate_title(&self.title)?;
        validate_body(&self.body)?;
        Ok(Note {
            id: Uuid::new_v4(),
            user_id,
            title,
            body: self.body,
            color: self.color,
            pinned: self.pinned,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a note. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New body.
    #[serde(default)]
    pub body: Option<String>,
    /// New color.
    #[serde(default)]
    pub color: Option<NoteColor>,
    /// New pinned flag.
    #[serde(default)]
    pub pinned: Option<bool>,
}

impl NoteUpdate {
    /// Applies the update. The note is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] if the update is empty or a field
    /// is out of bounds.
    pub fn apply(self, note: &mut Note, now: DateTime<Utc>) -> Result<()> {
        if self.title.is_none() && self.body.is_none() && self.color.is_none() && self.pinned.is_none()
        {
            return Err(ProfitdashError::Validation("nothing to update".into()));
        }
        let title = self.title.as_deref().map(validate_title).transpose()?;
        if let Some(body) = &self.body {
            validate_body(body)?;
        }

        if let Some(title) = title {
            note.title = title;
        }
        if let Some(body) = self.body {
            note.body = body;
        }
        if let Some(color) = self.color {
            note.color = color;
        }
        if let Some(pinned) = self.pinned {
            note.pinned = pinned;
        }
        note.updated_at = now;
        Ok(())
    }
}

/// Orders a board: pinned notes first, then newest first.
pub fn sort_board(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.pinned.cmp(&a.pinned).then_with(|| b.created_at.cmp(&a.created_at)));
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ProfitdashError::Validation("title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ProfitdashError::Validation(format!(
            "title must be {MAX_TITLE_CHARS} characters or less"
        )));
    }
    Ok(title.to_owned())
}

fn validate_body(body: &str) -> Result<()> {
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ProfitdashError::Validation(format!(
            "body must be {MAX_BODY_CHARS} characters or less"
        )));
    }
    Ok(())
}
