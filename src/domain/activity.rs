use std::fmt;

use serde::{Deserialize, Serialize};

/// User actions the campaign rules look back over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Memo,
    ReadingSession,
    FlashcardReview,
}

impl ActivityKind {
    pub fn table(&self) -> &'static str {
        match self {
            ActivityKind::Memo => "memos",
            ActivityKind::ReadingSession => "reading_sessions",
            ActivityKind::FlashcardReview => "flashcard_reviews",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::Memo => "memo",
            ActivityKind::ReadingSession => "reading_session",
            ActivityKind::FlashcardReview => "flashcard_review",
        };
        f.write_str(name)
    }
}
