use time::Duration;

use crate::domain::activity::ActivityKind;
use crate::domain::notification::NotificationKind;

/// What the lookback count must satisfy for a rule to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// No qualifying actions in the window.
    Absent,
    /// At least this many qualifying actions in the window.
    AtLeast(i64),
}

impl Condition {
    pub fn is_met(&self, count: i64) -> bool {
        match self {
            Condition::Absent => count == 0,
            Condition::AtLeast(min) => count >= *min,
        }
    }
}

/// A scheduled engagement trigger evaluated once per user per campaign run.
#[derive(Debug, Clone)]
pub struct NudgeRule {
    pub kind: NotificationKind,
    pub activity: ActivityKind,
    pub lookback: Duration,
    pub condition: Condition,
    /// Skip the rule if a notification of `kind` already exists today.
    pub once_per_day: bool,
    pub message: &'static str,
}

/// Rules run by the campaign job
pub fn default_rules() -> Vec<NudgeRule> {
    vec![
        NudgeRule {
            kind: NotificationKind::MemoNudge,
            activity: ActivityKind::Memo,
            lookback: Duration::hours(24),
            condition: Condition::Absent,
            once_per_day: true,
            message: "No memos since yesterday. Jot down one line from what you're reading.",
        },
        NudgeRule {
            kind: NotificationKind::TsNudge,
            activity: ActivityKind::ReadingSession,
            lookback: Duration::hours(48),
            condition: Condition::Absent,
            once_per_day: true,
            message: "It's been two days since your last reading session. Ten minutes is enough.",
        },
        NudgeRule {
            kind: NotificationKind::ZengoNudge,
            activity: ActivityKind::FlashcardReview,
            lookback: Duration::hours(72),
            condition: Condition::Absent,
            once_per_day: true,
            message: "Your flashcards are due. A short review keeps them fresh.",
        },
        NudgeRule {
            kind: NotificationKind::SummarySuggestion,
            activity: ActivityKind::Memo,
            lookback: Duration::days(7),
            condition: Condition::AtLeast(5),
            once_per_day: true,
            message: "You wrote plenty of memos this week. Turn them into a summary?",
        },
    ]
}
