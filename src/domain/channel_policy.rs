use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::notification::NotificationKind;

pub const DEFAULT_DAILY_LIMIT: u32 = 2;
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// Per-user delivery preferences, owned by the user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelPolicy {
    pub allow_push: bool,
    pub daily_limit: u32,
    pub quiet_hours: QuietHours,
    pub categories: CategoryPolicy,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            allow_push: true,
            daily_limit: DEFAULT_DAILY_LIMIT,
            quiet_hours: QuietHours::default(),
            categories: CategoryPolicy::default(),
        }
    }
}

/// "HH:MM" bounds anchored to an IANA zone. Empty bounds disable the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
    pub time_zone: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: String::new(),
            end: String::new(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}

/// Opt-in/opt-out per kind. Kinds without an explicit entry fall back to
/// `default_allowed`, so newly introduced kinds reach existing users.
///
/// Stored as a JSON object keyed by kind name; unknown keys are dropped on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, bool>", into = "HashMap<String, bool>")]
pub struct CategoryPolicy {
    overrides: HashMap<NotificationKind, bool>,
    default_allowed: bool,
}

impl Default for CategoryPolicy {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            default_allowed: true,
        }
    }
}

impl CategoryPolicy {
    pub fn is_allowed(&self, kind: NotificationKind) -> bool {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or(self.default_allowed)
    }

    pub fn set(&mut self, kind: NotificationKind, allowed: bool) {
        self.overrides.insert(kind, allowed);
    }

    pub fn with(mut self, kind: NotificationKind, allowed: bool) -> Self {
        self.set(kind, allowed);
        self
    }
}

impl From<HashMap<String, bool>> for CategoryPolicy {
    fn from(raw: HashMap<String, bool>) -> Self {
        let mut policy = CategoryPolicy::default();
        for (name, allowed) in raw {
            match name.parse::<NotificationKind>() {
                Ok(kind) => policy.set(kind, allowed),
                Err(_) => tracing::debug!(category = %name, "ignoring unknown notification category"),
            }
        }
        policy
    }
}

impl From<CategoryPolicy> for HashMap<String, bool> {
    fn from(policy: CategoryPolicy) -> Self {
        policy
            .overrides
            .into_iter()
            .map(|(kind, allowed)| (kind.as_str().to_string(), allowed))
            .collect()
    }
}
