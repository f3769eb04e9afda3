//! Supported survey languages.

use serde::{Deserialize, Serialize};

/// A language the survey can be taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lang {
    Ru,
    Uz,
}

impl Lang {
    /// Every supported language, in display order.
    pub const ALL: [Lang; 2] = [Lang::Ru, Lang::Uz];

    /// Short tag used in callback payloads and the `lang` column.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::Uz => "uz",
        }
    }

    /// Parse a tag. Exact match only.
    pub fn from_tag(tag: &str) -> Option<Lang> {
        Self::ALL.into_iter().find(|lang| lang.tag() == tag)
    }
}

impl Default for Lang {
    fn default() -> Self {
        Self::Ru
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
