//! Survey step machine: the fixed, linear order of questions.

use serde::{Deserialize, Serialize};

use super::text::OptionSet;

/// The steps of the survey.
///
/// Progresses linearly: ChooseLanguage → Interest → Values → Pains →
/// Expectations → Contact. There is no terminal variant: a finished or
/// cancelled session is cleared from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ChooseLanguage,
    Interest,
    Values,
    Pains,
    Expectations,
    Contact,
}

/// What kind of input a step accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// One of the supported language tags.
    Language,
    /// Exactly one label from the option set, typed or tapped on a reply keyboard.
    SingleChoice(OptionSet),
    /// Zero or more options toggled on an inline checklist.
    MultiChoice {
        options: OptionSet,
        /// Whether a free-text "other" entry is offered.
        other: bool,
        /// Whether the checklist is hidden behind an "open" button first.
        open_first: bool,
    },
    /// A phone number or handle, typed or shared.
    Contact,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::ChooseLanguage,
        Step::Interest,
        Step::Values,
        Step::Pains,
        Step::Expectations,
        Step::Contact,
    ];

    /// Get the next step, or `None` after the last question.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            ChooseLanguage => Some(Interest),
            Interest => Some(Values),
            Values => Some(Pains),
            Pains => Some(Expectations),
            Expectations => Some(Contact),
            Contact => None,
        }
    }

    pub fn input_kind(&self) -> InputKind {
        match self {
            Self::ChooseLanguage => InputKind::Language,
            Self::Interest => InputKind::SingleChoice(OptionSet::Interest),
            Self::Values => InputKind::MultiChoice {
                options: OptionSet::Values,
                other: false,
                open_first: true,
            },
            Self::Pains => InputKind::MultiChoice {
                options: OptionSet::Pains,
                other: true,
                open_first: false,
            },
            Self::Expectations => InputKind::MultiChoice {
                options: OptionSet::Expectations,
                other: true,
                open_first: false,
            },
            Self::Contact => InputKind::Contact,
        }
    }

    /// Callback payload prefix for multi-choice steps.
    pub fn callback_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Values => Some("vals"),
            Self::Pains => Some("pain"),
            Self::Expectations => Some("exp"),
            _ => None,
        }
    }

    /// Inverse of [`Step::callback_prefix`].
    pub fn from_callback_prefix(prefix: &str) -> Option<Step> {
        Self::ALL
            .into_iter()
            .find(|step| step.callback_prefix() == Some(prefix))
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::ChooseLanguage
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ChooseLanguage => "choose_language",
            Self::Interest => "interest",
            Self::Values => "values",
            Self::Pains => "pains",
            Self::Expectations => "expectations",
            Self::Contact => "contact",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_steps() {
        let mut current = Step::default();
        let mut visited = vec![current];
        while let Some(next) = current.next() {
            visited.push(next);
            current = next;
        }
        assert_eq!(visited, Step::ALL.to_vec());
        assert_eq!(current, Step::Contact);
    }

    #[test]
    fn callback_prefixes_round_trip() {
        for step in Step::ALL {
            if let Some(prefix) = step.callback_prefix() {
                assert_eq!(Step::from_callback_prefix(prefix), Some(step));
                assert!(matches!(step.input_kind(), InputKind::MultiChoice { .. }));
            }
        }
        assert_eq!(Step::from_callback_prefix("lang"), None);
    }

    #[test]
    fn only_values_needs_open_and_lacks_other() {
        for step in Step::ALL {
            if let InputKind::MultiChoice { other, open_first, .. } = step.input_kind() {
                assert_eq!(open_first, step == Step::Values);
                assert_eq!(other, step != Step::Values);
            }
        }
    }

    #[test]
    fn display_matches_serde() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json, "mismatch for {step:?}");
        }
    }
}
