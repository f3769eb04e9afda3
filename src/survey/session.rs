//! Per-chat survey session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lang::Lang;
use super::multiselect::Selection;
use super::step::Step;

/// Answer slots. Serialized as snake_case map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKey {
    Interest,
    Values,
    Pains,
    PainsOther,
    Expectations,
    ExpectationsOther,
}

impl AnswerKey {
    /// Key holding the selected indices of a multi-choice step.
    pub fn selection_for(step: Step) -> Option<AnswerKey> {
        match step {
            Step::Values => Some(Self::Values),
            Step::Pains => Some(Self::Pains),
            Step::Expectations => Some(Self::Expectations),
            _ => None,
        }
    }

    /// Key holding the free-text "other" entry of a multi-choice step.
    pub fn other_for(step: Step) -> Option<AnswerKey> {
        match step {
            Step::Pains => Some(Self::PainsOther),
            Step::Expectations => Some(Self::ExpectationsOther),
            _ => None,
        }
    }
}

/// A stored answer: either a scalar string or a set of option indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Selection(Selection),
}

/// In-progress state of one chat's survey.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub step: Step,
    /// Chosen language; `None` until the first step is answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<Lang>,
    #[serde(default)]
    pub answers: BTreeMap<AnswerKey, Answer>,
    /// The next text message at the current step is the "other" entry.
    #[serde(default)]
    pub awaiting_other: bool,
}

impl Session {
    /// A fresh session at the first step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session language, defaulting before one is chosen.
    pub fn lang(&self) -> Lang {
        self.lang.unwrap_or_default()
    }

    /// Move to the next step. Returns an error at the last step.
    pub fn advance(&mut self) -> Result<Step, String> {
        let next = self
            .step
            .next()
            .ok_or_else(|| format!("No step after {}", self.step))?;
        self.step = next;
        self.awaiting_other = false;
        Ok(next)
    }

    pub fn text(&self, key: AnswerKey) -> Option<&str> {
        match self.answers.get(&key) {
            Some(Answer::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set_text(&mut self, key: AnswerKey, value: impl Into<String>) {
        self.answers.insert(key, Answer::Text(value.into()));
    }

    /// Stored selection for `key`, empty if nothing was toggled.
    pub fn selection(&self, key: AnswerKey) -> Selection {
        match self.answers.get(&key) {
            Some(Answer::Selection(sel)) => sel.clone(),
            _ => Selection::new(),
        }
    }

    /// Mutable selection for `key`, created empty on first use.
    pub fn selection_mut(&mut self, key: AnswerKey) -> &mut Selection {
        self.answers
            .entry(key)
            .or_insert_with(|| Answer::Selection(Selection::new()))
            .as_selection_mut()
    }
}

impl Answer {
    /// This answer as a selection. A text answer is replaced by an empty one.
    fn as_selection_mut(&mut self) -> &mut Selection {
        match self {
            Answer::Selection(sel) => sel,
            Answer::Text(_) => {
                *self = Answer::Selection(Selection::new());
                self.as_selection_mut()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_language() {
        let s = Session::new();
        assert_eq!(s.step, Step::ChooseLanguage);
        assert_eq!(s.lang, None);
        assert_eq!(s.lang(), Lang::Ru);
        assert!(s.answers.is_empty());
    }

    #[test]
    fn advance_walks_to_contact_then_fails() {
        let mut s = Session::new();
        s.awaiting_other = true;
        let mut count = 0;
        while s.advance().is_ok() {
            assert!(!s.awaiting_other, "advance must reset awaiting_other");
            count += 1;
        }
        assert_eq!(count, 5);
        assert_eq!(s.step, Step::Contact);
    }

    #[test]
    fn selection_mut_creates_and_persists() {
        let mut s = Session::new();
        assert!(s.selection(AnswerKey::Values).is_empty());
        s.selection_mut(AnswerKey::Values).toggle(2);
        s.selection_mut(AnswerKey::Values).toggle(0);
        assert_eq!(
            s.selection(AnswerKey::Values).indices().collect::<Vec<_>>(),
            vec![0, 2]
        );
    }

    #[test]
    fn selection_mut_replaces_a_text_answer() {
        let mut s = Session::new();
        s.set_text(AnswerKey::Values, "typed by mistake");
        s.selection_mut(AnswerKey::Values).toggle(1);
        assert_eq!(s.text(AnswerKey::Values), None);
        assert_eq!(
            s.selection(AnswerKey::Values).indices().collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn text_and_selection_do_not_alias() {
        let mut s = Session::new();
        s.set_text(AnswerKey::Interest, "Нет");
        assert_eq!(s.text(AnswerKey::Interest), Some("Нет"));
        assert!(s.selection(AnswerKey::Interest).is_empty());
        assert_eq!(s.text(AnswerKey::Values), None);
    }

    #[test]
    fn answer_keys_per_step() {
        assert_eq!(AnswerKey::selection_for(Step::Pains), Some(AnswerKey::Pains));
        assert_eq!(AnswerKey::other_for(Step::Values), None);
        assert_eq!(AnswerKey::other_for(Step::Expectations), Some(AnswerKey::ExpectationsOther));
        assert_eq!(AnswerKey::selection_for(Step::Contact), None);
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut s = Session::new();
        s.step = Step::Pains;
        s.lang = Some(Lang::Uz);
        s.set_text(AnswerKey::Interest, "Balki");
        s.selection_mut(AnswerKey::Values).toggle(3);
        s.set_text(AnswerKey::PainsOther, "vizalar");
        s.awaiting_other = true;

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["step"], "pains");
        assert_eq!(json["lang"], "uz");
        assert_eq!(json["answers"]["values"]["kind"], "selection");
        assert_eq!(json["answers"]["values"]["value"], serde_json::json!([3]));

        let parsed: Session = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, s);
    }
}
