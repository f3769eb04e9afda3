//! Step dispatcher: routes each inbound event through the survey.
//!
//! [`transition`] is pure: given a session and an event it decides the new
//! session state and the single prompt to send. [`SurveyEngine`] wraps it
//! with session storage and finalization.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::event::{Action, EventKind, SurveyEvent};
use super::finalize::{Finalizer, normalize_contact};
use super::lang::Lang;
use super::multiselect::checklist;
use super::prompt::{InlineButton, Keyboard, Outcome, Prompt};
use super::session::{AnswerKey, Session};
use super::step::{InputKind, Step};
use super::text::{OptionSet, TextKey, bilingual, text};
use crate::error::DatabaseError;
use crate::store::SessionStore;

/// Reply keyboard width for single-choice options.
const CHOICES_PER_ROW: usize = 2;

/// What an event does to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Session untouched; send the outcome.
    Unchanged(Outcome),
    /// Store the mutated session, then send the outcome.
    Updated(Outcome),
    /// A contact was captured: persist the record.
    Finalize { contact: String },
}

/// Drives sessions through the survey.
pub struct SurveyEngine {
    sessions: Arc<dyn SessionStore>,
    finalizer: Finalizer,
}

impl SurveyEngine {
    pub fn new(sessions: Arc<dyn SessionStore>, finalizer: Finalizer) -> Self {
        Self {
            sessions,
            finalizer,
        }
    }

    /// Handle one event and return what to send back.
    ///
    /// Only session storage failures are errors; a failed record append is
    /// reported to the user and leaves the session in place.
    pub async fn handle(&self, event: &SurveyEvent) -> Result<Outcome, DatabaseError> {
        let chat_id = event.chat_id.as_str();

        if event.kind == EventKind::Start {
            self.sessions.set(chat_id, &Session::new()).await?;
            info!(chat_id, user_id = %event.user.id, "Survey started");
            return Ok(Outcome::prompt(language_prompt()));
        }

        let session = self.sessions.get(chat_id).await?;

        if is_cancel(&event.kind) {
            self.sessions.clear(chat_id).await?;
            info!(chat_id, "Survey cancelled");
            let message = match session.as_ref().and_then(|s| s.lang) {
                Some(lang) => text(TextKey::Cancelled, lang).to_string(),
                None => bilingual(TextKey::Cancelled),
            };
            return Ok(Outcome::prompt(Prompt::new(message, Keyboard::Remove)));
        }

        let Some(mut session) = session else {
            debug!(chat_id, "Event without a session");
            return Ok(Outcome::prompt(Prompt::text(bilingual(TextKey::StartHint))));
        };

        let step_before = session.step;
        match transition(&mut session, event) {
            Transition::Unchanged(outcome) => {
                debug!(chat_id, step = %step_before, "Input rejected, re-prompting");
                Ok(outcome)
            }
            Transition::Updated(outcome) => {
                self.sessions.set(chat_id, &session).await?;
                debug!(chat_id, from = %step_before, to = %session.step, "Session updated");
                Ok(outcome)
            }
            Transition::Finalize { contact } => self.finalize(event, &session, &contact).await,
        }
    }

    async fn finalize(
        &self,
        event: &SurveyEvent,
        session: &Session,
        contact: &str,
    ) -> Result<Outcome, DatabaseError> {
        let lang = session.lang();
        match self.finalizer.persist(session, contact, &event.user).await {
            Ok(record) => {
                // The row is already written: log and carry on.
                if let Err(e) = self.sessions.clear(&event.chat_id).await {
                    error!(chat_id = %event.chat_id, error = %e, "Failed to clear finished session");
                }
                self.finalizer.notify_operators(&record).await;
                Ok(Outcome::prompt(Prompt::new(
                    text(TextKey::Thanks, lang),
                    Keyboard::Remove,
                )))
            }
            Err(e) => {
                error!(chat_id = %event.chat_id, error = %e, "Failed to save survey record");
                Ok(Outcome::prompt(Prompt::text(text(TextKey::SaveFailed, lang))))
            }
        }
    }
}

/// `/cancel`, or the cancel button label in either language.
fn is_cancel(kind: &EventKind) -> bool {
    match kind {
        EventKind::Cancel => true,
        EventKind::Text(input) => Lang::ALL
            .iter()
            .any(|lang| input.trim() == text(TextKey::CancelButton, *lang)),
        _ => false,
    }
}

/// Decide the effect of `event` on `session`.
///
/// `session` is only modified when the result is [`Transition::Updated`].
/// `/start` and cancel are handled by the engine before this is called.
pub fn transition(session: &mut Session, event: &SurveyEvent) -> Transition {
    match session.step.input_kind() {
        InputKind::Language => choose_language(session, event),
        InputKind::SingleChoice(options) => single_choice(session, event, options),
        InputKind::MultiChoice {
            options,
            other,
            open_first,
        } => multi_choice(session, event, options, other, open_first),
        InputKind::Contact => contact(session, event),
    }
}

fn choose_language(session: &mut Session, event: &SurveyEvent) -> Transition {
    let (lang, from_button) = match &event.kind {
        EventKind::Select(Action::Language(lang)) => (*lang, true),
        EventKind::Text(input) => match Lang::from_tag(&input.trim().to_lowercase()) {
            Some(lang) => (lang, false),
            None => return Transition::Unchanged(Outcome::prompt(language_prompt())),
        },
        _ => return Transition::Unchanged(Outcome::prompt(language_prompt())),
    };

    session.lang = Some(lang);
    if let Err(e) = session.advance() {
        debug!(error = %e, "Language step had no successor");
    }
    let welcome = Prompt::new(text(TextKey::Welcome, lang), interest_keyboard(lang));
    let retire = if from_button { event.message_id } else { None };
    Transition::Updated(Outcome::prompt(welcome).retiring(retire))
}

fn single_choice(session: &mut Session, event: &SurveyEvent, options: OptionSet) -> Transition {
    let lang = session.lang();
    if let EventKind::Text(input) = &event.kind {
        if options.position(input, lang).is_some() {
            session.set_text(AnswerKey::Interest, input.clone());
            return advance(session, None);
        }
    }
    reprompt(session)
}

fn multi_choice(
    session: &mut Session,
    event: &SurveyEvent,
    options: OptionSet,
    with_other: bool,
    open_first: bool,
) -> Transition {
    let step = session.step;
    let lang = session.lang();
    match &event.kind {
        EventKind::Select(action) if action.step() == Some(step) => match *action {
            Action::Open(_) if open_first => {
                let prompt = Prompt::new(
                    checklist_text(step, lang),
                    step_checklist(session, options, with_other),
                )
                .editing(event.message_id);
                Transition::Unchanged(Outcome::prompt(prompt))
            }
            Action::Toggle { index, .. } if index < options.len() => {
                let Some(key) = AnswerKey::selection_for(step) else {
                    return reprompt(session);
                };
                session.selection_mut(key).toggle(index);
                let prompt = Prompt::new(
                    checklist_text(step, lang),
                    step_checklist(session, options, with_other),
                )
                .editing_keyboard(event.message_id);
                Transition::Updated(Outcome::prompt(prompt))
            }
            Action::Other(_) if with_other => {
                session.awaiting_other = true;
                let key = if step == Step::Pains {
                    TextKey::OtherPainsPrompt
                } else {
                    TextKey::OtherExpectationsPrompt
                };
                Transition::Updated(Outcome::prompt(Prompt::text(text(key, lang))))
            }
            Action::Done(_) => advance(session, event.message_id),
            _ => reprompt(session),
        },
        EventKind::Text(input) if with_other => {
            let entry = input.trim();
            if entry.is_empty() {
                return Transition::Unchanged(Outcome::prompt(Prompt::text(text(
                    TextKey::NeedText,
                    lang,
                ))));
            }
            let Some(key) = AnswerKey::other_for(step) else {
                return reprompt(session);
            };
            session.set_text(key, entry);
            session.awaiting_other = false;
            Transition::Updated(Outcome::prompt(current_prompt(session)))
        }
        EventKind::Unsupported if with_other => {
            Transition::Unchanged(Outcome::prompt(Prompt::text(text(TextKey::NeedText, lang))))
        }
        _ => reprompt(session),
    }
}

fn contact(session: &mut Session, event: &SurveyEvent) -> Transition {
    let lang = session.lang();
    let need_text = || Transition::Unchanged(Outcome::prompt(Prompt::text(text(TextKey::NeedText, lang))));

    match &event.kind {
        EventKind::Text(input) if !input.trim().is_empty() => Transition::Finalize {
            contact: normalize_contact(input),
        },
        EventKind::Text(_) => match event.user.handle() {
            Some(handle) => Transition::Finalize { contact: handle },
            None => need_text(),
        },
        EventKind::Contact { phone } => Transition::Finalize {
            contact: normalize_contact(phone),
        },
        EventKind::Unsupported => need_text(),
        _ => reprompt(session),
    }
}

fn reprompt(session: &Session) -> Transition {
    Transition::Unchanged(Outcome::prompt(current_prompt(session)))
}

/// Advance to the next step and emit its opening prompt. A checklist
/// message being left (`retire`) loses its keyboard.
fn advance(session: &mut Session, retire: Option<i64>) -> Transition {
    let finished = session.step;
    if let Err(e) = session.advance() {
        debug!(error = %e, "Advance past the last step ignored");
        return reprompt(session);
    }
    let mut outcome = Outcome::prompt(opening_prompt(session)).retiring(retire);
    if matches!(finished.input_kind(), InputKind::MultiChoice { .. }) {
        outcome = outcome.with_toast(text(TextKey::SavedChoice, session.lang()));
    }
    Transition::Updated(outcome)
}

/// The bilingual language pick.
pub fn language_prompt() -> Prompt {
    let buttons = Lang::ALL
        .iter()
        .map(|lang| InlineButton::new(text(TextKey::LanguageName, *lang), Action::Language(*lang).encode()))
        .collect();
    Prompt::new(
        bilingual(TextKey::ChooseLanguage),
        Keyboard::Inline { rows: vec![buttons] },
    )
}

fn interest_keyboard(lang: Lang) -> Keyboard {
    Keyboard::choices(
        OptionSet::Interest.labels(lang),
        CHOICES_PER_ROW,
        text(TextKey::CancelButton, lang),
    )
}

fn contact_keyboard(lang: Lang) -> Keyboard {
    Keyboard::RequestContact {
        share: text(TextKey::ShareContact, lang).to_string(),
        cancel: text(TextKey::CancelButton, lang).to_string(),
    }
}

fn checklist_text(step: Step, lang: Lang) -> &'static str {
    match step {
        Step::Values => text(TextKey::QValuesTap, lang),
        Step::Pains => text(TextKey::QPains, lang),
        _ => text(TextKey::QExpectations, lang),
    }
}

fn step_checklist(session: &Session, options: OptionSet, with_other: bool) -> Keyboard {
    let selection = AnswerKey::selection_for(session.step)
        .map(|key| session.selection(key))
        .unwrap_or_default();
    checklist(session.step, options, with_other, &selection, session.lang())
}

/// Prompt sent when a step is first reached.
fn opening_prompt(session: &Session) -> Prompt {
    match session.step.input_kind() {
        InputKind::MultiChoice {
            open_first: true, ..
        } => {
            let lang = session.lang();
            let open = InlineButton::new(
                text(TextKey::OpenVariants, lang),
                Action::Open(session.step).encode(),
            );
            Prompt::new(
                text(TextKey::QValuesOpen, lang),
                Keyboard::Inline {
                    rows: vec![vec![open]],
                },
            )
        }
        _ => current_prompt(session),
    }
}

/// Prompt that re-asks the current step.
fn current_prompt(session: &Session) -> Prompt {
    let lang = session.lang();
    match session.step.input_kind() {
        InputKind::Language => language_prompt(),
        InputKind::SingleChoice(_) => {
            Prompt::new(text(TextKey::QInterest, lang), interest_keyboard(lang))
        }
        InputKind::MultiChoice { options, other, .. } => Prompt::new(
            checklist_text(session.step, lang),
            step_checklist(session, options, other),
        ),
        InputKind::Contact => Prompt::new(text(TextKey::QContact, lang), contact_keyboard(lang)),
    }
}
