//! Inbound survey events.
//!
//! Channels decode their raw updates into these types once, at the
//! boundary. Callback payloads (`vals:toggle:2`, `lang:uz`, ...) become a
//! closed [`Action`] set so the dispatcher never parses strings.

use super::lang::Lang;
use super::step::Step;

/// Who sent an event, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserIdentity {
    pub id: String,
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            id: id.into(),
            username: username.filter(|u| !u.is_empty()),
        }
    }

    /// `@username`, if the platform provided one.
    pub fn handle(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("@{u}"))
    }
}

/// A decoded button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Language(Lang),
    /// Reveal the checklist of a step that hides it behind a button.
    Open(Step),
    Toggle { step: Step, index: usize },
    /// Ask to type a free-text "other" entry.
    Other(Step),
    Done(Step),
}

impl Action {
    /// Decode a callback payload. Unknown payloads yield `None`.
    pub fn decode(payload: &str) -> Option<Action> {
        let mut parts = payload.split(':');
        let head = parts.next()?;
        let verb = parts.next()?;

        if head == "lang" {
            return match parts.next() {
                None => Lang::from_tag(verb).map(Action::Language),
                Some(_) => None,
            };
        }

        let step = Step::from_callback_prefix(head)?;
        let action = match (verb, parts.next()) {
            ("open", None) => Action::Open(step),
            ("other", None) => Action::Other(step),
            ("done", None) => Action::Done(step),
            ("toggle", Some(index)) => Action::Toggle {
                step,
                index: index.parse().ok()?,
            },
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(action)
    }

    /// Encode as a callback payload.
    pub fn encode(&self) -> String {
        match self {
            Self::Language(lang) => format!("lang:{}", lang.tag()),
            Self::Open(step) => format!("{}:open", prefix(*step)),
            Self::Toggle { step, index } => format!("{}:toggle:{index}", prefix(*step)),
            Self::Other(step) => format!("{}:other", prefix(*step)),
            Self::Done(step) => format!("{}:done", prefix(*step)),
        }
    }

    /// The step this action belongs to (`None` for the language pick).
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Language(_) => None,
            Self::Open(step) | Self::Other(step) | Self::Done(step) => Some(*step),
            Self::Toggle { step, .. } => Some(*step),
        }
    }
}

fn prefix(step: Step) -> &'static str {
    step.callback_prefix().unwrap_or("step")
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/start`: begin (or restart) the survey.
    Start,
    /// `/cancel`: abandon the survey.
    Cancel,
    Text(String),
    Select(Action),
    /// A shared phone contact.
    Contact { phone: String },
    /// Anything the survey can't read: stickers, photos, unknown buttons.
    Unsupported,
}

impl EventKind {
    /// Classify a text message, recognizing the bot commands.
    pub fn from_text(text: &str) -> EventKind {
        let trimmed = text.trim();
        match command_name(trimmed) {
            Some("start") => EventKind::Start,
            Some("cancel") => EventKind::Cancel,
            _ => EventKind::Text(text.to_string()),
        }
    }

    /// Classify a callback payload.
    pub fn from_payload(payload: &str) -> EventKind {
        Action::decode(payload)
            .map(EventKind::Select)
            .unwrap_or(EventKind::Unsupported)
    }
}

/// `/start`, `/start deep-link`, `/start@MyBot` → `start`.
fn command_name(text: &str) -> Option<&str> {
    let command = text.strip_prefix('/')?.split_whitespace().next()?;
    Some(command.split('@').next().unwrap_or(command))
}

/// One inbound event for one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyEvent {
    /// Session key.
    pub chat_id: String,
    pub user: UserIdentity,
    pub kind: EventKind,
    /// Message the event originated from (the message carrying the tapped
    /// button, for selections).
    pub message_id: Option<i64>,
}

impl SurveyEvent {
    pub fn new(chat_id: impl Into<String>, user: UserIdentity, kind: EventKind) -> Self {
        Self {
            chat_id: chat_id.into(),
            user,
            kind,
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_payloads() {
        assert_eq!(Action::decode("lang:ru"), Some(Action::Language(Lang::Ru)));
        assert_eq!(Action::decode("lang:uz"), Some(Action::Language(Lang::Uz)));
        assert_eq!(Action::decode("vals:open"), Some(Action::Open(Step::Values)));
        assert_eq!(
            Action::decode("vals:toggle:4"),
            Some(Action::Toggle { step: Step::Values, index: 4 })
        );
        assert_eq!(Action::decode("pain:other"), Some(Action::Other(Step::Pains)));
        assert_eq!(Action::decode("exp:done"), Some(Action::Done(Step::Expectations)));
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        for payload in [
            "",
            "lang",
            "lang:en",
            "lang:ru:extra",
            "vals",
            "vals:toggle",
            "vals:toggle:x",
            "vals:toggle:-1",
            "vals:toggle:1:2",
            "vals:done:1",
            "nope:done",
            "vals:explode",
        ] {
            assert_eq!(Action::decode(payload), None, "{payload:?} should not decode");
        }
    }

    #[test]
    fn encode_decode_agree() {
        let actions = [
            Action::Language(Lang::Uz),
            Action::Open(Step::Values),
            Action::Toggle { step: Step::Pains, index: 5 },
            Action::Other(Step::Expectations),
            Action::Done(Step::Values),
        ];
        for action in actions {
            assert_eq!(Action::decode(&action.encode()), Some(action));
        }
    }

    #[test]
    fn commands_are_recognized() {
        assert_eq!(EventKind::from_text("/start"), EventKind::Start);
        assert_eq!(EventKind::from_text("/start promo"), EventKind::Start);
        assert_eq!(EventKind::from_text("/start@SurveyBot"), EventKind::Start);
        assert_eq!(EventKind::from_text(" /cancel "), EventKind::Cancel);
        assert_eq!(
            EventKind::from_text("start"),
            EventKind::Text("start".to_string())
        );
        assert_eq!(
            EventKind::from_text("/help"),
            EventKind::Text("/help".to_string())
        );
    }

    #[test]
    fn unknown_payload_is_unsupported() {
        assert_eq!(EventKind::from_payload("garbage"), EventKind::Unsupported);
        assert_eq!(
            EventKind::from_payload("vals:done"),
            EventKind::Select(Action::Done(Step::Values))
        );
    }

    #[test]
    fn handle_requires_username() {
        assert_eq!(
            UserIdentity::new("1", Some("agency_uz".into())).handle(),
            Some("@agency_uz".to_string())
        );
        assert_eq!(UserIdentity::new("1", Some(String::new())).handle(), None);
        assert_eq!(UserIdentity::new("1", None).handle(), None);
    }
}
