//! Outgoing prompts and keyboard specs.
//!
//! These are channel-agnostic: the Telegram channel turns a [`Keyboard`]
//! into `reply_markup` JSON, the CLI channel prints it.

use serde::Serialize;

/// A tappable inline button carrying an opaque callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Keyboard attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Keyboard {
    /// Leave whatever keyboard the user currently sees.
    None,
    /// Hide the reply keyboard (free text expected).
    Remove,
    /// Reply keyboard of fixed labels; a cancel button is always the last row.
    Choices { rows: Vec<Vec<String>>, cancel: String },
    /// Inline buttons (language pick, "open", or a checklist with "done").
    Inline { rows: Vec<Vec<InlineButton>> },
    /// Reply keyboard asking the user to share their phone number.
    RequestContact { share: String, cancel: String },
}

impl Keyboard {
    /// Lay `labels` out `per_row` to a row, followed by the cancel button.
    pub fn choices(labels: &[&str], per_row: usize, cancel: &str) -> Self {
        let rows = labels
            .chunks(per_row.max(1))
            .map(|chunk| chunk.iter().map(|s| s.to_string()).collect())
            .collect();
        Self::Choices {
            rows,
            cancel: cancel.to_string(),
        }
    }

    /// Every callback payload on this keyboard, in order.
    pub fn payloads(&self) -> Vec<&str> {
        match self {
            Self::Inline { rows } => rows
                .iter()
                .flatten()
                .map(|button| button.payload.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// How the prompt reaches the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// Send as a new message.
    New,
    /// Replace the text and keyboard of an existing message.
    EditMessage { message_id: i64 },
    /// Replace only the inline keyboard of an existing message.
    EditKeyboard { message_id: i64 },
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub text: String,
    pub keyboard: Keyboard,
    pub delivery: Delivery,
}

impl Prompt {
    pub fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
            delivery: Delivery::New,
        }
    }

    /// Plain text, keyboard untouched.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, Keyboard::None)
    }

    /// Deliver as an edit of `message_id` if known, else as a new message.
    pub fn editing(mut self, message_id: Option<i64>) -> Self {
        if let Some(message_id) = message_id {
            self.delivery = Delivery::EditMessage { message_id };
        }
        self
    }

    /// Deliver as a keyboard-only edit of `message_id` if known.
    pub fn editing_keyboard(mut self, message_id: Option<i64>) -> Self {
        if let Some(message_id) = message_id {
            self.delivery = Delivery::EditKeyboard { message_id };
        }
        self
    }
}

/// Result of dispatching one inbound event: exactly one prompt, plus
/// channel hints for selection events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub prompt: Prompt,
    /// Short notice shown when acknowledging a button tap.
    pub toast: Option<String>,
    /// Message whose inline keyboard should be removed (a frozen checklist).
    pub retire_keyboard: Option<i64>,
}

impl Outcome {
    pub fn prompt(prompt: Prompt) -> Self {
        Self {
            prompt,
            toast: None,
            retire_keyboard: None,
        }
    }

    pub fn with_toast(mut self, toast: impl Into<String>) -> Self {
        self.toast = Some(toast.into());
        self
    }

    pub fn retiring(mut self, message_id: Option<i64>) -> Self {
        self.retire_keyboard = message_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_chunk_rows() {
        let kb = Keyboard::choices(&["a", "b", "c"], 2, "cancel");
        assert_eq!(
            kb,
            Keyboard::Choices {
                rows: vec![vec!["a".into(), "b".into()], vec!["c".into()]],
                cancel: "cancel".into(),
            }
        );
    }

    #[test]
    fn choices_zero_per_row_does_not_panic() {
        let kb = Keyboard::choices(&["a", "b"], 0, "x");
        let Keyboard::Choices { rows, .. } = kb else {
            panic!("expected choices");
        };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn editing_only_when_message_known() {
        let p = Prompt::text("hi").editing(None);
        assert_eq!(p.delivery, Delivery::New);
        let p = Prompt::text("hi").editing(Some(7));
        assert_eq!(p.delivery, Delivery::EditMessage { message_id: 7 });
        let p = Prompt::text("hi").editing_keyboard(Some(8));
        assert_eq!(p.delivery, Delivery::EditKeyboard { message_id: 8 });
    }

    #[test]
    fn payloads_flatten_inline_rows() {
        let kb = Keyboard::Inline {
            rows: vec![
                vec![InlineButton::new("A", "a"), InlineButton::new("B", "b")],
                vec![InlineButton::new("C", "c")],
            ],
        };
        assert_eq!(kb.payloads(), vec!["a", "b", "c"]);
        assert!(Keyboard::Remove.payloads().is_empty());
    }
}
