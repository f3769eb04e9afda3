//! CLI channel: stdin/stdout REPL for walking through the survey locally.
//!
//! Plain lines are typed answers. `:payload` taps an inline button
//! (payloads are printed next to each button) and `/contact <phone>` shares
//! a phone number.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, InboundUpdate, Notifier, UpdateStream, receiver_stream};
use crate::error::ChannelError;
use crate::survey::{Delivery, EventKind, Keyboard, Outcome, SurveyEvent, UserIdentity};

const CLI_CHAT_ID: &str = "cli";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    user: UserIdentity,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user: UserIdentity::new("local-user", Some("local".into())),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<EventKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(phone) = line.strip_prefix("/contact") {
        return Some(EventKind::Contact {
            phone: phone.trim().to_string(),
        });
    }
    if let Some(payload) = line.strip_prefix(':') {
        return Some(EventKind::from_payload(payload.trim()));
    }
    Some(EventKind::from_text(line))
}

/// Render an outcome as terminal text.
pub fn render(outcome: &Outcome) -> String {
    let mut out = String::new();
    if let Some(toast) = &outcome.toast {
        out.push_str(&format!("({toast})\n"));
    }
    match outcome.prompt.delivery {
        Delivery::New => {}
        Delivery::EditMessage { message_id } => out.push_str(&format!("[edit #{message_id}]\n")),
        Delivery::EditKeyboard { message_id } => {
            out.push_str(&format!("[keyboard #{message_id}]\n"));
        }
    }
    out.push_str(&outcome.prompt.text);

    match &outcome.prompt.keyboard {
        Keyboard::None => {}
        Keyboard::Remove => out.push_str("\n  (free text)"),
        Keyboard::Choices { rows, cancel } => {
            for row in rows {
                let labels: Vec<String> = row.iter().map(|l| format!("[{l}]")).collect();
                out.push_str(&format!("\n  {}", labels.join(" ")));
            }
            out.push_str(&format!("\n  [{cancel}]"));
        }
        Keyboard::Inline { rows } => {
            for button in rows.iter().flatten() {
                out.push_str(&format!("\n  :{:<16} {}", button.payload, button.label));
            }
        }
        Keyboard::RequestContact { share, cancel } => {
            out.push_str(&format!("\n  [{share}] (/contact <phone>)\n  [{cancel}]"));
        }
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<UpdateStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user = self.user.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type /start to begin, /cancel to quit the survey.");
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(kind) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        let event = SurveyEvent::new(CLI_CHAT_ID, user.clone(), kind);
                        if tx.send(InboundUpdate::new(event)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(receiver_stream(rx))
    }

    async fn deliver(&self, _update: &InboundUpdate, outcome: &Outcome) -> Result<(), ChannelError> {
        println!("\n{}\n", render(outcome));
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for CliChannel {
    async fn notify(&self, chat_id: &str, html: &str) -> Result<(), ChannelError> {
        eprintln!("\n[notify {chat_id}]\n{html}\n");
        Ok(())
    }
}
