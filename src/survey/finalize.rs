//! Turning a finished session into a stored record.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info};

use super::event::UserIdentity;
use super::lang::Lang;
use super::multiselect::join_answer;
use super::session::{AnswerKey, Session};
use super::text::{OptionSet, TextKey, text};
use crate::channels::Notifier;
use crate::error::RecordError;
use crate::store::RecordStore;

/// Column names, in row order.
pub const HEADER: [&str; 9] = [
    "timestamp",
    "user_id",
    "username",
    "lang",
    "agg_interest",
    "agg_values",
    "pain_points",
    "expectations",
    "contact",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Operator summaries are written in this language regardless of the
/// respondent's choice; the respondent's language is shown as a tag.
const OPERATOR_LANG: Lang = Lang::Ru;

/// One completed survey, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub timestamp: String,
    pub user_id: String,
    /// Platform username without `@`, empty if unknown.
    pub username: String,
    pub lang: Lang,
    pub interest: String,
    pub values: String,
    pub pains: String,
    pub expectations: String,
    pub contact: String,
}

impl AnswerRecord {
    /// Resolve a session's answers into a record stamped at `at`. Option
    /// indices resolve against the session's own language.
    pub fn build(
        session: &Session,
        contact: &str,
        user: &UserIdentity,
        at: DateTime<FixedOffset>,
    ) -> Self {
        let lang = session.lang();
        let multi = |key: AnswerKey, other: Option<AnswerKey>, options: OptionSet| {
            join_answer(
                &session.selection(key),
                other.and_then(|k| session.text(k)),
                options,
                lang,
            )
        };

        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            user_id: user.id.clone(),
            username: user.username.clone().unwrap_or_default(),
            lang,
            interest: session.text(AnswerKey::Interest).unwrap_or_default().to_string(),
            values: multi(AnswerKey::Values, None, OptionSet::Values),
            pains: multi(
                AnswerKey::Pains,
                Some(AnswerKey::PainsOther),
                OptionSet::Pains,
            ),
            expectations: multi(
                AnswerKey::Expectations,
                Some(AnswerKey::ExpectationsOther),
                OptionSet::Expectations,
            ),
            contact: contact.to_string(),
        }
    }

    /// Row fields in [`HEADER`] order.
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.user_id.clone(),
            self.username.clone(),
            self.lang.tag().to_string(),
            self.interest.clone(),
            self.values.clone(),
            self.pains.clone(),
            self.expectations.clone(),
            self.contact.clone(),
        ]
    }

    /// HTML summary sent to operators.
    pub fn summary(&self) -> String {
        let line = |key: TextKey, value: &str| {
            format!("{}: {}", text(key, OPERATOR_LANG), escape_html(value))
        };
        let handle = if self.username.is_empty() {
            "—".to_string()
        } else {
            escape_html(&self.username)
        };

        [
            format!(
                "<b>[{}] {}</b>",
                self.lang.tag().to_uppercase(),
                text(TextKey::SummaryTitle, OPERATOR_LANG)
            ),
            line(TextKey::SummaryInterest, &self.interest),
            line(TextKey::SummaryValues, &self.values),
            line(TextKey::SummaryPains, &self.pains),
            line(TextKey::SummaryExpectations, &self.expectations),
            line(TextKey::SummaryContact, &self.contact),
            format!("— @{handle} | {}", escape_html(&self.user_id)),
        ]
        .join("\n")
    }
}

/// Normalize a typed contact.
///
/// `+` followed by digits and spaces keeps the plus and the digits;
/// `@handle` is kept as is; anything else keeps only its digits. Input
/// with no digits at all is returned unchanged.
pub fn normalize_contact(raw: &str) -> String {
    let s = raw.trim();

    if let Some(rest) = s.strip_prefix('+') {
        let compact: String = rest.chars().filter(|c| *c != ' ').collect();
        if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit()) {
            return format!("+{compact}");
        }
    }

    if s.len() > 1 && s.starts_with('@') {
        return s.to_string();
    }

    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        raw.to_string()
    } else {
        digits
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Persists finished surveys and tells the operators about them.
pub struct Finalizer {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    operators: Vec<String>,
    utc_offset: FixedOffset,
}

impl Finalizer {
    pub fn new(
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        operators: Vec<String>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            records,
            notifier,
            operators,
            utc_offset,
        }
    }

    /// Build the record for `session` and append it as a single row.
    pub async fn persist(
        &self,
        session: &Session,
        contact: &str,
        user: &UserIdentity,
    ) -> Result<AnswerRecord, RecordError> {
        let now = Utc::now().with_timezone(&self.utc_offset);
        let record = AnswerRecord::build(session, contact, user, now);
        self.records.append(&record.fields()).await?;
        info!(
            user_id = %record.user_id,
            lang = %record.lang,
            store = self.records.name(),
            "Survey record saved"
        );
        Ok(record)
    }

    /// Send the summary to every operator. Failures are logged and skipped.
    pub async fn notify_operators(&self, record: &AnswerRecord) {
        if self.operators.is_empty() {
            return;
        }
        let summary = record.summary();
        for operator in &self.operators {
            if let Err(e) = self.notifier.notify(operator, &summary).await {
                debug!(operator = %operator, error = %e, "Operator notification failed");
            }
        }
    }
}
