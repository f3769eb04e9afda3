//! The survey: steps, sessions, the toggle widget and finalization.

pub mod dispatcher;
pub mod event;
pub mod finalize;
pub mod lang;
pub mod multiselect;
pub mod prompt;
pub mod session;
pub mod step;
pub mod text;

pub use dispatcher::{SurveyEngine, Transition, transition};
pub use event::{Action, EventKind, SurveyEvent, UserIdentity};
pub use finalize::{AnswerRecord, Finalizer, HEADER, escape_html, normalize_contact};
pub use lang::Lang;
pub use multiselect::Selection;
pub use prompt::{Delivery, InlineButton, Keyboard, Outcome, Prompt};
pub use session::{Answer, AnswerKey, Session};
pub use step::{InputKind, Step};
pub use text::{OptionSet, TextKey};
