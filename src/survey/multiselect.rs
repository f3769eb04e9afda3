//! Multi-select toggle widget.
//!
//! The stored [`Selection`] is the single source of truth: every redraw of
//! the checklist is recomputed from it, never from a previous rendering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::event::Action;
use super::lang::Lang;
use super::prompt::{InlineButton, Keyboard};
use super::step::Step;
use super::text::{OptionSet, TextKey, text};

const CHECKED: &str = "✅";
const UNCHECKED: &str = "▫️";

/// Delimiter between labels in a rendered multi-choice answer.
pub const LABEL_DELIMITER: &str = ", ";

/// Set of selected option indices. Ordered, so resolution is always in
/// ascending index order regardless of toggle order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeSet<usize>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `index`. Returns whether it is now selected.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.0.remove(&index) {
            false
        } else {
            self.0.insert(index);
            true
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Resolve to labels in `lang`, ascending index order. Indices outside
    /// the option set are skipped.
    pub fn labels(&self, options: OptionSet, lang: Lang) -> Vec<&'static str> {
        let labels = options.labels(lang);
        self.indices().filter_map(|i| labels.get(i).copied()).collect()
    }
}

impl FromIterator<usize> for Selection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render the checklist for `step`: one toggle button per option, an
/// optional "other" button, then "done".
pub fn checklist(
    step: Step,
    options: OptionSet,
    with_other: bool,
    selection: &Selection,
    lang: Lang,
) -> Keyboard {
    let mut rows: Vec<Vec<InlineButton>> = options
        .labels(lang)
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let marker = if selection.contains(index) { CHECKED } else { UNCHECKED };
            vec![InlineButton::new(
                format!("{marker} {label}"),
                Action::Toggle { step, index }.encode(),
            )]
        })
        .collect();

    if with_other {
        rows.push(vec![InlineButton::new(
            text(TextKey::OtherButton, lang),
            Action::Other(step).encode(),
        )]);
    }
    rows.push(vec![InlineButton::new(
        text(TextKey::Done, lang),
        Action::Done(step).encode(),
    )]);

    Keyboard::Inline { rows }
}

/// Join the resolved labels and an optional "other" entry into one cell.
pub fn join_answer(
    selection: &Selection,
    other: Option<&str>,
    options: OptionSet,
    lang: Lang,
) -> String {
    let mut parts: Vec<String> = selection
        .labels(options, lang)
        .into_iter()
        .map(String::from)
        .collect();
    if let Some(other) = other.map(str::trim).filter(|o| !o.is_empty()) {
        parts.push(format!("{}: {other}", text(TextKey::OtherLabel, lang)));
    }
    parts.join(LABEL_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_once_changes_membership() {
        let mut sel = Selection::new();
        assert!(sel.toggle(3));
        assert!(sel.contains(3));
        assert!(!sel.toggle(3));
        assert!(!sel.contains(3));
    }

    #[test]
    fn toggle_twice_is_identity() {
        let mut sel: Selection = [1, 4].into_iter().collect();
        let before = sel.clone();
        for i in 0..6 {
            sel.toggle(i);
            sel.toggle(i);
            assert_eq!(sel, before, "pair toggle of {i} changed the set");
        }
    }

    #[test]
    fn labels_resolve_in_index_order_regardless_of_toggle_order() {
        let mut sel = Selection::new();
        sel.toggle(2);
        sel.toggle(0);
        assert_eq!(
            sel.labels(OptionSet::Values, Lang::Ru),
            vec!["Больше клиентов", "Онлайн-оплата"]
        );
        assert_eq!(
            join_answer(&sel, None, OptionSet::Values, Lang::Ru),
            "Больше клиентов, Онлайн-оплата"
        );
    }

    #[test]
    fn labels_follow_session_language() {
        let sel: Selection = [0, 2].into_iter().collect();
        assert_eq!(
            join_answer(&sel, None, OptionSet::Values, Lang::Uz),
            "Ko‘proq mijozlar, Onlayn to‘lov"
        );
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let sel: Selection = [1, 99].into_iter().collect();
        assert_eq!(sel.labels(OptionSet::Interest, Lang::Ru), vec!["Возможно"]);
    }

    #[test]
    fn other_is_appended_last() {
        let sel: Selection = [5, 0].into_iter().collect();
        let joined = join_answer(&sel, Some("  визы "), OptionSet::Pains, Lang::Ru);
        assert_eq!(joined, "Мало заявок, Нет аналитики, Другое: визы");
    }

    #[test]
    fn empty_selection_and_blank_other_is_empty_answer() {
        let joined = join_answer(&Selection::new(), Some("   "), OptionSet::Pains, Lang::Uz);
        assert_eq!(joined, "");
    }

    #[test]
    fn checklist_marks_selected_options() {
        let sel: Selection = [1].into_iter().collect();
        let kb = checklist(Step::Values, OptionSet::Values, false, &sel, Lang::Ru);
        let Keyboard::Inline { rows } = &kb else {
            panic!("expected inline keyboard");
        };
        // 5 options + done
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0][0].label, "▫️ Больше клиентов");
        assert_eq!(rows[1][0].label, "✅ Управление турами");
        assert_eq!(rows[5][0].label, "✅ Готово");
        assert_eq!(
            kb.payloads(),
            vec![
                "vals:toggle:0",
                "vals:toggle:1",
                "vals:toggle:2",
                "vals:toggle:3",
                "vals:toggle:4",
                "vals:done"
            ]
        );
    }

    #[test]
    fn checklist_with_other_button() {
        let kb = checklist(Step::Pains, OptionSet::Pains, true, &Selection::new(), Lang::Uz);
        let payloads = kb.payloads();
        assert_eq!(payloads.len(), 6 + 2);
        assert_eq!(payloads[6], "pain:other");
        assert_eq!(payloads[7], "pain:done");
    }

    #[test]
    fn redraw_is_stable_for_same_selection() {
        let sel: Selection = [0, 3].into_iter().collect();
        let a = checklist(Step::Expectations, OptionSet::Expectations, true, &sel, Lang::Ru);
        let b = checklist(Step::Expectations, OptionSet::Expectations, true, &sel.clone(), Lang::Ru);
        assert_eq!(a, b);
    }

    #[test]
    fn selection_serializes_as_sorted_array() {
        let sel: Selection = [4, 1, 4].into_iter().collect();
        assert_eq!(serde_json::to_string(&sel).unwrap(), "[1,4]");
        let parsed: Selection = serde_json::from_str("[3,0,3]").unwrap();
        assert_eq!(parsed.indices().collect::<Vec<_>>(), vec![0, 3]);
    }
}
