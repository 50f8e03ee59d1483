//! Queries and their inline keyboards.
//!
//! A [`Query`] is one question put to the user: free text, a single choice,
//! a multi choice, or a file upload. Choice queries render an inline keyboard
//! whose buttons carry a compact callback payload; [`parse_callback_data`]
//! is the only place that payload is interpreted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Checked checkbox prefix for multi-choice buttons.
const CHECKED_PREFIX: &str = "\u{2612} ";
/// Unchecked checkbox prefix for multi-choice buttons.
const UNCHECKED_PREFIX: &str = "\u{2610} ";
/// Label of the submit button on multi-choice keyboards.
const DONE_LABEL: &str = "Done";
/// Callback selector of the submit button.
const DONE_DATA: &str = "done";

/// The response a query expects from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Free-form text typed by the user.
    TextInput,
    /// Exactly one option picked from an inline keyboard.
    SingleChoice,
    /// Zero or more options toggled on an inline keyboard.
    MultiChoice,
    /// A file uploaded by the user.
    FileInput,
}

impl QueryKind {
    /// Whether responses to this kind are stored as raw text.
    ///
    /// File responses count: the uploaded file's id is stored as the text.
    #[must_use]
    pub const fn has_text_response(self) -> bool {
        matches!(self, Self::TextInput | Self::FileInput)
    }

    /// Whether responses to this kind are stored as choice selections.
    #[must_use]
    pub const fn has_choice_response(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiChoice)
    }
}

/// A single question within a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Name identifying the query within its dialog.
    pub name: String,
    /// The kind of response this query expects.
    pub kind: QueryKind,
    /// Text shown to the user.
    pub prompt: String,
    /// Option labels, present only for choice kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Message id of the delivered prompt, set once the transport sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_message_id: Option<i32>,
}

impl Query {
    /// Create a free-text query.
    #[must_use]
    pub fn text(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QueryKind::TextInput,
            prompt: prompt.into(),
            choices: Vec::new(),
            delivered_message_id: None,
        }
    }

    /// Create a file-upload query.
    #[must_use]
    pub fn file(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QueryKind::FileInput,
            prompt: prompt.into(),
            choices: Vec::new(),
            delivered_message_id: None,
        }
    }

    /// Create a single-choice query.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    #[must_use]
    pub fn single_choice<I, S>(name: impl Into<String>, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        assert!(!choices.is_empty(), "choice query needs at least one choice");
        Self {
            name: name.into(),
            kind: QueryKind::SingleChoice,
            prompt: prompt.into(),
            choices,
            delivered_message_id: None,
        }
    }

    /// Create a multi-choice query.
    ///
    /// # Panics
    ///
    /// Panics if `choices` is empty.
    #[must_use]
    pub fn multi_choice<I, S>(name: impl Into<String>, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        assert!(!choices.is_empty(), "choice query needs at least one choice");
        Self {
            name: name.into(),
            kind: QueryKind::MultiChoice,
            prompt: prompt.into(),
            choices,
            delivered_message_id: None,
        }
    }

    /// Render the inline keyboard for this query.
    ///
    /// Returns `None` for kinds that take no keyboard. Multi-choice buttons
    /// are prefixed with a checkbox reflecting `selected` and followed by a
    /// `Done` row; single-choice buttons are rendered plain.
    #[must_use]
    pub fn keyboard(&self, selected: &BTreeSet<usize>) -> Option<Keyboard> {
        match self.kind {
            QueryKind::TextInput | QueryKind::FileInput => None,
            QueryKind::SingleChoice => {
                let row = self
                    .choices
                    .iter()
                    .enumerate()
                    .map(|(i, label)| Button::new(label.clone(), self.callback_data(i)))
                    .collect();
                Some(Keyboard { rows: vec![row] })
            }
            QueryKind::MultiChoice => {
                let row = self
                    .choices
                    .iter()
                    .enumerate()
                    .map(|(i, label)| {
                        let prefix = if selected.contains(&i) {
                            CHECKED_PREFIX
                        } else {
                            UNCHECKED_PREFIX
                        };
                        Button::new(format!("{prefix}{label}"), self.callback_data(i))
                    })
                    .collect();
                let done = Button::new(DONE_LABEL, format!("{DONE_DATA}:{}", self.name));
                Some(Keyboard {
                    rows: vec![row, vec![done]],
                })
            }
        }
    }

    /// Callback payload for the choice button at `index`.
    fn callback_data(&self, index: usize) -> String {
        format!("{index}:{}", self.name)
    }
}

/// An inline keyboard, rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<Button>>,
}

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Text shown on the button.
    pub label: String,
    /// Callback payload sent back when the button is pressed.
    pub data: String,
}

impl Button {
    /// Create a button.
    #[must_use]
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// A decoded inline-button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// A choice button, by index into the query's choices.
    Choice(usize),
    /// The submit button of a multi-choice keyboard.
    Done,
}

/// Decode a callback payload into a press and the query name it targets.
///
/// The payload format is `<index>:<query-name>` for choice buttons and
/// `done:<query-name>` for the submit button. Anything else, including a
/// non-numeric selector, decodes to `None`.
#[must_use]
pub fn parse_callback_data(data: &str) -> Option<(Press, &str)> {
    let (selector, name) = data.split_once(':')?;
    if selector == DONE_DATA {
        return Some((Press::Done, name));
    }
    let index = selector.parse::<usize>().ok()?;
    Some((Press::Choice(index), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_response_shapes() {
        assert!(QueryKind::TextInput.has_text_response());
        assert!(QueryKind::FileInput.has_text_response());
        assert!(!QueryKind::SingleChoice.has_text_response());
        assert!(QueryKind::SingleChoice.has_choice_response());
        assert!(QueryKind::MultiChoice.has_choice_response());
        assert!(!QueryKind::FileInput.has_choice_response());
    }

    #[test]
    fn test_text_query_has_no_keyboard() {
        let q = Query::text("Q0", "What is your name?");
        assert!(q.keyboard(&BTreeSet::new()).is_none());
    }

    #[test]
    fn test_single_choice_keyboard() {
        let q = Query::single_choice("Q0", "Pick one", ["Red", "Green"]);
        let kb = q.keyboard(&BTreeSet::new()).unwrap();
        assert_eq!(kb.rows.len(), 1);
        assert_eq!(kb.rows[0][0].label, "Red");
        assert_eq!(kb.rows[0][0].data, "0:Q0");
        assert_eq!(kb.rows[0][1].data, "1:Q0");
    }

    #[test]
    fn test_multi_choice_keyboard_reflects_selection() {
        let q = Query::multi_choice("Q1", "Pick some", ["Apple", "Orange", "Banana"]);
        let selected: BTreeSet<usize> = [1].into_iter().collect();
        let kb = q.keyboard(&selected).unwrap();
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[0][0].label, "\u{2610} Apple");
        assert_eq!(kb.rows[0][1].label, "\u{2612} Orange");
        assert_eq!(kb.rows[0][2].label, "\u{2610} Banana");
        assert_eq!(kb.rows[1][0].label, "Done");
        assert_eq!(kb.rows[1][0].data, "done:Q1");
    }

    #[test]
    fn test_parse_callback_data() {
        assert_eq!(parse_callback_data("2:Q0"), Some((Press::Choice(2), "Q0")));
        assert_eq!(parse_callback_data("done:Q3"), Some((Press::Done, "Q3")));
        assert_eq!(parse_callback_data("nope"), None);
        assert_eq!(parse_callback_data("x:Q0"), None);
        assert_eq!(parse_callback_data(""), None);
    }

    #[test]
    fn test_callback_data_survives_colons_in_name() {
        let q = Query::single_choice("a:b", "Pick", ["X"]);
        let kb = q.keyboard(&BTreeSet::new()).unwrap();
        assert_eq!(parse_callback_data(&kb.rows[0][0].data), Some((Press::Choice(0), "a:b")));
    }

    #[test]
    #[should_panic(expected = "at least one choice")]
    fn test_choice_query_rejects_empty_choices() {
        let _ = Query::single_choice("Q0", "Pick", Vec::<String>::new());
    }

    #[test]
    fn test_query_serde_round_trip() {
        let mut q = Query::multi_choice("Q2", "Pick", ["A", "B"]);
        q.delivered_message_id = Some(42);
        let json = serde_json::to_string(&q).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }
}
