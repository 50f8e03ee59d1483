//! Persisted dialog session state.
//!
//! A [`DialogSession`] is the full state of one user's conversation in one
//! chat: which dialog is running, which query is pending, and every response
//! collected so far. Sessions are serialized to JSON and kept in a
//! [`SessionStore`](crate::store::SessionStore) under a per-user-per-chat key
//! with a TTL; an absent session simply means no dialog is active.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::query::{Keyboard, Query};

/// Store key for the session of `user_id` in `chat_id`.
#[must_use]
pub fn session_key(user_id: i64, chat_id: i64) -> String {
    format!("dialog:{user_id}:{chat_id}")
}

/// One asked query together with the response collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// The query as it was delivered.
    pub query: Query,
    /// Raw text response, or the file id for file queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
    /// Toggled choice indices. Serializes as a sorted sequence.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub choice_selections: BTreeSet<usize>,
    /// Id of the user message that answered this query, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_message_id: Option<i32>,
}

impl QueryRecord {
    /// Create an unanswered record for `query`.
    #[must_use]
    pub fn new(query: Query) -> Self {
        Self {
            query,
            text_response: None,
            choice_selections: BTreeSet::new(),
            correlation_message_id: None,
        }
    }
}

/// The persisted state of one dialog for one user in one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSession {
    /// Telegram-style numeric user id.
    pub user_id: i64,
    /// Numeric chat id. Equals `user_id` in private chats.
    pub chat_id: i64,
    /// Name of the dialog handler driving this session.
    pub dialog: String,
    /// Whether the chat is a private (one-on-one) chat.
    pub is_private: bool,
    /// Name of the query currently awaiting a response.
    #[serde(default, rename = "pending_query", skip_serializing_if = "Option::is_none")]
    pending: Option<String>,
    /// All queries asked so far, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    queries: BTreeMap<String, QueryRecord>,
}

impl DialogSession {
    /// Create a fresh session with no queries asked yet.
    #[must_use]
    pub fn new(user_id: i64, chat_id: i64, dialog: impl Into<String>, is_private: bool) -> Self {
        Self {
            user_id,
            chat_id,
            dialog: dialog.into(),
            is_private,
            pending: None,
            queries: BTreeMap::new(),
        }
    }

    /// Store key for this session.
    #[must_use]
    pub fn key(&self) -> String {
        session_key(self.user_id, self.chat_id)
    }

    /// Name of the query currently awaiting a response.
    #[must_use]
    pub fn pending_name(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// The query currently awaiting a response.
    ///
    /// `None` if no query is pending or the pending name has no record,
    /// which only happens on a corrupted session.
    #[must_use]
    pub fn pending_query(&self) -> Option<&Query> {
        let name = self.pending.as_deref()?;
        self.queries.get(name).map(|r| &r.query)
    }

    /// Look up an asked query by name.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&Query> {
        self.queries.get(name).map(|r| &r.query)
    }

    /// Look up the full record of an asked query by name.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&QueryRecord> {
        self.queries.get(name)
    }

    /// The text response recorded for `name`.
    ///
    /// Valid only for text and file kinds; for file queries this is the
    /// uploaded file's id.
    #[must_use]
    pub fn response_for(&self, name: &str) -> Option<&str> {
        let record = self.queries.get(name)?;
        if !record.query.kind.has_text_response() {
            return None;
        }
        record.text_response.as_deref()
    }

    /// The choice selections recorded for `name`, in ascending order.
    ///
    /// Valid only for choice kinds. An empty vector means the query was
    /// asked but nothing is toggled.
    #[must_use]
    pub fn choices_for(&self, name: &str) -> Option<Vec<usize>> {
        let record = self.queries.get(name)?;
        if !record.query.kind.has_choice_response() {
            return None;
        }
        Some(record.choice_selections.iter().copied().collect())
    }

    /// Render the keyboard for an asked query with its current selections.
    #[must_use]
    pub fn keyboard_for(&self, name: &str) -> Option<Keyboard> {
        let record = self.queries.get(name)?;
        record.query.keyboard(&record.choice_selections)
    }

    /// Record a text (or file id) response for the pending query.
    ///
    /// No-op when nothing is pending.
    pub fn record_text_response(&mut self, text: impl Into<String>) {
        if let Some(record) = self.pending_record_mut() {
            record.text_response = Some(text.into());
        }
    }

    /// Record the id of the user message that answered the pending query.
    ///
    /// No-op when nothing is pending.
    pub fn record_correlation(&mut self, message_id: i32) {
        if let Some(record) = self.pending_record_mut() {
            record.correlation_message_id = Some(message_id);
        }
    }

    /// Flip one choice selection on the pending query.
    ///
    /// Toggling an index twice restores the previous state. No-op when
    /// nothing is pending.
    pub fn toggle_choice(&mut self, index: usize) {
        if let Some(record) = self.pending_record_mut() {
            if !record.choice_selections.remove(&index) {
                record.choice_selections.insert(index);
            }
        }
    }

    /// Make `query` the new pending query with an empty record.
    ///
    /// A record asked earlier under the same name is replaced.
    pub fn advance_to(&mut self, query: Query) {
        let name = query.name.clone();
        self.queries.insert(name.clone(), QueryRecord::new(query));
        self.pending = Some(name);
    }

    fn pending_record_mut(&mut self) -> Option<&mut QueryRecord> {
        let name = self.pending.clone()?;
        self.queries.get_mut(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;

    fn survey_session() -> DialogSession {
        let mut session = DialogSession::new(7, 7, "survey", true);
        session.advance_to(Query::multi_choice("Q0", "Pick", ["A", "B", "C"]));
        session
    }

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key(42, -100), "dialog:42:-100");
        let session = DialogSession::new(42, -100, "survey", false);
        assert_eq!(session.key(), "dialog:42:-100");
    }

    #[test]
    fn test_fresh_session_has_no_pending_query() {
        let session = DialogSession::new(1, 1, "survey", true);
        assert!(session.pending_query().is_none());
        assert!(session.pending_name().is_none());
    }

    #[test]
    fn test_advance_to_sets_pending() {
        let session = survey_session();
        assert_eq!(session.pending_name(), Some("Q0"));
        assert_eq!(session.pending_query().unwrap().kind, QueryKind::MultiChoice);
        assert_eq!(session.choices_for("Q0"), Some(vec![]));
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut session = survey_session();
        session.toggle_choice(1);
        assert_eq!(session.choices_for("Q0"), Some(vec![1]));
        session.toggle_choice(1);
        assert_eq!(session.choices_for("Q0"), Some(vec![]));
    }

    #[test]
    fn test_choices_are_sorted() {
        let mut session = survey_session();
        session.toggle_choice(2);
        session.toggle_choice(0);
        assert_eq!(session.choices_for("Q0"), Some(vec![0, 2]));
    }

    #[test]
    fn test_response_accessors_gate_by_kind() {
        let mut session = survey_session();
        session.record_text_response("ignored for choice kinds");
        assert_eq!(session.response_for("Q0"), None);

        session.advance_to(Query::text("Q1", "Why?"));
        session.record_text_response("because");
        session.record_correlation(99);
        assert_eq!(session.response_for("Q1"), Some("because"));
        assert_eq!(session.choices_for("Q1"), None);
        assert_eq!(session.record("Q1").unwrap().correlation_message_id, Some(99));
    }

    #[test]
    fn test_keyboard_for_uses_current_selections() {
        let mut session = survey_session();
        session.toggle_choice(0);
        let kb = session.keyboard_for("Q0").unwrap();
        assert!(kb.rows[0][0].label.starts_with('\u{2612}'));
        assert!(kb.rows[0][1].label.starts_with('\u{2610}'));
    }

    #[test]
    fn test_mutations_without_pending_are_noops() {
        let mut session = DialogSession::new(1, 1, "survey", true);
        session.record_text_response("lost");
        session.toggle_choice(0);
        session.record_correlation(5);
        assert!(session.pending_query().is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut session = survey_session();
        session.toggle_choice(2);
        session.toggle_choice(0);
        session.advance_to(Query::text("Q1", "Why?"));
        session.record_text_response("tasty");
        session.record_correlation(12);

        let json = serde_json::to_vec(&session).unwrap();
        let back: DialogSession = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, session);
        assert_eq!(back.pending_name(), Some("Q1"));
        assert_eq!(back.choices_for("Q0"), Some(vec![0, 2]));
    }
}
