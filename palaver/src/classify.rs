//! Input classification against the pending query.
//!
//! Chat platforms deliver at least once and out of order: duplicated
//! callbacks, presses on keyboards from long-finished dialogs, plain text
//! while a keyboard is showing. [`classify`] decides, from the session's
//! pending query alone, what an inbound event means:
//!
//! - [`Classification::Advance`]: a real response, record it and run the
//!   dialog handler
//! - [`Classification::ToggleRedraw`]: a multi-choice toggle, flip the
//!   selection and redraw the keyboard, no handler involved
//! - [`Classification::Stale`]: a leftover from an earlier query, consume
//!   it silently
//! - [`Classification::Reject`]: not part of this dialog at all
//!
//! In non-private chats, text and file events count only when they reply
//! to the delivered prompt message; button presses carry the query name in
//! their payload and need no reply correlation.

use crate::event::{ChatEvent, EventPayload, FileRef};
use crate::query::{Press, QueryKind, parse_callback_data};
use crate::session::DialogSession;

/// The normalized response extracted from an advancing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseInput {
    /// Free text answering a text query.
    Text(String),
    /// An upload answering a file query.
    File(FileRef),
    /// A choice query being submitted. For single choice the pressed index
    /// is toggled first; the multi-choice done button submits as is.
    Submit {
        /// Index to toggle before the handler runs, if any.
        toggle: Option<usize>,
    },
}

/// What an inbound event means for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Record the response and advance the dialog.
    Advance(ResponseInput),
    /// Flip one multi-choice selection and redraw the keyboard.
    ToggleRedraw {
        /// Index of the toggled choice.
        index: usize,
    },
    /// A stale or duplicated button press, to be consumed without effect.
    Stale,
    /// The event does not belong to this dialog.
    Reject,
}

/// Classify `event` against the session's pending query.
///
/// Returns [`Classification::Reject`] when no query is pending; the engine
/// treats that session as corrupt before ever calling this.
#[must_use]
pub fn classify(session: &DialogSession, event: &ChatEvent) -> Classification {
    let Some(pending) = session.pending_query() else {
        return Classification::Reject;
    };

    match (&event.payload, pending.kind) {
        (EventPayload::Text(text), QueryKind::TextInput) => {
            if !correlates(session, event) {
                return Classification::Reject;
            }
            Classification::Advance(ResponseInput::Text(text.clone()))
        }
        (EventPayload::File(file), QueryKind::FileInput) => {
            if !correlates(session, event) {
                return Classification::Reject;
            }
            Classification::Advance(ResponseInput::File(file.clone()))
        }
        (EventPayload::ButtonPress(data), QueryKind::SingleChoice | QueryKind::MultiChoice) => {
            let Some((press, name)) = parse_callback_data(data) else {
                return Classification::Stale;
            };
            if name != pending.name {
                return Classification::Stale;
            }
            match press {
                Press::Done => Classification::Advance(ResponseInput::Submit { toggle: None }),
                Press::Choice(index) if index >= pending.choices.len() => Classification::Stale,
                Press::Choice(index) => {
                    if pending.kind == QueryKind::SingleChoice {
                        Classification::Advance(ResponseInput::Submit {
                            toggle: Some(index),
                        })
                    } else {
                        Classification::ToggleRedraw { index }
                    }
                }
            }
        }
        _ => Classification::Reject,
    }
}

/// Whether a text or file event is addressed to the pending prompt.
///
/// Always true in private chats. In group chats the event must reply to
/// exactly the delivered prompt message.
fn correlates(session: &DialogSession, event: &ChatEvent) -> bool {
    if session.is_private {
        return true;
    }
    match (event.reply_to, session.pending_query().and_then(|q| q.delivered_message_id)) {
        (Some(reply), Some(delivered)) => reply == delivered,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    fn session_with(query: Query, is_private: bool) -> DialogSession {
        let mut session = DialogSession::new(7, 70, "survey", is_private);
        let mut query = query;
        query.delivered_message_id = Some(100);
        session.advance_to(query);
        session
    }

    fn multi() -> Query {
        Query::multi_choice("Q0", "Pick", ["A", "B", "C"])
    }

    #[test]
    fn test_text_answers_text_query() {
        let session = session_with(Query::text("Q0", "Why?"), true);
        let event = ChatEvent::text(7, 70, 5, "because");
        assert_eq!(
            classify(&session, &event),
            Classification::Advance(ResponseInput::Text("because".into()))
        );
    }

    #[test]
    fn test_file_answers_file_query() {
        let session = session_with(Query::file("Q0", "Upload"), true);
        let event = ChatEvent::file(7, 70, 5, FileRef::new("abc"));
        assert_eq!(
            classify(&session, &event),
            Classification::Advance(ResponseInput::File(FileRef::new("abc")))
        );
    }

    #[test]
    fn test_cross_kind_events_are_rejected() {
        let session = session_with(Query::text("Q0", "Why?"), true);
        assert_eq!(
            classify(&session, &ChatEvent::file(7, 70, 5, FileRef::new("abc"))),
            Classification::Reject
        );
        assert_eq!(
            classify(&session, &ChatEvent::button(7, 70, 5, "0:Q0")),
            Classification::Reject
        );

        let session = session_with(multi(), true);
        assert_eq!(
            classify(&session, &ChatEvent::text(7, 70, 5, "typed instead")),
            Classification::Reject
        );
        assert_eq!(
            classify(&session, &ChatEvent::file(7, 70, 5, FileRef::new("abc"))),
            Classification::Reject
        );
    }

    #[test]
    fn test_multi_choice_press_toggles() {
        let session = session_with(multi(), true);
        let event = ChatEvent::button(7, 70, 5, "1:Q0");
        assert_eq!(
            classify(&session, &event),
            Classification::ToggleRedraw { index: 1 }
        );
    }

    #[test]
    fn test_multi_choice_done_submits() {
        let session = session_with(multi(), true);
        let event = ChatEvent::button(7, 70, 5, "done:Q0");
        assert_eq!(
            classify(&session, &event),
            Classification::Advance(ResponseInput::Submit { toggle: None })
        );
    }

    #[test]
    fn test_single_choice_press_toggles_and_submits() {
        let session = session_with(Query::single_choice("Q0", "Pick", ["A", "B"]), true);
        let event = ChatEvent::button(7, 70, 5, "1:Q0");
        assert_eq!(
            classify(&session, &event),
            Classification::Advance(ResponseInput::Submit { toggle: Some(1) })
        );
    }

    #[test]
    fn test_stale_presses_are_consumed() {
        let session = session_with(multi(), true);
        // Wrong query name: a press on an earlier keyboard.
        assert_eq!(
            classify(&session, &ChatEvent::button(7, 70, 5, "0:Q9")),
            Classification::Stale
        );
        // Malformed payload.
        assert_eq!(
            classify(&session, &ChatEvent::button(7, 70, 5, "garbage")),
            Classification::Stale
        );
        // Out-of-range index.
        assert_eq!(
            classify(&session, &ChatEvent::button(7, 70, 5, "9:Q0")),
            Classification::Stale
        );
    }

    #[test]
    fn test_group_text_requires_reply_to_prompt() {
        let session = session_with(Query::text("Q0", "Why?"), false);

        let plain = ChatEvent::text(7, 70, 5, "because");
        assert_eq!(classify(&session, &plain), Classification::Reject);

        let wrong_reply = ChatEvent::text(7, 70, 5, "because").with_reply_to(99);
        assert_eq!(classify(&session, &wrong_reply), Classification::Reject);

        let reply = ChatEvent::text(7, 70, 5, "because").with_reply_to(100);
        assert_eq!(
            classify(&session, &reply),
            Classification::Advance(ResponseInput::Text("because".into()))
        );
    }

    #[test]
    fn test_group_file_requires_reply_to_prompt() {
        let session = session_with(Query::file("Q0", "Upload"), false);
        let plain = ChatEvent::file(7, 70, 5, FileRef::new("abc"));
        assert_eq!(classify(&session, &plain), Classification::Reject);

        let reply = ChatEvent::file(7, 70, 5, FileRef::new("abc")).with_reply_to(100);
        assert!(matches!(classify(&session, &reply), Classification::Advance(_)));
    }

    #[test]
    fn test_group_undelivered_prompt_never_correlates() {
        let mut session = DialogSession::new(7, 70, "survey", false);
        session.advance_to(Query::text("Q0", "Why?"));
        let reply = ChatEvent::text(7, 70, 5, "because").with_reply_to(100);
        assert_eq!(classify(&session, &reply), Classification::Reject);
    }

    #[test]
    fn test_group_button_press_needs_no_reply() {
        let session = session_with(multi(), false);
        let event = ChatEvent::button(7, 70, 5, "2:Q0");
        assert_eq!(
            classify(&session, &event),
            Classification::ToggleRedraw { index: 2 }
        );
    }

    #[test]
    fn test_no_pending_query_rejects() {
        let session = DialogSession::new(7, 70, "survey", true);
        let event = ChatEvent::text(7, 70, 5, "hello");
        assert_eq!(classify(&session, &event), Classification::Reject);
    }
}
