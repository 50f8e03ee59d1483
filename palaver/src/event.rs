//! Normalized inbound chat events.
//!
//! Transports reduce whatever their platform delivers to a [`ChatEvent`]
//! before handing it to the engine. The engine never sees platform types.

/// Reference to a file hosted by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Platform file id, usable with the transport's download operation.
    pub id: String,
}

impl FileRef {
    /// Create a file reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// What the user actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A plain text message.
    Text(String),
    /// An inline keyboard button press, with the raw callback payload.
    ButtonPress(String),
    /// A file upload.
    File(FileRef),
}

/// One inbound event from a chat, normalized for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Id of the user who produced the event.
    pub user_id: i64,
    /// Id of the chat the event arrived in.
    pub chat_id: i64,
    /// Id of the message carrying the event. For button presses this is
    /// the id of the message holding the keyboard.
    pub message_id: i32,
    /// Id of the message this one replies to, if any.
    pub reply_to: Option<i32>,
    /// The event content.
    pub payload: EventPayload,
}

impl ChatEvent {
    /// Create a text message event.
    #[must_use]
    pub fn text(user_id: i64, chat_id: i64, message_id: i32, text: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id,
            message_id,
            reply_to: None,
            payload: EventPayload::Text(text.into()),
        }
    }

    /// Create a button press event from a raw callback payload.
    #[must_use]
    pub fn button(user_id: i64, chat_id: i64, message_id: i32, data: impl Into<String>) -> Self {
        Self {
            user_id,
            chat_id,
            message_id,
            reply_to: None,
            payload: EventPayload::ButtonPress(data.into()),
        }
    }

    /// Create a file upload event.
    #[must_use]
    pub fn file(user_id: i64, chat_id: i64, message_id: i32, file: FileRef) -> Self {
        Self {
            user_id,
            chat_id,
            message_id,
            reply_to: None,
            payload: EventPayload::File(file),
        }
    }

    /// Set the message id this event replies to.
    #[must_use]
    pub fn with_reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_constructors() {
        let event = ChatEvent::text(1, 2, 3, "hello");
        assert_eq!(event.payload, EventPayload::Text("hello".into()));
        assert_eq!(event.reply_to, None);

        let event = ChatEvent::button(1, 2, 3, "0:Q0").with_reply_to(9);
        assert_eq!(event.payload, EventPayload::ButtonPress("0:Q0".into()));
        assert_eq!(event.reply_to, Some(9));

        let event = ChatEvent::file(1, 2, 3, FileRef::new("abc"));
        assert!(matches!(event.payload, EventPayload::File(ref f) if f.id == "abc"));
    }
}
