//! [`Transport`] implementation over the Telegram Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaAudio,
    InputMediaDocument, InputMediaPhoto, InputMediaVideo, MessageId, ReplyParameters,
};

use crate::error::{TransportError, TransportResult};
use crate::event::FileRef;
use crate::media::{Media, MediaKind, MediaSource};
use crate::query::Keyboard;
use crate::telegram::download::LazyDownload;
use crate::transport::{ByteStream, Transport};

/// Sends through a [`teloxide::Bot`].
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: teloxide::Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle.
    #[must_use]
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// The underlying bot handle.
    #[must_use]
    pub const fn bot(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> TransportResult<i32> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        let sent = request
            .await
            .map_err(|e| TransportError::send(e.to_string()))?;
        Ok(sent.id.0)
    }

    async fn send_prompt(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> TransportResult<i32> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(keyboard));
        }
        let sent = request
            .await
            .map_err(|e| TransportError::send(e.to_string()))?;
        Ok(sent.id.0)
    }

    async fn edit_prompt(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> TransportResult<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_markup(keyboard));
        }
        request
            .await
            .map_err(|e| TransportError::edit(e.to_string()))?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        media: &[Media],
        reply_to: Option<i32>,
    ) -> TransportResult<()> {
        match media {
            [] => Ok(()),
            [item] => self.send_single(chat_id, item, reply_to).await,
            items => self.send_album(chat_id, items, reply_to).await,
        }
    }

    async fn download(&self, file: &FileRef) -> TransportResult<ByteStream> {
        Ok(Box::pin(LazyDownload::new(
            self.bot.clone(),
            file.id.clone(),
        )))
    }
}

impl TelegramTransport {
    async fn send_single(
        &self,
        chat_id: i64,
        item: &Media,
        reply_to: Option<i32>,
    ) -> TransportResult<()> {
        let chat = ChatId(chat_id);
        let file = input_file(&item.source)?;
        let reply = reply_to.map(|id| ReplyParameters::new(MessageId(id)));

        match item.kind {
            MediaKind::Photo => {
                let mut request = self.bot.send_photo(chat, file);
                if let Some(caption) = item.caption.as_deref() {
                    request = request.caption(caption);
                }
                if let Some(reply) = reply {
                    request = request.reply_parameters(reply);
                }
                request
                    .await
                    .map_err(|e| TransportError::send(e.to_string()))?;
            }
            MediaKind::Video => {
                let mut request = self.bot.send_video(chat, file);
                if let Some(caption) = item.caption.as_deref() {
                    request = request.caption(caption);
                }
                if let Some(reply) = reply {
                    request = request.reply_parameters(reply);
                }
                request
                    .await
                    .map_err(|e| TransportError::send(e.to_string()))?;
            }
            MediaKind::Audio => {
                let mut request = self.bot.send_audio(chat, file);
                if let Some(caption) = item.caption.as_deref() {
                    request = request.caption(caption);
                }
                if let Some(reply) = reply {
                    request = request.reply_parameters(reply);
                }
                request
                    .await
                    .map_err(|e| TransportError::send(e.to_string()))?;
            }
            MediaKind::Document => {
                let mut request = self.bot.send_document(chat, file);
                if let Some(caption) = item.caption.as_deref() {
                    request = request.caption(caption);
                }
                if let Some(reply) = reply {
                    request = request.reply_parameters(reply);
                }
                request
                    .await
                    .map_err(|e| TransportError::send(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn send_album(
        &self,
        chat_id: i64,
        items: &[Media],
        reply_to: Option<i32>,
    ) -> TransportResult<()> {
        let group = items
            .iter()
            .map(input_media)
            .collect::<TransportResult<Vec<_>>>()?;
        let mut request = self.bot.send_media_group(ChatId(chat_id), group);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        request
            .await
            .map_err(|e| TransportError::send(e.to_string()))?;
        Ok(())
    }
}

/// Render a [`Keyboard`] as Telegram inline buttons.
fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.data.clone()))
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

fn input_file(source: &MediaSource) -> TransportResult<InputFile> {
    match source {
        MediaSource::FileId(id) => Ok(InputFile::file_id(id.clone())),
        MediaSource::Url(raw) => {
            let url = url::Url::parse(raw)
                .map_err(|e| TransportError::send(format!("bad media url {raw}: {e}")))?;
            Ok(InputFile::url(url))
        }
    }
}

fn input_media(item: &Media) -> TransportResult<InputMedia> {
    let file = input_file(&item.source)?;
    Ok(match item.kind {
        MediaKind::Photo => {
            let mut media = InputMediaPhoto::new(file);
            if let Some(caption) = item.caption.as_deref() {
                media = media.caption(caption);
            }
            InputMedia::Photo(media)
        }
        MediaKind::Video => {
            let mut media = InputMediaVideo::new(file);
            if let Some(caption) = item.caption.as_deref() {
                media = media.caption(caption);
            }
            InputMedia::Video(media)
        }
        MediaKind::Audio => {
            let mut media = InputMediaAudio::new(file);
            if let Some(caption) = item.caption.as_deref() {
                media = media.caption(caption);
            }
            InputMedia::Audio(media)
        }
        MediaKind::Document => {
            let mut media = InputMediaDocument::new(file);
            if let Some(caption) = item.caption.as_deref() {
                media = media.caption(caption);
            }
            InputMedia::Document(media)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use std::collections::BTreeSet;

    #[test]
    fn test_inline_markup_mirrors_keyboard() {
        let query = Query::multi_choice("Q0", "Pick", ["A", "B"]);
        let keyboard = query.keyboard(&BTreeSet::from([1])).expect("keyboard");

        let markup = inline_markup(&keyboard);
        let labels: Vec<_> = markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.clone())
            .collect();
        assert_eq!(labels, vec!["\u{2610} A", "\u{2612} B", "Done"]);
    }

    #[test]
    fn test_input_file_rejects_garbage_urls() {
        assert!(input_file(&MediaSource::url("not a url")).is_err());
        assert!(input_file(&MediaSource::file_id("abc")).is_ok());
        assert!(input_file(&MediaSource::url("https://example.com/x.png")).is_ok());
    }
}
