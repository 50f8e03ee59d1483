//! Lazy file download from the Bot API.
//!
//! Telegram needs a `getFile` round trip to resolve a file id into a
//! download path. [`LazyDownload`] defers that work to the first read, so
//! handing an attachment to a dialog handler costs nothing until the
//! handler actually consumes it. A failed open resets the reader, so the
//! next read attempts the download again.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::TryStreamExt;
use futures::future::BoxFuture;
use teloxide::net::Download;
use teloxide::prelude::Requester;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

use crate::transport::ByteStream;

type Opener = Box<dyn Fn() -> BoxFuture<'static, io::Result<ByteStream>> + Send>;

enum State {
    Idle,
    Opening(BoxFuture<'static, io::Result<ByteStream>>),
    Reading(ByteStream),
}

/// An [`AsyncRead`] over a Telegram file that opens on first read.
pub(crate) struct LazyDownload {
    opener: Opener,
    state: State,
}

impl LazyDownload {
    pub(crate) fn new(bot: teloxide::Bot, file_id: String) -> Self {
        Self::with_opener(Box::new(move || {
            Box::pin(open(bot.clone(), file_id.clone()))
        }))
    }

    fn with_opener(opener: Opener) -> Self {
        Self {
            opener,
            state: State::Idle,
        }
    }
}

impl AsyncRead for LazyDownload {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Idle) {
                State::Idle => this.state = State::Opening((this.opener)()),
                State::Opening(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(stream)) => this.state = State::Reading(stream),
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {
                        this.state = State::Opening(fut);
                        return Poll::Pending;
                    }
                },
                State::Reading(mut stream) => {
                    let result = stream.as_mut().poll_read(cx, buf);
                    this.state = State::Reading(stream);
                    return result;
                }
            }
        }
    }
}

async fn open(bot: teloxide::Bot, file_id: String) -> io::Result<ByteStream> {
    let file = bot.get_file(file_id).await.map_err(io::Error::other)?;
    let stream = bot
        .download_file_stream(&file.path)
        .map_err(io::Error::other);
    Ok(Box::pin(StreamReader::new(stream)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::AsyncReadExt;

    fn counting_opener(calls: Arc<AtomicUsize>, fail_first: bool) -> Opener {
        Box::new(move || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if fail_first && attempt == 0 {
                    return Err(io::Error::other("telegram hiccup"));
                }
                let stream: ByteStream = Box::pin(Cursor::new(b"payload".to_vec()));
                Ok(stream)
            })
        })
    }

    #[tokio::test]
    async fn test_open_is_deferred_until_first_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reader = LazyDownload::with_opener(counting_opener(Arc::clone(&calls), false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried_on_the_next_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reader = LazyDownload::with_opener(counting_opener(Arc::clone(&calls), true));

        let mut buf = Vec::new();
        assert!(reader.read_to_end(&mut buf).await.is_err());

        buf.clear();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"payload");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
