//! Platform-neutral media descriptions.
//!
//! A [`Media`] value names something sendable to a chat without committing
//! to a platform: the transport maps it onto its own upload types. Sources
//! are either a file id already known to the platform or a public URL.

/// What kind of media a [`Media`] value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A photo.
    Photo,
    /// A video.
    Video,
    /// An audio track.
    Audio,
    /// A generic document.
    Document,
}

/// Where the media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A file already hosted by the platform, referenced by id.
    FileId(String),
    /// A publicly reachable URL the platform fetches itself.
    Url(String),
}

impl MediaSource {
    /// Reference a platform-hosted file by id.
    #[must_use]
    pub fn file_id(id: impl Into<String>) -> Self {
        Self::FileId(id.into())
    }

    /// Reference a publicly reachable URL.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }
}

/// One sendable media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    /// The media kind.
    pub kind: MediaKind,
    /// Where the bytes come from.
    pub source: MediaSource,
    /// Optional caption shown with the media.
    pub caption: Option<String>,
}

impl Media {
    /// Create a photo.
    #[must_use]
    pub fn photo(source: MediaSource) -> Self {
        Self {
            kind: MediaKind::Photo,
            source,
            caption: None,
        }
    }

    /// Create a video.
    #[must_use]
    pub fn video(source: MediaSource) -> Self {
        Self {
            kind: MediaKind::Video,
            source,
            caption: None,
        }
    }

    /// Create an audio track.
    #[must_use]
    pub fn audio(source: MediaSource) -> Self {
        Self {
            kind: MediaKind::Audio,
            source,
            caption: None,
        }
    }

    /// Create a document.
    #[must_use]
    pub fn document(source: MediaSource) -> Self {
        Self {
            kind: MediaKind::Document,
            source,
            caption: None,
        }
    }

    /// Set the caption.
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_builders() {
        let media = Media::photo(MediaSource::file_id("abc")).with_caption("look");
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.source, MediaSource::FileId("abc".into()));
        assert_eq!(media.caption.as_deref(), Some("look"));

        let media = Media::document(MediaSource::url("https://example.com/report.pdf"));
        assert_eq!(media.kind, MediaKind::Document);
        assert!(media.caption.is_none());
    }
}
