//! # pmotvsource - URL sources for shared video sessions
//!
//! A *source* decides which URL plays next and how the playback lifecycle
//! (ready, start, end, error, stop) of the media it produced should be
//! resolved: retry the same URL, advance to the next one, stop, or let the
//! controller apply its own default.
//!
//! # Architecture
//!
//! - **UrlSource** : the contract every source implements (capabilities,
//!   navigation, lifecycle callbacks, replicated state)
//! - **Source** : enum dispatching over the four concrete kinds
//!   ([`StaticSource`], [`StreamSource`], [`PlaylistSource`], [`QueueSource`])
//! - **SourceManager** : the ordered chain (queue → playlist → stream →
//!   static) consulted by the playback controller
//!
//! Sources never start playback. They only answer "what is the URL" and
//! "what should happen now"; transport belongs to `pmotvcontrol`.
//!
//! # Exemple d'utilisation
//!
//! ```
//! use pmotvsource::{MediaUrl, PlaylistSource, QueueSource, PlayerId, Source, SourceManager};
//!
//! let mut manager = SourceManager::new();
//! let mut playlist = PlaylistSource::new("main");
//! playlist.load(vec![
//!     MediaUrl::new("https://example.com/a.mp4"),
//!     MediaUrl::new("https://example.com/b.mp4"),
//! ]);
//! let queue_index = manager.push(Source::Queue(QueueSource::new("queue")));
//! manager.push(Source::Playlist(playlist));
//!
//! manager
//!     .enqueue(queue_index, MediaUrl::new("https://example.com/q.mp4"), PlayerId(7))
//!     .unwrap();
//! let (next, from) = manager.take_next_url(None, false).unwrap();
//! assert_eq!(next.url, "https://example.com/q.mp4");
//! assert_eq!(from, queue_index);
//! ```

mod error;
mod manager;
mod playlist;
mod queue;
mod source;
mod static_source;
mod stream;

#[cfg(feature = "pmotvconfig")]
mod config_ext;

use serde::{Deserialize, Serialize};

// Réexports publics
pub use error::{Result, SourceError};
pub use manager::SourceManager;
pub use playlist::{PlaylistSource, PlaylistState, PlaylistTrack, parse_playlist_text};
pub use queue::{QueueEntry, QueueLimits, QueueSource, QueueState, QueueTarget};
pub use source::{Source, SourceKind, SourceState, UrlSource};
pub use static_source::StaticSource;
pub use stream::{StreamRetryPolicy, StreamSource};

#[cfg(feature = "pmotvconfig")]
pub use config_ext::{PlaylistDefaults, SourceConfigExt};

/// Decision returned by a source from a lifecycle callback.
///
/// `Default` means "no opinion": the caller applies its own policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceDecision {
    #[default]
    Default,
    Retry,
    Advance,
    Stop,
}

/// Error codes reported by the media backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaErrorCode {
    AccessDenied,
    InvalidUrl,
    PlayerError,
    RateLimited,
    Unknown,
}

impl MediaErrorCode {
    /// True for errors that a different decoder might not hit.
    pub fn is_decoder_related(self) -> bool {
        matches!(self, MediaErrorCode::InvalidUrl | MediaErrorCode::PlayerError)
    }
}

/// Host-assigned identifier of a participant in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Monotonic change counter of one replicated group of fields.
///
/// Followers compare revisions rather than raw values: a group is applied
/// only when the incoming revision is strictly newer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Revision(pub u64);

impl Revision {
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn is_newer_than(self, other: Revision) -> bool {
        self.0 > other.0
    }
}

/// A playable locator: main URL, optional platform alternate and a title.
///
/// An empty `url` is the "no media" sentinel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUrl {
    pub url: String,
    #[serde(default)]
    pub alt_url: String,
    #[serde(default)]
    pub title: String,
}

impl MediaUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_alt(mut self, alt_url: impl Into<String>) -> Self {
        self.alt_url = alt_url.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
    }
}

/// What a source currently points at.
///
/// Queue entries may reference a track of a playlist catalog instead of
/// carrying a URL; the [`SourceManager`] resolves those.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaRef {
    Direct(MediaUrl),
    Catalog { source: usize, track: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_ordering() {
        let mut a = Revision::default();
        let b = a;
        a.bump();
        assert!(a.is_newer_than(b));
        assert!(!b.is_newer_than(a));
        assert!(!a.is_newer_than(a));
    }

    #[test]
    fn test_media_url_empty_sentinel() {
        assert!(MediaUrl::default().is_empty());
        assert!(MediaUrl::new("   ").is_empty());
        assert!(!MediaUrl::new("https://example.com/v.mp4").is_empty());
    }

    #[test]
    fn test_decoder_related_errors() {
        assert!(MediaErrorCode::PlayerError.is_decoder_related());
        assert!(MediaErrorCode::InvalidUrl.is_decoder_related());
        assert!(!MediaErrorCode::RateLimited.is_decoder_related());
        assert!(!MediaErrorCode::AccessDenied.is_decoder_related());
    }
}
