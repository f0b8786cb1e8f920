//! The URL source contract and its enum dispatch.
//!
//! Design goals:
//!   - Concrete sources implement a small set of primitives; navigation and
//!     lifecycle hooks have "not supported" / "no opinion" defaults.
//!   - Nothing here panics or throws across the source boundary: lifecycle
//!     callbacks return a [`SourceDecision`], mutators return [`Result`].
//!   - Every source exposes its replicated sub-state as a [`SourceState`]
//!     snapshot carrying per-group revisions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceError};
use crate::playlist::{PlaylistSource, PlaylistState};
use crate::queue::{QueueSource, QueueState};
use crate::static_source::StaticSource;
use crate::stream::StreamSource;
use crate::{MediaErrorCode, MediaRef, MediaUrl, PlayerId, Revision, SourceDecision};

/// Kind of a source; also its priority in the chain (lower first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    Queue,
    Playlist,
    Stream,
    Static,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Queue => "queue",
            SourceKind::Playlist => "playlist",
            SourceKind::Stream => "stream",
            SourceKind::Static => "static",
        }
    }
}

/// Replicated snapshot of a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SourceState {
    Static {
        media: MediaUrl,
        enabled: bool,
        revision: Revision,
    },
    Stream {
        media: MediaUrl,
        enabled: bool,
        auto_advance: bool,
        revision: Revision,
    },
    Playlist(PlaylistState),
    Queue(QueueState),
}

impl SourceState {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceState::Static { .. } => SourceKind::Static,
            SourceState::Stream { .. } => SourceKind::Stream,
            SourceState::Playlist(_) => SourceKind::Playlist,
            SourceState::Queue(_) => SourceKind::Queue,
        }
    }
}

/// Contract shared by every URL source.
pub trait UrlSource {
    // =====================================================================
    //  PRIMITIVES (must be implemented)
    // =====================================================================

    fn kind(&self) -> SourceKind;

    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// True when the source holds usable content at all.
    fn is_valid(&self) -> bool;

    /// What the source currently points at, if anything.
    fn current(&self) -> Option<MediaRef>;

    /// Snapshot of the replicated sub-state.
    fn state(&self) -> SourceState;

    /// Applies a replicated snapshot. Only strictly newer revision groups are
    /// taken; returns `true` when something changed.
    fn apply_state(&mut self, state: &SourceState) -> bool;

    // =====================================================================
    //  DEFAULT HELPERS
    // =====================================================================

    /// True when a URL can be handed out right now.
    fn is_ready(&self) -> bool {
        self.is_enabled() && self.is_valid() && self.current().is_some()
    }

    /// Whether the source takes part in automatic "play next".
    fn auto_advance(&self) -> bool {
        false
    }

    /// Main URL of the current item when it is a direct locator.
    fn current_url(&self) -> Option<String> {
        match self.current()? {
            MediaRef::Direct(media) if !media.is_empty() => Some(media.url),
            _ => None,
        }
    }

    /// Platform alternate URL of the current item, if any and non-blank.
    fn current_alt_url(&self) -> Option<String> {
        match self.current()? {
            MediaRef::Direct(media) if !media.alt_url.trim().is_empty() => Some(media.alt_url),
            _ => None,
        }
    }

    fn can_advance(&self) -> bool {
        false
    }

    fn can_retreat(&self) -> bool {
        false
    }

    /// Moves to the next item. Returns `Ok(false)` when there is none.
    fn advance(&mut self, _wrap: bool) -> Result<bool> {
        Err(SourceError::not_supported("advance", self.kind().as_str()))
    }

    /// Moves to the previous item. Returns `Ok(false)` when there is none.
    fn retreat(&mut self, _wrap: bool) -> Result<bool> {
        Err(SourceError::not_supported("retreat", self.kind().as_str()))
    }

    /// Jumps to the item at `index`.
    fn seek_to(&mut self, _index: usize) -> Result<()> {
        Err(SourceError::not_supported("seek_to", self.kind().as_str()))
    }

    fn add_track(&mut self, _media: MediaUrl, _owner: PlayerId) -> Result<()> {
        Err(SourceError::not_supported("add_track", self.kind().as_str()))
    }

    // =====================================================================
    //  LIFECYCLE CALLBACKS (for media this source produced)
    // =====================================================================

    /// A backend load of this source's URL is about to start.
    fn on_video_load(&mut self) {}

    fn on_video_ready(&mut self) {}

    fn on_video_start(&mut self) {}

    /// The controller moved away from this source's media.
    fn on_video_stop(&mut self) {}

    fn on_video_end(&mut self) -> SourceDecision {
        SourceDecision::Default
    }

    fn on_video_error(&mut self, _code: MediaErrorCode) -> SourceDecision {
        SourceDecision::Default
    }
}

/// Enum dispatch over the concrete source kinds.
#[derive(Clone, Debug)]
pub enum Source {
    Static(StaticSource),
    Stream(StreamSource),
    Playlist(PlaylistSource),
    Queue(QueueSource),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Source::Static($inner) => $body,
            Source::Stream($inner) => $body,
            Source::Playlist($inner) => $body,
            Source::Queue($inner) => $body,
        }
    };
}

impl Source {
    pub fn as_playlist(&self) -> Option<&PlaylistSource> {
        match self {
            Source::Playlist(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_playlist_mut(&mut self) -> Option<&mut PlaylistSource> {
        match self {
            Source::Playlist(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_queue(&self) -> Option<&QueueSource> {
        match self {
            Source::Queue(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_queue_mut(&mut self) -> Option<&mut QueueSource> {
        match self {
            Source::Queue(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamSource> {
        match self {
            Source::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut StreamSource> {
        match self {
            Source::Stream(s) => Some(s),
            _ => None,
        }
    }
}

impl UrlSource for Source {
    fn kind(&self) -> SourceKind {
        dispatch!(self, s => s.kind())
    }

    fn name(&self) -> &str {
        dispatch!(self, s => s.name())
    }

    fn is_enabled(&self) -> bool {
        dispatch!(self, s => s.is_enabled())
    }

    fn set_enabled(&mut self, enabled: bool) {
        dispatch!(self, s => s.set_enabled(enabled))
    }

    fn is_valid(&self) -> bool {
        dispatch!(self, s => s.is_valid())
    }

    fn current(&self) -> Option<MediaRef> {
        dispatch!(self, s => s.current())
    }

    fn state(&self) -> SourceState {
        dispatch!(self, s => s.state())
    }

    fn apply_state(&mut self, state: &SourceState) -> bool {
        dispatch!(self, s => s.apply_state(state))
    }

    fn is_ready(&self) -> bool {
        dispatch!(self, s => s.is_ready())
    }

    fn auto_advance(&self) -> bool {
        dispatch!(self, s => s.auto_advance())
    }

    fn can_advance(&self) -> bool {
        dispatch!(self, s => s.can_advance())
    }

    fn can_retreat(&self) -> bool {
        dispatch!(self, s => s.can_retreat())
    }

    fn advance(&mut self, wrap: bool) -> Result<bool> {
        dispatch!(self, s => s.advance(wrap))
    }

    fn retreat(&mut self, wrap: bool) -> Result<bool> {
        dispatch!(self, s => s.retreat(wrap))
    }

    fn seek_to(&mut self, index: usize) -> Result<()> {
        dispatch!(self, s => s.seek_to(index))
    }

    fn add_track(&mut self, media: MediaUrl, owner: PlayerId) -> Result<()> {
        dispatch!(self, s => s.add_track(media, owner))
    }

    fn on_video_load(&mut self) {
        dispatch!(self, s => s.on_video_load())
    }

    fn on_video_ready(&mut self) {
        dispatch!(self, s => s.on_video_ready())
    }

    fn on_video_start(&mut self) {
        dispatch!(self, s => s.on_video_start())
    }

    fn on_video_stop(&mut self) {
        dispatch!(self, s => s.on_video_stop())
    }

    fn on_video_end(&mut self) -> SourceDecision {
        dispatch!(self, s => s.on_video_end())
    }

    fn on_video_error(&mut self, code: MediaErrorCode) -> SourceDecision {
        dispatch!(self, s => s.on_video_error(code))
    }
}
