//! Ordered chain of URL sources.
//!
//! Sources keep their insertion index for life (it is how queue entries and
//! replicated snapshots refer to them), while lookups walk them in priority
//! order: queue, then playlist, then stream, then static. Sources of the
//! same kind keep their insertion order.

use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::playlist::PlaylistSource;
use crate::queue::QueueSource;
use crate::source::{Source, SourceKind, SourceState, UrlSource};
use crate::{MediaRef, MediaUrl, PlayerId};

#[derive(Clone, Debug, Default)]
pub struct SourceManager {
    sources: Vec<Source>,
    priority: Vec<usize>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source and returns its stable index.
    pub fn push(&mut self, source: Source) -> usize {
        let index = self.sources.len();
        debug!(index, kind = source.kind().as_str(), name = source.name(), "Source registered");
        self.sources.push(source);
        self.priority.push(index);
        let sources = &self.sources;
        self.priority.sort_by_key(|&i| sources[i].kind());
        index
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Source> {
        self.sources.get_mut(index)
    }

    /// Sources in priority order, with their stable index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Source)> {
        self.priority.iter().map(move |&i| (i, &self.sources[i]))
    }

    pub fn playlist(&self, index: usize) -> Result<&PlaylistSource> {
        self.get(index)
            .ok_or(SourceError::NoSuchSource(index))?
            .as_playlist()
            .ok_or(SourceError::WrongKind(index, SourceKind::Playlist.as_str()))
    }

    pub fn playlist_mut(&mut self, index: usize) -> Result<&mut PlaylistSource> {
        self.get_mut(index)
            .ok_or(SourceError::NoSuchSource(index))?
            .as_playlist_mut()
            .ok_or(SourceError::WrongKind(index, SourceKind::Playlist.as_str()))
    }

    pub fn queue(&self, index: usize) -> Result<&QueueSource> {
        self.get(index)
            .ok_or(SourceError::NoSuchSource(index))?
            .as_queue()
            .ok_or(SourceError::WrongKind(index, SourceKind::Queue.as_str()))
    }

    pub fn queue_mut(&mut self, index: usize) -> Result<&mut QueueSource> {
        self.get_mut(index)
            .ok_or(SourceError::NoSuchSource(index))?
            .as_queue_mut()
            .ok_or(SourceError::WrongKind(index, SourceKind::Queue.as_str()))
    }

    // =====================================================================
    //  Resolution
    // =====================================================================

    /// Turns a media reference into a playable URL.
    ///
    /// Catalog references resolve through the referenced playlist; a stale
    /// reference (removed track, wrong source) resolves to `None`.
    pub fn resolve(&self, media: &MediaRef) -> Option<MediaUrl> {
        match media {
            MediaRef::Direct(media) if !media.is_empty() => Some(media.clone()),
            MediaRef::Direct(_) => None,
            MediaRef::Catalog { source, track } => self
                .playlist(*source)
                .ok()?
                .track(*track)
                .map(|t| t.media.clone()),
        }
    }

    fn resolve_current(&self, index: usize) -> Option<MediaUrl> {
        let source = self.sources.get(index)?;
        if !source.is_ready() {
            return None;
        }
        self.resolve(&source.current()?)
    }

    /// First source (in priority order) with a playable URL, without
    /// consuming anything.
    pub fn ready_url(&self) -> Option<(MediaUrl, usize)> {
        self.priority
            .iter()
            .find_map(|&i| self.resolve_current(i).map(|m| (m, i)))
    }

    /// Like [`SourceManager::ready_url`], but a queue entry that gets chosen
    /// is consumed.
    pub fn take_ready_url(&mut self) -> Option<(MediaUrl, usize)> {
        let (media, index) = self.ready_url()?;
        if let Some(queue) = self.sources[index].as_queue_mut() {
            queue.pop_front();
        }
        Some((media, index))
    }

    /// Next URL for automatic advance, after `current` finished.
    ///
    /// - a non-empty auto-advance queue is popped first (stale catalog
    ///   references are dropped);
    /// - an auto-advance playlist moves to its next track (`wrap` for
    ///   repeat-all);
    /// - an auto-advance stream serves as fallback, unless it is the source
    ///   that just gave up;
    /// - static sources never auto-advance.
    pub fn take_next_url(&mut self, current: Option<usize>, wrap: bool) -> Option<(MediaUrl, usize)> {
        let priority = self.priority.clone();
        for index in priority {
            let kind = self.sources[index].kind();
            if !self.sources[index].is_enabled() || !self.sources[index].auto_advance() {
                continue;
            }
            match kind {
                SourceKind::Queue => {
                    while let Some(entry) = self
                        .sources[index]
                        .as_queue_mut()
                        .and_then(QueueSource::pop_front)
                    {
                        match self.resolve(&entry.media_ref()) {
                            Some(media) => return Some((media, index)),
                            None => warn!(queue = index, "Dropping stale queue entry"),
                        }
                    }
                }
                SourceKind::Playlist => {
                    if !self.sources[index].is_valid() {
                        continue;
                    }
                    match self.sources[index].advance(wrap) {
                        Ok(true) => {
                            if let Some(media) = self.resolve_current(index) {
                                return Some((media, index));
                            }
                        }
                        Ok(false) => {}
                        Err(e) => debug!(playlist = index, error = %e, "Playlist cannot advance"),
                    }
                }
                SourceKind::Stream => {
                    if current == Some(index) {
                        continue;
                    }
                    if let Some(media) = self.resolve_current(index) {
                        return Some((media, index));
                    }
                }
                SourceKind::Static => {}
            }
        }
        None
    }

    /// Previous playlist track, for a user "previous" action.
    pub fn take_previous_url(&mut self, wrap: bool) -> Option<(MediaUrl, usize)> {
        let priority = self.priority.clone();
        for index in priority {
            let source = &mut self.sources[index];
            if source.kind() != SourceKind::Playlist || !source.is_enabled() {
                continue;
            }
            if let Ok(true) = source.retreat(wrap) {
                if let Some(media) = self.resolve_current(index) {
                    return Some((media, index));
                }
            }
        }
        None
    }

    pub fn can_advance(&self) -> bool {
        self.iter().any(|(_, s)| {
            s.is_enabled()
                && match s.kind() {
                    SourceKind::Queue | SourceKind::Playlist => s.can_advance(),
                    SourceKind::Stream => s.auto_advance() && s.is_ready(),
                    SourceKind::Static => false,
                }
        })
    }

    pub fn can_retreat(&self) -> bool {
        self.iter().any(|(_, s)| s.is_enabled() && s.can_retreat())
    }

    // =====================================================================
    //  Queue helpers
    // =====================================================================

    pub fn enqueue(&mut self, queue: usize, media: MediaUrl, owner: PlayerId) -> Result<()> {
        self.queue_mut(queue)?.add_track(media, owner)
    }

    /// Queues a playlist catalog track by reference.
    pub fn enqueue_catalog(&mut self, queue: usize, playlist: usize, track: usize, owner: PlayerId) -> Result<()> {
        let source = self.playlist(playlist)?;
        let title = source
            .track(track)
            .ok_or(SourceError::TrackOutOfRange {
                index: track,
                len: source.len(),
            })?
            .media
            .title
            .clone();
        self.queue_mut(queue)?.add_catalog(playlist, track, owner, title)
    }

    // =====================================================================
    //  Replication
    // =====================================================================

    /// Snapshots of every source, by stable index.
    pub fn snapshot(&self) -> Vec<SourceState> {
        self.sources.iter().map(UrlSource::state).collect()
    }

    /// Applies a snapshot produced by [`SourceManager::snapshot`]. Returns
    /// `true` when any source changed.
    pub fn apply_snapshot(&mut self, states: &[SourceState]) -> bool {
        if states.len() != self.sources.len() {
            warn!(
                local = self.sources.len(),
                remote = states.len(),
                "Source chain shape mismatch"
            );
        }
        let mut changed = false;
        for (source, state) in self.sources.iter_mut().zip(states) {
            if source.kind() != state.kind() {
                warn!(name = source.name(), "Source kind mismatch in snapshot");
                continue;
            }
            changed |= source.apply_state(state);
        }
        changed
    }
}
