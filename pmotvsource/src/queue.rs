//! Queue source: a FIFO of ad-hoc entries added by participants.
//!
//! Entries are either direct URLs or references into a playlist catalog.
//! Consuming an entry pops it and compacts the storage down; nothing is ever
//! deleted in place.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::source::{SourceKind, SourceState, UrlSource};
use crate::{MediaErrorCode, MediaRef, MediaUrl, PlayerId, Revision, SourceDecision};

/// What a queue entry plays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueTarget {
    Url(MediaUrl),
    /// Track `track` of the playlist at chain index `source`.
    Catalog { source: usize, track: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub target: QueueTarget,
    pub owner: PlayerId,
    #[serde(default)]
    pub title: String,
}

impl QueueEntry {
    pub fn media_ref(&self) -> MediaRef {
        match &self.target {
            QueueTarget::Url(media) => MediaRef::Direct(media.clone()),
            QueueTarget::Catalog { source, track } => MediaRef::Catalog {
                source: *source,
                track: *track,
            },
        }
    }
}

/// Size limits of a [`QueueSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueLimits {
    pub max_entries: usize,
    pub max_entries_per_player: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_entries: 20,
            max_entries_per_player: 3,
        }
    }
}

/// Replicated state of a queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub entries: Vec<QueueEntry>,
    pub enabled: bool,
    pub auto_advance: bool,
    pub revision: Revision,
}

#[derive(Clone, Debug)]
pub struct QueueSource {
    name: String,
    limits: QueueLimits,
    state: QueueState,
}

impl QueueSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limits: QueueLimits::default(),
            state: QueueState {
                entries: Vec::new(),
                enabled: true,
                auto_advance: true,
                revision: Revision::default(),
            },
        }
    }

    pub fn with_limits(mut self, limits: QueueLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.state.entries
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    pub fn count_for(&self, player: PlayerId) -> usize {
        self.state
            .entries
            .iter()
            .filter(|e| e.owner == player)
            .count()
    }

    /// Appends an entry, enforcing the total and per-player limits.
    pub fn add(&mut self, target: QueueTarget, owner: PlayerId, title: impl Into<String>) -> Result<()> {
        if matches!(&target, QueueTarget::Url(media) if media.is_empty()) {
            return Err(SourceError::EmptyUrl);
        }
        if self.state.entries.len() >= self.limits.max_entries {
            return Err(SourceError::QueueFull(self.limits.max_entries));
        }
        if self.count_for(owner) >= self.limits.max_entries_per_player {
            return Err(SourceError::PlayerQueueLimit {
                player: owner.0,
                limit: self.limits.max_entries_per_player,
            });
        }

        let title = title.into();
        info!(queue = %self.name, player = owner.0, title = %title, "Entry queued");
        self.state.entries.push(QueueEntry {
            target,
            owner,
            title,
        });
        self.state.revision.bump();
        Ok(())
    }

    /// Queues track `track` of the playlist at chain index `source`.
    pub fn add_catalog(&mut self, source: usize, track: usize, owner: PlayerId, title: impl Into<String>) -> Result<()> {
        self.add(QueueTarget::Catalog { source, track }, owner, title)
    }

    /// Removes and returns the head entry.
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        if self.state.entries.is_empty() {
            return None;
        }
        let entry = self.state.entries.remove(0);
        self.state.revision.bump();
        debug!(queue = %self.name, remaining = self.state.entries.len(), "Entry consumed");
        Some(entry)
    }

    /// Removes entry `index`. Only its owner or the session authority may.
    pub fn remove(&mut self, index: usize, requester: PlayerId, is_authority: bool) -> Result<QueueEntry> {
        let len = self.state.entries.len();
        let entry = self
            .state
            .entries
            .get(index)
            .ok_or(SourceError::TrackOutOfRange { index, len })?;
        if !is_authority && entry.owner != requester {
            return Err(SourceError::Other(anyhow::anyhow!(
                "player {} cannot remove an entry owned by player {}",
                requester.0,
                entry.owner.0
            )));
        }
        let entry = self.state.entries.remove(index);
        self.state.revision.bump();
        Ok(entry)
    }

    pub fn clear(&mut self) {
        if !self.state.entries.is_empty() {
            self.state.entries.clear();
            self.state.revision.bump();
        }
    }

    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        if self.state.auto_advance != auto_advance {
            self.state.auto_advance = auto_advance;
            self.state.revision.bump();
        }
    }
}

impl UrlSource for QueueSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Queue
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.state.enabled != enabled {
            self.state.enabled = enabled;
            self.state.revision.bump();
        }
    }

    fn is_valid(&self) -> bool {
        !self.state.entries.is_empty()
    }

    fn auto_advance(&self) -> bool {
        self.state.auto_advance
    }

    /// The head of the queue, i.e. what plays next.
    fn current(&self) -> Option<MediaRef> {
        self.state.entries.first().map(QueueEntry::media_ref)
    }

    fn can_advance(&self) -> bool {
        !self.state.entries.is_empty()
    }

    /// Advancing a queue consumes its head.
    fn advance(&mut self, _wrap: bool) -> Result<bool> {
        Ok(self.pop_front().is_some())
    }

    fn add_track(&mut self, media: MediaUrl, owner: PlayerId) -> Result<()> {
        let title = media.title.clone();
        self.add(QueueTarget::Url(media), owner, title)
    }

    fn state(&self) -> SourceState {
        SourceState::Queue(self.state.clone())
    }

    fn apply_state(&mut self, state: &SourceState) -> bool {
        match state {
            SourceState::Queue(remote) if remote.revision.is_newer_than(self.state.revision) => {
                self.state = remote.clone();
                true
            }
            _ => false,
        }
    }

    fn on_video_error(&mut self, _code: MediaErrorCode) -> SourceDecision {
        SourceDecision::Advance
    }
}
