//! The replicated playback record and the updates carried between clients.

use std::cmp::Ordering;

use pmotvsource::{MediaUrl, PlayerId, Revision, SourceState};
use serde::{Deserialize, Serialize};

use crate::model::{BackendKind, RepeatMode, ScreenFit};

/// Shared playback truth, written by the authority only.
///
/// An empty `url` means "nothing playing". `video_number` only grows; a
/// follower (re)loads when it differs from the last one it loaded.
/// `playback_number < video_number` means the video is loaded but held.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRecord {
    pub url: String,
    /// Platform alternate locator; empty when absent.
    #[serde(default)]
    pub alt_url: String,
    #[serde(default)]
    pub title: String,
    /// Chain index of the source that produced `url`; `None` for manual URLs.
    pub source_index: Option<usize>,

    pub video_number: u64,
    pub playback_number: u64,

    /// Network time at which position 0 of the track plays.
    pub start_network_time: f64,
    /// `start_network_time + duration`, or 0 for live / unseekable media.
    pub expected_end_time: f64,
    /// Position the authority paused at.
    #[serde(default)]
    pub paused_position: f64,

    pub owner_playing: bool,
    pub owner_paused: bool,

    // Session policy
    pub locked: bool,
    pub repeat_mode: RepeatMode,
    pub hold_videos: bool,
    pub screen_fit: ScreenFit,
    pub backend_override: Option<BackendKind>,

    /// Bumped each time a client becomes the authority.
    #[serde(default)]
    pub epoch: u64,
    /// Authority that wrote this record.
    #[serde(default)]
    pub publisher: Option<PlayerId>,
    /// Bumped on every publish; only meaningful within one epoch.
    pub revision: Revision,
}

impl PlaybackRecord {
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
    }

    /// Loaded but not yet allowed to play.
    pub fn is_held(&self) -> bool {
        self.playback_number < self.video_number
    }

    pub fn media(&self) -> MediaUrl {
        MediaUrl {
            url: self.url.clone(),
            alt_url: self.alt_url.clone(),
            title: self.title.clone(),
        }
    }

    pub(crate) fn set_media(&mut self, media: &MediaUrl, source_index: Option<usize>) {
        self.url = media.url.clone();
        self.alt_url = media.alt_url.clone();
        self.title = media.title.clone();
        self.source_index = source_index;
    }

    /// Should a follower holding `current` replace it with `self`?
    ///
    /// A later epoch always wins and an earlier one never does. Two
    /// authorities can share an epoch when the second missed the first's
    /// takeover; a change of publisher is then accepted as is.
    pub fn supersedes(&self, current: &PlaybackRecord) -> bool {
        match self.epoch.cmp(&current.epoch) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal if self.publisher != current.publisher => true,
            Ordering::Equal => self.revision.is_newer_than(current.revision),
        }
    }

    /// True when the owner's transport says followers should be playing.
    pub fn owner_is_playing(&self) -> bool {
        self.owner_playing && !self.owner_paused && !self.is_held()
    }
}

/// What travels on the replication channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReplicatedUpdate {
    Playback(PlaybackRecord),
    /// Snapshots of the source chain, indexed like the chain.
    Sources(Vec<SourceState>),
}
