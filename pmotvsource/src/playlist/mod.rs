//! Playlist source.
//!
//! A playlist is an ordered catalog of tracks plus a play order (a
//! permutation of catalog indices, identity unless shuffled) and a current
//! position in that order. The three groups (tracks, order, position) are
//! replicated independently, each with its own [`Revision`], so a follower
//! that missed a shuffle still applies a later index change correctly once
//! the shuffle arrives.
//!
//! In *catalog mode* the playlist behaves as a track catalog: next/previous
//! are disabled and only [`UrlSource::seek_to`] (jump to) is accepted.
//! Queue entries may reference catalog tracks by index.

mod parse;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::source::{SourceKind, SourceState, UrlSource};
use crate::{MediaErrorCode, MediaRef, MediaUrl, PlayerId, Revision, SourceDecision};

pub use parse::parse_playlist_text;

/// One catalog entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub media: MediaUrl,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PlaylistTrack {
    pub fn new(media: MediaUrl) -> Self {
        Self {
            media,
            tags: Vec::new(),
        }
    }

    /// Emptied slots are skipped and removed by compaction.
    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}

/// Replicated state of a playlist.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistState {
    pub tracks: Vec<PlaylistTrack>,
    pub tracks_revision: Revision,
    /// Play order: `order[position]` is a catalog index.
    pub order: Vec<usize>,
    pub order_revision: Revision,
    /// Current position in `order`.
    pub index: Option<usize>,
    pub index_revision: Revision,
    pub enabled: bool,
    pub auto_advance: bool,
    pub catalog_mode: bool,
    pub settings_revision: Revision,
}

#[derive(Clone, Debug)]
pub struct PlaylistSource {
    name: String,
    state: PlaylistState,
}

impl PlaylistSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PlaylistState {
                enabled: true,
                auto_advance: true,
                ..Default::default()
            },
        }
    }

    // =====================================================================
    //  Catalog
    // =====================================================================

    /// Replaces the whole catalog; the order is reset and the position set
    /// to the first track.
    pub fn load(&mut self, media: Vec<MediaUrl>) {
        self.load_tracks(media.into_iter().map(PlaylistTrack::new).collect());
    }

    pub fn load_tracks(&mut self, tracks: Vec<PlaylistTrack>) {
        let tracks: Vec<PlaylistTrack> = tracks.into_iter().filter(|t| !t.is_empty()).collect();
        let len = tracks.len();
        self.state.tracks = tracks;
        self.state.order = (0..len).collect();
        self.state.index = (len > 0).then_some(0);
        self.state.tracks_revision.bump();
        self.state.order_revision.bump();
        self.state.index_revision.bump();
        debug!(playlist = %self.name, tracks = len, "Playlist loaded");
    }

    /// Parses the playlist text format (see [`parse_playlist_text`]).
    pub fn parse_text(text: &str) -> Result<Vec<PlaylistTrack>> {
        parse_playlist_text(text)
    }

    /// Parses the playlist text format and loads the result.
    pub fn load_text(&mut self, text: &str) -> Result<usize> {
        let tracks = Self::parse_text(text)?;
        let count = tracks.len();
        self.load_tracks(tracks);
        Ok(count)
    }

    pub fn tracks(&self) -> &[PlaylistTrack] {
        &self.state.tracks
    }

    pub fn len(&self) -> usize {
        self.state.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.tracks.is_empty()
    }

    /// Catalog track at `index`.
    pub fn track(&self, index: usize) -> Option<&PlaylistTrack> {
        self.state.tracks.get(index).filter(|t| !t.is_empty())
    }

    /// Catalog tracks in play order.
    pub fn ordered_tracks(&self) -> impl Iterator<Item = &PlaylistTrack> {
        self.state
            .order
            .iter()
            .filter_map(|&i| self.state.tracks.get(i))
    }

    pub fn order(&self) -> &[usize] {
        &self.state.order
    }

    /// Current position in play order.
    pub fn position(&self) -> Option<usize> {
        self.state.index
    }

    /// Jumps to catalog track `index`; the only navigation allowed in
    /// catalog mode.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.seek_to(index)
    }

    /// Catalog index of the current track.
    pub fn current_track_index(&self) -> Option<usize> {
        self.state
            .index
            .and_then(|p| self.state.order.get(p).copied())
    }

    /// Empties catalog slot `index` and compacts the catalog.
    pub fn remove_track(&mut self, index: usize) -> Result<()> {
        let len = self.state.tracks.len();
        let slot = self
            .state
            .tracks
            .get_mut(index)
            .ok_or(SourceError::TrackOutOfRange { index, len })?;
        slot.media = MediaUrl::default();
        self.compact();
        Ok(())
    }

    /// Drops emptied slots, remapping the play order and position.
    fn compact(&mut self) {
        if !self.state.tracks.iter().any(PlaylistTrack::is_empty) {
            return;
        }

        let mut remap: Vec<Option<usize>> = Vec::with_capacity(self.state.tracks.len());
        let mut next = 0usize;
        for track in &self.state.tracks {
            if track.is_empty() {
                remap.push(None);
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }

        let old_order = std::mem::take(&mut self.state.order);
        let mut new_index = None;
        for (position, catalog) in old_order.iter().enumerate() {
            let mapped = remap.get(*catalog).copied().flatten();
            if let Some(mapped) = mapped {
                self.state.order.push(mapped);
            }
            if Some(position) == self.state.index {
                // The current track survives at its new position, or the
                // position now points at what followed it.
                new_index = Some(self.state.order.len() - usize::from(mapped.is_some()));
            }
        }

        self.state.tracks.retain(|t| !t.is_empty());
        let len = self.state.order.len();
        self.state.index = match new_index {
            _ if len == 0 => None,
            Some(p) => Some(p.min(len - 1)),
            None => None,
        };

        self.state.tracks_revision.bump();
        self.state.order_revision.bump();
        self.state.index_revision.bump();
    }

    // =====================================================================
    //  Order
    // =====================================================================

    /// Shuffles the play order; the current track moves to position 0.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.current_track_index();
        self.state.order.shuffle(rng);
        if let Some(track) = current {
            if let Some(p) = self.state.order.iter().position(|&t| t == track) {
                self.state.order.swap(0, p);
            }
            self.state.index = Some(0);
            self.state.index_revision.bump();
        }
        self.state.order_revision.bump();
    }

    /// Restores catalog order, keeping the current track.
    pub fn unshuffle(&mut self) {
        let current = self.current_track_index();
        self.state.order = (0..self.state.tracks.len()).collect();
        self.state.index = current;
        self.state.order_revision.bump();
        self.state.index_revision.bump();
    }

    pub fn is_shuffled(&self) -> bool {
        self.state.order.iter().enumerate().any(|(p, &t)| p != t)
    }

    // =====================================================================
    //  Settings
    // =====================================================================

    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        if self.state.auto_advance != auto_advance {
            self.state.auto_advance = auto_advance;
            self.state.settings_revision.bump();
        }
    }

    pub fn set_catalog_mode(&mut self, catalog_mode: bool) {
        if self.state.catalog_mode != catalog_mode {
            self.state.catalog_mode = catalog_mode;
            self.state.settings_revision.bump();
        }
    }

    pub fn is_catalog_mode(&self) -> bool {
        self.state.catalog_mode
    }

    fn set_position(&mut self, position: Option<usize>) {
        if self.state.index != position {
            self.state.index = position;
            self.state.index_revision.bump();
        }
    }
}

impl UrlSource for PlaylistSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Playlist
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
            self.state.settings_revision.bump();
        }
    }

    fn is_valid(&self) -> bool {
        !self.state.tracks.is_empty()
    }

    fn auto_advance(&self) -> bool {
        self.state.auto_advance && !self.state.catalog_mode
    }

    fn current(&self) -> Option<MediaRef> {
        let track = self.track(self.current_track_index()?)?;
        Some(MediaRef::Direct(track.media.clone()))
    }

    fn can_advance(&self) -> bool {
        if self.state.catalog_mode || self.state.order.is_empty() {
            return false;
        }
        match self.state.index {
            None => true,
            Some(p) => p + 1 < self.state.order.len(),
        }
    }

    fn can_retreat(&self) -> bool {
        !self.state.catalog_mode && matches!(self.state.index, Some(p) if p > 0)
    }

    fn advance(&mut self, wrap: bool) -> Result<bool> {
        if self.state.catalog_mode {
            return Err(SourceError::CatalogMode);
        }
        let len = self.state.order.len();
        if len == 0 {
            return Ok(false);
        }
        let next = match self.state.index {
            None => 0,
            Some(p) if p + 1 < len => p + 1,
            Some(_) if wrap => 0,
            Some(_) => return Ok(false),
        };
        self.set_position(Some(next));
        Ok(true)
    }

    fn retreat(&mut self, wrap: bool) -> Result<bool> {
        if self.state.catalog_mode {
            return Err(SourceError::CatalogMode);
        }
        let len = self.state.order.len();
        let previous = match self.state.index {
            Some(p) if p > 0 => p - 1,
            Some(_) | None if wrap && len > 0 => len - 1,
            _ => return Ok(false),
        };
        self.set_position(Some(previous));
        Ok(true)
    }

    /// Jumps to catalog track `index` (allowed in catalog mode).
    fn seek_to(&mut self, index: usize) -> Result<()> {
        let len = self.state.tracks.len();
        let position = self
            .state
            .order
            .iter()
            .position(|&t| t == index)
            .filter(|_| index < len)
            .ok_or(SourceError::TrackOutOfRange { index, len })?;
        self.set_position(Some(position));
        Ok(())
    }

    fn add_track(&mut self, media: MediaUrl, _owner: PlayerId) -> Result<()> {
        if media.is_empty() {
            return Err(SourceError::EmptyUrl);
        }
        self.state.tracks.push(PlaylistTrack::new(media));
        self.state.order.push(self.state.tracks.len() - 1);
        self.state.tracks_revision.bump();
        self.state.order_revision.bump();
        if self.state.index.is_none() {
            self.set_position(Some(0));
        }
        Ok(())
    }

    fn state(&self) -> SourceState {
        SourceState::Playlist(self.state.clone())
    }

    fn apply_state(&mut self, state: &SourceState) -> bool {
        let SourceState::Playlist(remote) = state else {
            return false;
        };
        let mut changed = false;
        if remote.tracks_revision.is_newer_than(self.state.tracks_revision) {
            self.state.tracks = remote.tracks.clone();
            self.state.tracks_revision = remote.tracks_revision;
            changed = true;
        }
        if remote.order_revision.is_newer_than(self.state.order_revision) {
            self.state.order = remote.order.clone();
            self.state.order_revision = remote.order_revision;
            changed = true;
        }
        if remote.index_revision.is_newer_than(self.state.index_revision) {
            self.state.index = remote.index;
            self.state.index_revision = remote.index_revision;
            changed = true;
        }
        if remote
            .settings_revision
            .is_newer_than(self.state.settings_revision)
        {
            self.state.enabled = remote.enabled;
            self.state.auto_advance = remote.auto_advance;
            self.state.catalog_mode = remote.catalog_mode;
            self.state.settings_revision = remote.settings_revision;
            changed = true;
        }
        changed
    }

    fn on_video_error(&mut self, code: MediaErrorCode) -> SourceDecision {
        if self.auto_advance() {
            debug!(playlist = %self.name, ?code, "Skipping broken playlist entry");
            SourceDecision::Advance
        } else {
            SourceDecision::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn playlist(n: usize) -> PlaylistSource {
        let mut p = PlaylistSource::new("main");
        p.load(
            (0..n)
                .map(|i| MediaUrl::new(format!("https://example.com/{i}.mp4")))
                .collect(),
        );
        p
    }

    #[test]
    fn test_load_sets_first_position() {
        let p = playlist(3);
        assert_eq!(p.position(), Some(0));
        assert_eq!(p.current_url().as_deref(), Some("https://example.com/0.mp4"));
        assert!(p.is_ready());
    }

    #[test]
    fn test_advance_and_wrap() {
        let mut p = playlist(2);
        assert!(p.advance(false).unwrap());
        assert_eq!(p.position(), Some(1));
        assert!(!p.can_advance());
        assert!(!p.advance(false).unwrap());
        assert!(p.advance(true).unwrap());
        assert_eq!(p.position(), Some(0));
    }

    #[test]
    fn test_retreat() {
        let mut p = playlist(3);
        assert!(!p.can_retreat());
        assert!(!p.retreat(false).unwrap());
        assert!(p.retreat(true).unwrap());
        assert_eq!(p.position(), Some(2));
        assert!(p.retreat(false).unwrap());
        assert_eq!(p.position(), Some(1));
    }

    #[test]
    fn test_catalog_mode_only_allows_jump() {
        let mut p = playlist(3);
        p.set_catalog_mode(true);
        assert!(matches!(p.advance(false), Err(SourceError::CatalogMode)));
        assert!(matches!(p.retreat(false), Err(SourceError::CatalogMode)));
        assert!(!p.can_advance());
        assert!(!p.auto_advance());
        p.seek_to(2).unwrap();
        assert_eq!(p.current_track_index(), Some(2));
        assert!(p.seek_to(9).is_err());
    }

    #[test]
    fn test_shuffle_keeps_current_track_first() {
        let mut p = playlist(10);
        p.seek_to(4).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        p.shuffle(&mut rng);
        assert_eq!(p.position(), Some(0));
        assert_eq!(p.current_track_index(), Some(4));
        let mut sorted = p.order().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());

        p.unshuffle();
        assert!(!p.is_shuffled());
        assert_eq!(p.current_track_index(), Some(4));
        assert_eq!(p.position(), Some(4));
    }

    #[test]
    fn test_remove_track_compacts() {
        let mut p = playlist(4);
        p.seek_to(2).unwrap();
        p.remove_track(1).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.order(), &[0, 1, 2]);
        // Track "2" is now catalog index 1 and still current.
        assert_eq!(p.current_url().as_deref(), Some("https://example.com/2.mp4"));

        // Removing the current track moves to what followed it.
        p.remove_track(1).unwrap();
        assert_eq!(p.current_url().as_deref(), Some("https://example.com/3.mp4"));

        assert!(matches!(
            p.remove_track(10),
            Err(SourceError::TrackOutOfRange { index: 10, len: 2 })
        ));
    }

    #[test]
    fn test_remove_last_current_track_clamps() {
        let mut p = playlist(2);
        p.seek_to(1).unwrap();
        p.remove_track(1).unwrap();
        assert_eq!(p.position(), Some(0));
        p.remove_track(0).unwrap();
        assert_eq!(p.position(), None);
        assert!(!p.is_valid());
    }

    #[test]
    fn test_add_track_to_empty_playlist() {
        let mut p = PlaylistSource::new("empty");
        assert!(!p.is_ready());
        p.add_track(MediaUrl::new("https://example.com/x.mp4"), PlayerId(1))
            .unwrap();
        assert!(p.is_ready());
        assert!(p.add_track(MediaUrl::new(""), PlayerId(1)).is_err());
    }

    #[test]
    fn test_apply_state_groups_independently() {
        let mut authority = playlist(5);
        let mut follower = authority.clone();

        authority.advance(false).unwrap();
        let index_only = authority.state();
        authority.shuffle(&mut StdRng::seed_from_u64(1));
        let shuffled = authority.state();

        assert!(follower.apply_state(&shuffled));
        assert_eq!(follower.order(), authority.order());
        assert_eq!(follower.position(), authority.position());
        // An older snapshot arriving late changes nothing.
        assert!(!follower.apply_state(&index_only));
        assert_eq!(follower.current_track_index(), authority.current_track_index());
    }

    #[test]
    fn test_error_decision_follows_auto_advance() {
        let mut p = playlist(2);
        assert_eq!(p.on_video_error(MediaErrorCode::Unknown), SourceDecision::Advance);
        p.set_auto_advance(false);
        assert_eq!(p.on_video_error(MediaErrorCode::Unknown), SourceDecision::Default);
        assert_eq!(p.on_video_end(), SourceDecision::Default);
    }
}
