//! Static source: one fixed URL, optionally with a resolution variant.

use crate::source::{SourceKind, SourceState, UrlSource};
use crate::{MediaRef, MediaUrl, Revision};

/// A single configured URL with no advance semantics.
///
/// `variants` holds alternative renditions of the same media (e.g. 720p /
/// 1080p); [`StaticSource::select_variant`] swaps the active one.
#[derive(Clone, Debug)]
pub struct StaticSource {
    name: String,
    media: MediaUrl,
    variants: Vec<MediaUrl>,
    enabled: bool,
    revision: Revision,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, media: MediaUrl) -> Self {
        Self {
            name: name.into(),
            media,
            variants: Vec::new(),
            enabled: true,
            revision: Revision::default(),
        }
    }

    /// Registers resolution variants; the first one becomes active.
    pub fn with_variants(mut self, variants: Vec<MediaUrl>) -> Self {
        if let Some(first) = variants.first() {
            self.media = first.clone();
        }
        self.variants = variants;
        self
    }

    pub fn variants(&self) -> &[MediaUrl] {
        &self.variants
    }

    /// Makes variant `index` the active URL. Returns `false` if out of range.
    pub fn select_variant(&mut self, index: usize) -> bool {
        match self.variants.get(index) {
            Some(media) => {
                self.media = media.clone();
                self.revision.bump();
                true
            }
            None => false,
        }
    }

    pub fn media(&self) -> &MediaUrl {
        &self.media
    }
}

impl UrlSource for StaticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.revision.bump();
        }
    }

    fn is_valid(&self) -> bool {
        !self.media.is_empty()
    }

    fn current(&self) -> Option<MediaRef> {
        (!self.media.is_empty()).then(|| MediaRef::Direct(self.media.clone()))
    }

    fn state(&self) -> SourceState {
        SourceState::Static {
            media: self.media.clone(),
            enabled: self.enabled,
            revision: self.revision,
        }
    }

    fn apply_state(&mut self, state: &SourceState) -> bool {
        match state {
            SourceState::Static {
                media,
                enabled,
                revision,
            } if revision.is_newer_than(self.revision) => {
                self.media = media.clone();
                self.enabled = *enabled;
                self.revision = *revision;
                true
            }
            _ => false,
        }
    }
}
