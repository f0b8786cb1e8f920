//! Stream source: one configurable URL with bounded retry budgets.
//!
//! Live streams drop, stall and come back. The source keeps three
//! independent counters:
//! - errors before the backend reported *ready* (consecutive; reset on ready),
//! - errors after *ready*,
//! - end-of-stream events.
//!
//! While a counter is within its threshold the source asks for a retry; past
//! it, the source asks the controller to advance. Counters reset when the
//! controller moves away from the stream.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::source::{SourceKind, SourceState, UrlSource};
use crate::{MediaErrorCode, MediaRef, MediaUrl, PlayerId, Revision, SourceDecision};

/// Retry thresholds of a [`StreamSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamRetryPolicy {
    pub pre_error_retries: u32,
    pub post_error_retries: u32,
    pub end_retries: u32,
}

impl Default for StreamRetryPolicy {
    fn default() -> Self {
        Self {
            pre_error_retries: 3,
            post_error_retries: 3,
            end_retries: 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamSource {
    name: String,
    media: MediaUrl,
    enabled: bool,
    auto_advance: bool,
    revision: Revision,
    policy: StreamRetryPolicy,
    ready_seen: bool,
    pre_ready_errors: u32,
    post_ready_errors: u32,
    end_count: u32,
}

impl StreamSource {
    pub fn new(name: impl Into<String>, media: MediaUrl) -> Self {
        Self {
            name: name.into(),
            media,
            enabled: true,
            auto_advance: true,
            revision: Revision::default(),
            policy: StreamRetryPolicy::default(),
            ready_seen: false,
            pre_ready_errors: 0,
            post_ready_errors: 0,
            end_count: 0,
        }
    }

    pub fn with_policy(mut self, policy: StreamRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StreamRetryPolicy {
        self.policy
    }

    pub fn media(&self) -> &MediaUrl {
        &self.media
    }

    /// Replaces the configured URL.
    pub fn set_media(&mut self, media: MediaUrl) -> Result<()> {
        if media.is_empty() {
            return Err(SourceError::EmptyUrl);
        }
        self.media = media;
        self.reset_counters();
        self.revision.bump();
        Ok(())
    }

    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        if self.auto_advance != auto_advance {
            self.auto_advance = auto_advance;
            self.revision.bump();
        }
    }

    /// (pre-ready errors, post-ready errors, ends) seen so far.
    pub fn counters(&self) -> (u32, u32, u32) {
        (self.pre_ready_errors, self.post_ready_errors, self.end_count)
    }

    fn reset_counters(&mut self) {
        self.ready_seen = false;
        self.pre_ready_errors = 0;
        self.post_ready_errors = 0;
        self.end_count = 0;
    }

    fn bounded(count: u32, threshold: u32) -> SourceDecision {
        if count > threshold {
            SourceDecision::Advance
        } else {
            SourceDecision::Retry
        }
    }
}

impl UrlSource for StreamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Stream
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

    fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    fn current(&self) -> Option<MediaRef> {
        (!self.media.is_empty()).then(|| MediaRef::Direct(self.media.clone()))
    }

    /// Adding a track to a stream replaces its URL.
    fn add_track(&mut self, media: MediaUrl, _owner: PlayerId) -> Result<()> {
        self.set_media(media)
    }

    fn state(&self) -> SourceState {
        SourceState::Stream {
            media: self.media.clone(),
            enabled: self.enabled,
            auto_advance: self.auto_advance,
            revision: self.revision,
        }
    }

    fn apply_state(&mut self, state: &SourceState) -> bool {
        match state {
            SourceState::Stream {
                media,
                enabled,
                auto_advance,
                revision,
            } if revision.is_newer_than(self.revision) => {
                if *media != self.media {
                    self.reset_counters();
                }
                self.media = media.clone();
                self.enabled = *enabled;
                self.auto_advance = *auto_advance;
                self.revision = *revision;
                true
            }
            _ => false,
        }
    }

    fn on_video_load(&mut self) {
        self.ready_seen = false;
    }

    fn on_video_ready(&mut self) {
        self.ready_seen = true;
        self.pre_ready_errors = 0;
    }

    fn on_video_stop(&mut self) {
        self.reset_counters();
    }

    fn on_video_end(&mut self) -> SourceDecision {
        self.end_count += 1;
        let decision = Self::bounded(self.end_count, self.policy.end_retries);
        debug!(stream = %self.name, ends = self.end_count, ?decision, "Stream ended");
        decision
    }

    fn on_video_error(&mut self, code: MediaErrorCode) -> SourceDecision {
        let decision = if self.ready_seen {
            self.post_ready_errors += 1;
            Self::bounded(self.post_ready_errors, self.policy.post_error_retries)
        } else {
            self.pre_ready_errors += 1;
            Self::bounded(self.pre_ready_errors, self.policy.pre_error_retries)
        };
        debug!(
            stream = %self.name,
            ?code,
            pre = self.pre_ready_errors,
            post = self.post_ready_errors,
            ?decision,
            "Stream error"
        );
        decision
    }
}
