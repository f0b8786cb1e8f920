use serde::Deserialize;

use crate::model::RepeatMode;

/// Per-client playback policy (`player` section of the configuration).
///
/// Durations are in seconds.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Interval between follower reconciliation passes.
    pub sync_frequency: f64,
    /// Dead-band under which no seek is issued.
    pub sync_threshold: f64,
    /// Turn a source's "no opinion" on error into a retry.
    pub retry_on_error: bool,
    pub retry_timeout: f64,
    /// Local reloads a follower attempts after a backend error.
    pub local_retry_limit: u32,
    pub hold_videos: bool,
    pub repeat_mode: RepeatMode,
    pub tracking_interval: f64,
    /// Wait before a late joiner asks the authority to publish again.
    pub ownership_sync_timeout: f64,
    pub prefer_alternate_url: bool,
    /// Start the source chain as soon as the session starts.
    pub autoplay: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            sync_frequency: 5.0,
            sync_threshold: 1.0,
            retry_on_error: true,
            retry_timeout: 10.0,
            local_retry_limit: 3,
            hold_videos: false,
            repeat_mode: RepeatMode::None,
            tracking_interval: 1.0,
            ownership_sync_timeout: 5.0,
            prefer_alternate_url: false,
            autoplay: true,
        }
    }
}
