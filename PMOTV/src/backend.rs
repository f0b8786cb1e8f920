//! Simulated decoder.
//!
//! Loading takes a short random delay, then reports ready (or, with
//! probability `error_rate`, a random error). Once playing, the playhead
//! follows the session clock and the media ends at its duration. Live
//! streams have an infinite duration and are not seekable.

use std::sync::Arc;

use pmotvcontrol::{BackendEvent, BackendKind, MediaBackend, NetworkClock};
use pmotvsource::MediaErrorCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

const ERROR_CODES: &[MediaErrorCode] = &[
    MediaErrorCode::PlayerError,
    MediaErrorCode::InvalidUrl,
    MediaErrorCode::RateLimited,
    MediaErrorCode::Unknown,
];

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Idle,
    Loading {
        ready_at: f64,
        failure: Option<MediaErrorCode>,
    },
    Ready,
    Playing,
    Ended,
}

pub struct SimBackend {
    clock: Arc<dyn NetworkClock>,
    rng: StdRng,
    error_rate: f64,
    phase: Phase,
    duration: f64,
    /// Playhead at `anchor` (or the frozen playhead when not running).
    position: f64,
    /// Clock time the playhead started running from.
    anchor: Option<f64>,
    started: bool,
    pending: Vec<BackendEvent>,
}

impl SimBackend {
    pub fn new(clock: Arc<dyn NetworkClock>, seed: u64, error_rate: f64) -> Self {
        Self {
            clock,
            rng: StdRng::seed_from_u64(seed),
            error_rate: error_rate.clamp(0.0, 1.0),
            phase: Phase::Idle,
            duration: 0.0,
            position: 0.0,
            anchor: None,
            started: false,
            pending: Vec::new(),
        }
    }

    fn is_live(url: &str, kind: BackendKind) -> bool {
        kind == BackendKind::Stream && !url.contains(".mp4") && !url.contains(".webm")
    }
}

impl MediaBackend for SimBackend {
    fn load(&mut self, url: &str, kind: BackendKind) {
        let now = self.clock.now();
        let delay = self.rng.random_range(0.2..1.0);
        let failure = self
            .rng
            .random_bool(self.error_rate)
            .then(|| ERROR_CODES[self.rng.random_range(0..ERROR_CODES.len())]);
        self.duration = if Self::is_live(url, kind) {
            f64::INFINITY
        } else {
            self.rng.random_range(20.0..90.0_f64).round()
        };
        self.phase = Phase::Loading {
            ready_at: now + delay,
            failure,
        };
        self.position = 0.0;
        self.anchor = None;
        self.started = false;
        self.pending.clear();
        trace!(url, kind = kind.as_str(), delay, ?failure, "Simulated load");
    }

    fn play(&mut self) {
        if matches!(self.phase, Phase::Ready | Phase::Playing) && self.anchor.is_none() {
            self.anchor = Some(self.clock.now());
            self.phase = Phase::Playing;
            if !self.started {
                self.started = true;
                self.pending.push(BackendEvent::Start);
            }
        }
    }

    fn pause(&mut self) {
        self.position = self.time();
        self.anchor = None;
    }

    fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.position = 0.0;
        self.anchor = None;
    }

    fn set_time(&mut self, seconds: f64) {
        self.position = seconds.clamp(0.0, self.duration.max(0.0));
        if self.anchor.is_some() {
            self.anchor = Some(self.clock.now());
        }
    }

    fn time(&self) -> f64 {
        match self.anchor {
            Some(anchor) => (self.position + self.clock.now() - anchor).min(self.duration),
            None => self.position,
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    fn drain_events(&mut self) -> Vec<BackendEvent> {
        let now = self.clock.now();
        match self.phase {
            Phase::Loading { ready_at, failure } if now >= ready_at => match failure {
                Some(code) => {
                    self.phase = Phase::Idle;
                    self.pending.push(BackendEvent::Error(code));
                }
                None => {
                    self.phase = Phase::Ready;
                    self.pending.push(BackendEvent::Ready {
                        duration: self.duration,
                    });
                }
            },
            Phase::Playing if self.duration.is_finite() && self.time() >= self.duration => {
                self.phase = Phase::Ended;
                self.position = self.duration;
                self.anchor = None;
                self.pending.push(BackendEvent::End);
            }
            _ => {}
        }
        std::mem::take(&mut self.pending)
    }
}
