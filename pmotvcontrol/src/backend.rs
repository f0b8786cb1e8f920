//! Media backend capabilities consumed by the controller.
//!
//! The backend decodes and displays; the controller only drives it. Results
//! of asynchronous operations come back as [`BackendEvent`]s, either pushed
//! by the host through `PlaybackController::on_backend_event` or pulled
//! once per tick through [`MediaBackend::drain_events`].

use pmotvsource::MediaErrorCode;

use crate::model::BackendKind;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackendEvent {
    /// Media is loaded; `duration` in seconds (infinite or 0 for live).
    Ready { duration: f64 },
    Start,
    End,
    Error(MediaErrorCode),
    /// The decoder family switched underneath us.
    SourceChanged(BackendKind),
}

pub trait MediaBackend {
    /// Starts loading `url` with the given decoder family.
    fn load(&mut self, url: &str, kind: BackendKind);

    fn play(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    /// Seeks to `seconds`.
    fn set_time(&mut self, seconds: f64);

    fn time(&self) -> f64;

    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Events produced since the last call.
    fn drain_events(&mut self) -> Vec<BackendEvent> {
        Vec::new()
    }
}
