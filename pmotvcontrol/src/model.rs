use serde::{Deserialize, Serialize};

/// Local transport state of a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayerState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Error,
}

impl PlayerState {
    pub fn as_str(&self) -> &str {
        match self {
            PlayerState::Stopped => "STOPPED",
            PlayerState::Loading => "LOADING",
            PlayerState::Playing => "PLAYING",
            PlayerState::Error => "ERROR",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PlayerState::Loading | PlayerState::Playing)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    Single,
}

impl RepeatMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, RepeatMode::None)
    }
}

/// How the video is fitted to the screen. Carried for observers only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenFit {
    #[default]
    Fit,
    FitWidth,
    FitHeight,
    Stretch,
}

/// Decoder family used by the media backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// File-like media with a known duration.
    #[default]
    Progressive,
    /// Live or low-latency streams.
    Stream,
}

impl BackendKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::Progressive => "progressive",
            BackendKind::Stream => "stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_mode_serde() {
        let mode: RepeatMode = serde_json::from_str("\"single\"").unwrap();
        assert_eq!(mode, RepeatMode::Single);
        assert!(mode.is_enabled());
        assert!(!RepeatMode::None.is_enabled());
    }

    #[test]
    fn test_player_state_active() {
        assert!(PlayerState::Loading.is_active());
        assert!(!PlayerState::Error.is_active());
    }
}
