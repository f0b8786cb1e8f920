//! Extension de pmotvconfig pour les sources

use serde::Deserialize;
use tracing::warn;

use crate::queue::QueueLimits;
use crate::stream::StreamRetryPolicy;

/// Réglages par défaut des playlists (`sources.playlist`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaylistDefaults {
    pub auto_advance: bool,
    pub shuffle_on_load: bool,
}

impl Default for PlaylistDefaults {
    fn default() -> Self {
        Self {
            auto_advance: true,
            shuffle_on_load: false,
        }
    }
}

/// Trait d'extension pour pmotvconfig::Config
pub trait SourceConfigExt {
    /// Seuils de retry des sources stream (`sources.stream`)
    fn stream_retry_policy(&self) -> StreamRetryPolicy;

    /// Limites de la file d'attente (`sources.queue`)
    fn queue_limits(&self) -> QueueLimits;

    fn playlist_defaults(&self) -> PlaylistDefaults;
}

fn section_or_default<T>(config: &pmotvconfig::Config, path: &[&str]) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    config.get_section(path).unwrap_or_else(|e| {
        warn!(section = %path.join("."), error = %e, "Using default source settings");
        T::default()
    })
}

impl SourceConfigExt for pmotvconfig::Config {
    fn stream_retry_policy(&self) -> StreamRetryPolicy {
        section_or_default(self, &["sources", "stream"])
    }

    fn queue_limits(&self) -> QueueLimits {
        section_or_default(self, &["sources", "queue"])
    }

    fn playlist_defaults(&self) -> PlaylistDefaults {
        section_or_default(self, &["sources", "playlist"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_embedded_yaml() {
        let config = pmotvconfig::Config::from_yaml("{}").unwrap();
        assert_eq!(config.stream_retry_policy(), StreamRetryPolicy::default());
        assert_eq!(config.queue_limits().max_entries, 20);
        assert_eq!(config.queue_limits().max_entries_per_player, 3);
        assert!(config.playlist_defaults().auto_advance);
    }

    #[test]
    fn test_partial_sections() {
        let config = pmotvconfig::Config::from_yaml(
            "sources:\n  stream:\n    end_retries: 7\n  queue:\n    max_entries: 5\n",
        )
        .unwrap();
        let policy = config.stream_retry_policy();
        assert_eq!(policy.end_retries, 7);
        assert_eq!(policy.pre_error_retries, 3);
        assert_eq!(config.queue_limits().max_entries, 5);
        assert_eq!(config.queue_limits().max_entries_per_player, 3);
    }
}
