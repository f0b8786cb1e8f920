//! Extension de pmotvconfig pour le contrôleur de lecture

use tracing::warn;

use crate::settings::PlayerSettings;

/// Trait d'extension pour pmotvconfig::Config
pub trait PlayerConfigExt {
    /// Réglages de lecture (`player`), valeurs par défaut si absents
    fn player_settings(&self) -> PlayerSettings;

    fn set_player_sync_frequency(&self, seconds: f64) -> anyhow::Result<()>;

    fn set_player_sync_threshold(&self, seconds: f64) -> anyhow::Result<()>;
}

impl PlayerConfigExt for pmotvconfig::Config {
    fn player_settings(&self) -> PlayerSettings {
        let mut settings: PlayerSettings = self.get_section(&["player"]).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid player section, using defaults");
            PlayerSettings::default()
        });
        // Les variables d'environnement arrivent parfois sous forme de chaînes
        settings.sync_frequency = self.get_f64(&["player", "sync_frequency"], settings.sync_frequency);
        settings.sync_threshold = self.get_f64(&["player", "sync_threshold"], settings.sync_threshold);
        settings.retry_timeout = self.get_f64(&["player", "retry_timeout"], settings.retry_timeout);
        if settings.sync_frequency <= 0.0 {
            warn!(value = settings.sync_frequency, "sync_frequency must be positive, using 5s");
            settings.sync_frequency = 5.0;
        }
        settings
    }

    fn set_player_sync_frequency(&self, seconds: f64) -> anyhow::Result<()> {
        self.set_f64(&["player", "sync_frequency"], seconds)
    }

    fn set_player_sync_threshold(&self, seconds: f64) -> anyhow::Result<()> {
        self.set_f64(&["player", "sync_threshold"], seconds)
    }
}
