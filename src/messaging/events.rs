/// Event types for the application
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::settings::AudioSettings;

/// Application events
#[derive(Debug, Clone)]
pub enum Event {
    /// Audio settings were changed and saved; carries the new snapshot
    AudioSettingsChanged { settings: AudioSettings },

    /// An asset failed to resolve
    AssetLoadFailed { address: String, reason: String },

    /// Application is shutting down
    Shutdown,
}

impl Event {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            Event::AudioSettingsChanged { settings } => format!(
                "Audio settings changed (music {:.2}, effects {:.2})",
                settings.final_bgm_volume(),
                settings.final_sfx_volume()
            ),
            Event::AssetLoadFailed { address, .. } => {
                format!("Asset load failed: {}", address)
            }
            Event::Shutdown => "Shutting down".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_description() {
        let event = Event::AudioSettingsChanged {
            settings: AudioSettings::default(),
        };
        assert_eq!(
            event.description(),
            "Audio settings changed (music 1.00, effects 1.00)"
        );

        assert_eq!(Event::Shutdown.description(), "Shutting down");
    }
}
