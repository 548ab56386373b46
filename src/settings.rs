/// Audio settings store
///
/// Designer defaults and user overrides for the two bus volumes, plus
/// per-bus enable flags. Stored as one JSON blob in the preference store;
/// every change is saved and broadcast as `Event::AudioSettingsChanged`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::messaging::{Event, EventBus};
use crate::prefs::PreferenceStore;

pub const KEY_AUDIO: &str = "GAME_AUDIO_SETTINGS_JSON";

/// Persisted audio settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSettings {
    /// false = designer defaults, true = user volumes
    pub use_custom_volume: bool,

    pub default_bgm_volume: f32,
    pub default_sfx_volume: f32,

    pub user_bgm_volume: f32,
    pub user_sfx_volume: f32,

    /// Unticked = muted
    pub bgm_enabled: bool,
    pub sfx_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            use_custom_volume: false,
            default_bgm_volume: 1.0,
            default_sfx_volume: 1.0,
            user_bgm_volume: 1.0,
            user_sfx_volume: 1.0,
            bgm_enabled: true,
            sfx_enabled: true,
        }
    }
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        1.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

impl AudioSettings {
    /// Parse a stored blob; empty or corrupt input yields defaults
    pub fn from_json(json: &str) -> Self {
        if json.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<AudioSettings>(json) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::warn!("Corrupt audio settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    fn sanitized(mut self) -> Self {
        self.default_bgm_volume = clamp01(self.default_bgm_volume);
        self.default_sfx_volume = clamp01(self.default_sfx_volume);
        self.user_bgm_volume = clamp01(self.user_bgm_volume);
        self.user_sfx_volume = clamp01(self.user_sfx_volume);
        self
    }

    pub fn final_bgm_volume(&self) -> f32 {
        if self.use_custom_volume {
            self.user_bgm_volume
        } else {
            self.default_bgm_volume
        }
    }

    pub fn final_sfx_volume(&self) -> f32 {
        if self.use_custom_volume {
            self.user_sfx_volume
        } else {
            self.default_sfx_volume
        }
    }
}

/// Thread-safe owner of the current `AudioSettings`
pub struct SettingsStore {
    audio: RwLock<AudioSettings>,
    prefs: Arc<dyn PreferenceStore>,
    events: EventBus,
}

impl SettingsStore {
    /// Load settings from `prefs`; missing or corrupt data yields defaults
    pub fn load(prefs: Arc<dyn PreferenceStore>, events: EventBus) -> Self {
        let audio = match prefs.get_string(KEY_AUDIO) {
            Some(json) => AudioSettings::from_json(&json),
            None => {
                tracing::debug!("No stored audio settings, using defaults");
                AudioSettings::default()
            }
        };

        Self {
            audio: RwLock::new(audio),
            prefs,
            events,
        }
    }

    /// Snapshot of the current settings
    pub fn audio(&self) -> AudioSettings {
        self.audio.read().clone()
    }

    pub fn final_bgm_volume(&self) -> f32 {
        self.audio.read().final_bgm_volume()
    }

    pub fn final_sfx_volume(&self) -> f32 {
        self.audio.read().final_sfx_volume()
    }

    pub fn set_use_custom_volume(&self, use_custom: bool) {
        self.update(|a| a.use_custom_volume = use_custom);
    }

    pub fn set_default_volumes(&self, bgm: f32, sfx: f32) {
        self.update(|a| {
            a.default_bgm_volume = clamp01(bgm);
            a.default_sfx_volume = clamp01(sfx);
        });
    }

    pub fn set_user_bgm_volume(&self, volume: f32) {
        self.update(|a| a.user_bgm_volume = clamp01(volume));
    }

    pub fn set_user_sfx_volume(&self, volume: f32) {
        self.update(|a| a.user_sfx_volume = clamp01(volume));
    }

    pub fn set_bgm_enabled(&self, enabled: bool) {
        self.update(|a| a.bgm_enabled = enabled);
    }

    pub fn set_sfx_enabled(&self, enabled: bool) {
        self.update(|a| a.sfx_enabled = enabled);
    }

    /// Restore defaults, save and notify
    pub fn reset(&self) {
        self.update(|a| *a = AudioSettings::default());
    }

    fn update(&self, change: impl FnOnce(&mut AudioSettings)) {
        // Held until published so saves and events keep the order of changes
        let mut audio = self.audio.write();
        change(&mut audio);
        let snapshot = audio.clone();

        self.prefs.set_string(KEY_AUDIO, &snapshot.to_json());
        if let Err(e) = self.prefs.flush() {
            tracing::warn!("Failed to save audio settings: {}", e);
        }

        self.events
            .publish(Event::AudioSettingsChanged { settings: snapshot });
    }
}
