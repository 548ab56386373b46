/// Bus volume state
///
/// Persisted volume and mute settings for the music and effects buses, plus
/// the listener-wide mute. Every setter persists immediately.

use std::sync::Arc;

use super::source::Bus;
use crate::prefs::PreferenceStore;

pub const KEY_BGM_VOL: &str = "AUDIO_BGM_VOL";
pub const KEY_SFX_VOL: &str = "AUDIO_SFX_VOL";
pub const KEY_MUTE: &str = "AUDIO_MUTE";
pub const KEY_BGM_MUTE: &str = "AUDIO_BGM_MUTE";
pub const KEY_SFX_MUTE: &str = "AUDIO_SFX_MUTE";

/// Volume and mute of one bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusState {
    /// Volume level (0.0-1.0)
    volume: f32,
    muted: bool,
}

impl BusState {
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            volume: sanitize(volume),
            muted,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

fn sanitize(volume: f32) -> f32 {
    if volume.is_nan() {
        1.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

fn volume_key(bus: Bus) -> &'static str {
    match bus {
        Bus::Music => KEY_BGM_VOL,
        Bus::Effects => KEY_SFX_VOL,
    }
}

fn mute_key(bus: Bus) -> &'static str {
    match bus {
        Bus::Music => KEY_BGM_MUTE,
        Bus::Effects => KEY_SFX_MUTE,
    }
}

/// Persisted state of both buses
pub struct VolumeState {
    buses: [BusState; 2],
    master_muted: bool,
    prefs: Arc<dyn PreferenceStore>,
}

impl VolumeState {
    /// Load persisted state, defaulting to full volume and unmuted
    pub fn load(prefs: Arc<dyn PreferenceStore>) -> Self {
        let mut buses = [BusState::default(); 2];
        for bus in Bus::ALL {
            buses[bus.index()] = BusState::new(
                prefs.get_f32(volume_key(bus), 1.0),
                prefs.get_bool(mute_key(bus), false),
            );
        }
        let master_muted = prefs.get_bool(KEY_MUTE, false);

        tracing::debug!(
            "Loaded volumes: music={:.2} effects={:.2} muted={}",
            buses[Bus::Music.index()].volume,
            buses[Bus::Effects.index()].volume,
            master_muted
        );

        Self {
            buses,
            master_muted,
            prefs,
        }
    }

    pub fn bus(&self, bus: Bus) -> BusState {
        self.buses[bus.index()]
    }

    pub fn volume(&self, bus: Bus) -> f32 {
        self.buses[bus.index()].volume
    }

    pub fn is_muted(&self, bus: Bus) -> bool {
        self.buses[bus.index()].muted
    }

    pub fn is_master_muted(&self) -> bool {
        self.master_muted
    }

    /// Set a bus volume, clamped to [0, 1]; returns the stored value
    pub fn set_volume(&mut self, bus: Bus, volume: f32) -> f32 {
        let volume = sanitize(volume);
        self.buses[bus.index()].volume = volume;
        self.prefs.set_f32(volume_key(bus), volume);
        self.save();
        volume
    }

    /// Mute or unmute a bus without touching its volume
    pub fn set_muted(&mut self, bus: Bus, muted: bool) {
        self.buses[bus.index()].muted = muted;
        self.prefs.set_bool(mute_key(bus), muted);
        self.save();
    }

    pub fn set_master_muted(&mut self, muted: bool) {
        self.master_muted = muted;
        self.prefs.set_bool(KEY_MUTE, muted);
        self.save();
    }

    fn save(&self) {
        if let Err(e) = self.prefs.flush() {
            tracing::warn!("Failed to persist audio volumes: {}", e);
        }
    }
}
