/// Sound manager
///
/// Plays music and effects against an `AudioBackend`: one music channel
/// with fades and crossfades, a round-robin pool for effects, and
/// self-releasing positional channels. Driven by `update(dt)` from the
/// host's frame loop; nothing here blocks or spawns threads.

use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::{AudioBackend, ChannelId, ChannelSettings, Position};
use super::channel::ChannelPool;
use super::fade::{FadeOutcome, FadeScheduler, FadeState, FadeStep, FadeTask};
use super::library::{SoundDefinition, SoundLibrary};
use super::source::{Bus, SoundId};
use super::volume::VolumeState;
use crate::error::AudioError;
use crate::messaging::Event;
use crate::settings::AudioSettings;

pub const DEFAULT_EFFECT_POOL_SIZE: usize = 10;

/// Music currently bound to a channel
#[derive(Debug, Clone, Copy, PartialEq)]
struct MusicTrack {
    id: SoundId,
    volume: f32,
}

/// Crossfade target waiting for promotion
#[derive(Debug, Clone, Copy)]
struct IncomingMusic {
    channel: ChannelId,
    track: MusicTrack,
}

/// Gain for a definition on a bus: bus volume × base volume, within [0, 1]
pub fn compute_gain(bus_volume: f32, definition_volume: f32) -> f32 {
    (bus_volume * definition_volume).clamp(0.0, 1.0)
}

pub struct SoundManager<B: AudioBackend> {
    backend: B,
    music_library: SoundLibrary,
    effects_library: SoundLibrary,
    volumes: VolumeState,
    fades: FadeScheduler,
    pool: ChannelPool,
    music_channel: ChannelId,
    music_gain: f32,
    music: Option<MusicTrack>,
    incoming: Option<IncomingMusic>,
    rng: StdRng,
}

impl<B: AudioBackend> SoundManager<B> {
    /// Open the music channel and the effect pool, then apply the loaded
    /// volume state
    pub fn new(
        mut backend: B,
        music_library: SoundLibrary,
        effects_library: SoundLibrary,
        volumes: VolumeState,
        effect_pool_size: usize,
    ) -> Result<Self, AudioError> {
        let music_channel = backend.open_channel(None)?;
        let pool = ChannelPool::new(&mut backend, effect_pool_size)?;

        let mut manager = Self {
            backend,
            music_library,
            effects_library,
            volumes,
            fades: FadeScheduler::new(),
            pool,
            music_channel,
            music_gain: 0.0,
            music: None,
            incoming: None,
            rng: StdRng::from_entropy(),
        };
        manager.apply_volumes();

        tracing::info!(
            "Sound manager ready: {} music, {} effects, pool of {}",
            manager.music_library.len(),
            manager.effects_library.len(),
            effect_pool_size
        );
        Ok(manager)
    }

    /// Use a fixed seed for pitch variation
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn apply_volumes(&mut self) {
        let master = if self.volumes.is_master_muted() { 0.0 } else { 1.0 };
        self.backend.set_master_volume(master);
        self.backend
            .set_muted(self.music_channel, self.volumes.is_muted(Bus::Music));
        let effects_muted = self.volumes.is_muted(Bus::Effects);
        for id in self.pool.all_channels() {
            self.backend.set_muted(id, effects_muted);
        }
    }

    // =========================
    // Settings
    // =========================

    /// Set a bus volume (clamped); music already playing follows immediately
    pub fn set_bus_volume(&mut self, bus: Bus, volume: f32) -> f32 {
        let volume = self.volumes.set_volume(bus, volume);
        if bus == Bus::Music {
            self.reapply_music_gain();
        }
        volume
    }

    pub fn set_muted(&mut self, bus: Bus, muted: bool) {
        self.volumes.set_muted(bus, muted);
        match bus {
            Bus::Music => {
                self.backend.set_muted(self.music_channel, muted);
                if let Some(incoming) = self.incoming {
                    self.backend.set_muted(incoming.channel, muted);
                }
            }
            Bus::Effects => {
                for id in self.pool.all_channels() {
                    self.backend.set_muted(id, muted);
                }
            }
        }
    }

    /// Silence all output without touching bus settings
    pub fn set_master_muted(&mut self, muted: bool) {
        self.volumes.set_master_muted(muted);
        self.backend.set_master_volume(if muted { 0.0 } else { 1.0 });
    }

    /// Apply the final volumes and enabled flags of a settings snapshot
    pub fn apply_settings(&mut self, settings: &AudioSettings) {
        self.set_bus_volume(Bus::Music, settings.final_bgm_volume());
        self.set_bus_volume(Bus::Effects, settings.final_sfx_volume());
        self.set_muted(Bus::Music, !settings.bgm_enabled);
        self.set_muted(Bus::Effects, !settings.sfx_enabled);
    }

    /// Drain pending events, applying the newest settings change.
    ///
    /// Returns the number of settings changes seen.
    pub fn sync_settings(&mut self, events: &Receiver<Event>) -> usize {
        let mut latest = None;
        let mut seen = 0;
        for event in events.try_iter() {
            if let Event::AudioSettingsChanged { settings } = event {
                seen += 1;
                latest = Some(settings);
            }
        }
        if let Some(settings) = latest {
            tracing::debug!("Applying audio settings change");
            self.apply_settings(&settings);
        }
        seen
    }

    fn reapply_music_gain(&mut self) {
        let bus_volume = self.volumes.volume(Bus::Music);

        if let Some(task) = self.fades.active_mut(Bus::Music) {
            let track = match task {
                FadeTask::Crossfade { .. } => self.incoming.map(|i| i.track),
                FadeTask::Fade { .. } => self.music,
            };
            if let Some(track) = track {
                task.retarget(compute_gain(bus_volume, track.volume));
            }
            return;
        }

        if let Some(track) = self.music {
            let gain = compute_gain(bus_volume, track.volume);
            self.set_music_gain(gain);
        }
    }

    fn set_music_gain(&mut self, gain: f32) {
        self.music_gain = gain;
        self.backend.set_gain(self.music_channel, gain);
    }

    // =========================
    // Music
    // =========================

    /// Play music, optionally fading in from silence over `fade_in` seconds
    pub fn play_music(&mut self, id: SoundId, fade_in: f32) {
        let Some(def) = self.music_library.lookup(id).cloned() else {
            tracing::debug!("No playable music for {}", id);
            return;
        };

        self.cancel_music_fade();

        let target = compute_gain(self.volumes.volume(Bus::Music), def.volume);
        let start_gain = if fade_in > 0.0 { 0.0 } else { target };
        let settings = self.music_settings(&def, start_gain);

        if !self.start_channel(self.music_channel, &def, &settings) {
            self.music = None;
            return;
        }
        self.music_gain = start_gain;
        self.music = Some(MusicTrack {
            id,
            volume: def.volume,
        });

        if fade_in > 0.0 {
            self.fades.start(
                Bus::Music,
                FadeTask::fade_in(self.music_channel, target, fade_in),
            );
        }
        tracing::debug!("Playing music {} (fade in {:.2}s)", id, fade_in.max(0.0));
    }

    /// Stop music, optionally fading out over `fade_out` seconds first
    pub fn stop_music(&mut self, fade_out: f32) {
        self.cancel_music_fade();

        if fade_out <= 0.0 {
            self.backend.stop(self.music_channel);
            self.music = None;
            return;
        }

        self.fades.start(
            Bus::Music,
            FadeTask::fade_out(self.music_channel, self.music_gain, fade_out),
        );
    }

    /// Fade the current music out while `next` fades in on a second channel
    pub fn crossfade_music(&mut self, next: SoundId, duration: f32) {
        let Some(def) = self.music_library.lookup(next).cloned() else {
            tracing::debug!("No playable music for {}", next);
            return;
        };

        self.cancel_music_fade();

        let channel = match self.backend.open_channel(None) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!("Crossfade to {} skipped: {}", next, e);
                return;
            }
        };

        let target = compute_gain(self.volumes.volume(Bus::Music), def.volume);
        let settings = self.music_settings(&def, 0.0);
        if !self.start_channel(channel, &def, &settings) {
            self.backend.close_channel(channel);
            return;
        }

        let incoming = IncomingMusic {
            channel,
            track: MusicTrack {
                id: next,
                volume: def.volume,
            },
        };
        self.incoming = Some(incoming);

        if duration <= 0.0 {
            self.backend.set_gain(channel, target);
            self.promote(self.music_channel, channel, target);
            return;
        }

        self.fades.start(
            Bus::Music,
            FadeTask::crossfade(self.music_channel, self.music_gain, channel, target, duration),
        );
        tracing::debug!("Crossfading music to {} over {:.2}s", next, duration);
    }

    fn music_settings(&self, def: &SoundDefinition, gain: f32) -> ChannelSettings {
        ChannelSettings {
            pitch: def.pitch,
            gain,
            spatial_blend: 0.0,
            // Music always loops
            looping: true,
            muted: self.volumes.is_muted(Bus::Music),
        }
    }

    /// Drop the running music fade; a pending crossfade channel is released
    fn cancel_music_fade(&mut self) {
        self.fades.cancel(Bus::Music);
        if let Some(incoming) = self.incoming.take() {
            self.backend.stop(incoming.channel);
            self.backend.close_channel(incoming.channel);
        }
    }

    fn promote(&mut self, outgoing: ChannelId, incoming: ChannelId, gain: f32) {
        self.backend.stop(outgoing);
        self.backend.close_channel(outgoing);

        self.music_channel = incoming;
        self.music_gain = gain;
        self.music = self
            .incoming
            .take()
            .filter(|i| i.channel == incoming)
            .map(|i| i.track);

        tracing::debug!("Promoted crossfade channel {:?} to music", incoming);
    }

    // =========================
    // Effects
    // =========================

    /// Fire an effect on the next pooled channel
    pub fn play_effect(&mut self, id: SoundId) {
        let Some(def) = self.effects_library.lookup(id).cloned() else {
            tracing::debug!("No playable effect for {}", id);
            return;
        };

        let channel = self.pool.acquire_effect_channel();
        let settings = ChannelSettings {
            pitch: self.effect_pitch(&def),
            gain: compute_gain(self.volumes.volume(Bus::Effects), def.volume),
            spatial_blend: 0.0,
            looping: def.looping,
            muted: self.volumes.is_muted(Bus::Effects),
        };
        self.start_channel(channel, &def, &settings);
    }

    /// Fire an effect at a world position on a self-releasing channel
    pub fn play_effect_at(&mut self, id: SoundId, position: Position, spatial_blend: f32) {
        let Some(def) = self.effects_library.lookup(id).cloned() else {
            tracing::debug!("No playable effect for {}", id);
            return;
        };
        let Some(clip) = def.clip.as_ref() else {
            return;
        };

        let pitch = self.effect_pitch(&def);
        let channel = match self.pool.acquire_transient_channel(
            &mut self.backend,
            position,
            clip.duration(),
            pitch,
        ) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!("Positional effect {} skipped: {}", id, e);
                return;
            }
        };

        let settings = ChannelSettings {
            pitch,
            gain: compute_gain(self.volumes.volume(Bus::Effects), def.volume),
            spatial_blend: spatial_blend.clamp(0.0, 1.0),
            looping: false,
            muted: self.volumes.is_muted(Bus::Effects),
        };
        if !self.start_channel(channel, &def, &settings) {
            self.pool.release_transient(&mut self.backend, channel);
        }
    }

    fn effect_pitch(&mut self, def: &SoundDefinition) -> f32 {
        if !def.random_pitch {
            return def.pitch;
        }
        let (min, max) = def.pitch_range;
        if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        }
    }

    fn start_channel(
        &mut self,
        channel: ChannelId,
        def: &SoundDefinition,
        settings: &ChannelSettings,
    ) -> bool {
        let Some(clip) = def.clip.as_ref() else {
            return false;
        };
        match self.backend.start(channel, clip, settings) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to play {}: {}", def.id, e);
                false
            }
        }
    }

    // =========================
    // Frame update
    // =========================

    /// Advance fades and transient channels by `dt` seconds of unscaled time
    pub fn update(&mut self, dt: f32) {
        for step in self.fades.tick(dt) {
            match step {
                FadeStep::Gain { channel, gain } => {
                    self.backend.set_gain(channel, gain);
                    if channel == self.music_channel {
                        self.music_gain = gain;
                    }
                }
                FadeStep::Finished { outcome, .. } => self.finish_fade(outcome),
            }
        }
        self.pool.tick(&mut self.backend, dt);
    }

    fn finish_fade(&mut self, outcome: FadeOutcome) {
        match outcome {
            FadeOutcome::Held { .. } => {}
            FadeOutcome::Stopped {
                channel,
                restore_gain,
            } => {
                self.backend.stop(channel);
                self.backend.set_gain(channel, restore_gain);
                if channel == self.music_channel {
                    self.music_gain = restore_gain;
                    self.music = None;
                }
            }
            FadeOutcome::Crossfaded { outgoing, incoming } => {
                let gain = self
                    .incoming
                    .map(|i| compute_gain(self.volumes.volume(Bus::Music), i.track.volume))
                    .unwrap_or(self.music_gain);
                self.promote(outgoing, incoming, gain);
            }
        }
    }

    /// Close every channel; the manager is unusable afterwards
    pub fn shutdown(&mut self) {
        self.cancel_music_fade();
        self.backend.close_channel(self.music_channel);
        self.pool.close_all(&mut self.backend);
        self.music = None;
        tracing::debug!("Sound manager shut down");
    }

    // =========================
    // Queries
    // =========================

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn volumes(&self) -> &VolumeState {
        &self.volumes
    }

    pub fn music_channel(&self) -> ChannelId {
        self.music_channel
    }

    /// Channel of a crossfade in progress
    pub fn incoming_channel(&self) -> Option<ChannelId> {
        self.incoming.map(|i| i.channel)
    }

    pub fn current_music(&self) -> Option<SoundId> {
        self.music.map(|m| m.id)
    }

    pub fn is_music_playing(&self) -> bool {
        self.backend.is_playing(self.music_channel)
    }

    pub fn fade_state(&self, bus: Bus) -> FadeState {
        self.fades.state(bus)
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::MemoryBackend;
    use crate::audio_system::clip::AudioClip;
    use crate::prefs::MemoryPrefs;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn clip(name: &str, secs: u64) -> AudioClip {
        AudioClip::new(name, Arc::new(vec![0; 16]), Duration::from_secs(secs))
    }

    fn manager(pool: usize) -> SoundManager<MemoryBackend> {
        let music = SoundLibrary::from_definitions([
            SoundDefinition::new(SoundId::MenuTheme, Some(clip("menu.ogg", 60))),
            SoundDefinition::new(SoundId::BattleTheme, Some(clip("battle.ogg", 90))).with_volume(0.6),
        ]);
        let effects = SoundLibrary::from_definitions([
            SoundDefinition::new(SoundId::Click, Some(clip("click.wav", 1))).with_volume(0.8),
            SoundDefinition::new(SoundId::Explosion, Some(clip("boom.wav", 2)))
                .with_random_pitch(0.9, 1.1),
            SoundDefinition::new(SoundId::Pickup, None),
        ]);
        let volumes = VolumeState::load(Arc::new(MemoryPrefs::new()));
        SoundManager::new(MemoryBackend::new(), music, effects, volumes, pool)
            .unwrap()
            .with_seed(7)
    }

    fn gain(m: &SoundManager<MemoryBackend>, id: ChannelId) -> f32 {
        m.backend().channel(id).unwrap().settings.gain
    }

    #[test]
    fn test_effect_gain_is_bus_times_definition() {
        let mut m = manager(4);
        m.set_bus_volume(Bus::Effects, 0.5);
        m.play_effect(SoundId::Click);

        let channel = m.pool().channels()[0];
        assert_relative_eq!(gain(&m, channel), 0.4);
        assert!(m.backend().is_playing(channel));
    }

    #[test]
    fn test_unknown_or_clipless_effect_is_noop() {
        let mut m = manager(2);
        m.play_effect(SoundId::MenuTheme);
        m.play_effect(SoundId::Pickup);
        assert!(m
            .pool()
            .channels()
            .iter()
            .all(|id| m.backend().channel(*id).unwrap().starts == 0));
    }

    #[test]
    fn test_effects_retrigger_round_robin() {
        let mut m = manager(2);
        for _ in 0..3 {
            m.play_effect(SoundId::Click);
        }
        let channels = m.pool().channels().to_vec();
        assert_eq!(m.backend().channel(channels[0]).unwrap().starts, 2);
        assert_eq!(m.backend().channel(channels[1]).unwrap().starts, 1);
    }

    #[test]
    fn test_random_pitch_stays_in_range() {
        let mut m = manager(1);
        let channel = m.pool().channels()[0];
        for _ in 0..50 {
            m.play_effect(SoundId::Explosion);
            let pitch = m.backend().channel(channel).unwrap().settings.pitch;
            assert!((0.9..=1.1).contains(&pitch), "pitch {pitch} out of range");
        }
    }

    #[test]
    fn test_play_music_immediately() {
        let mut m = manager(1);
        m.set_bus_volume(Bus::Music, 0.5);
        m.play_music(SoundId::BattleTheme, 0.0);

        let channel = m.music_channel();
        assert_relative_eq!(gain(&m, channel), 0.3);
        assert!(m.backend().channel(channel).unwrap().settings.looping);
        assert_eq!(m.current_music(), Some(SoundId::BattleTheme));
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
    }

    #[test]
    fn test_music_fade_in() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 2.0);
        let channel = m.music_channel();
        assert_eq!(gain(&m, channel), 0.0);

        m.update(1.0);
        assert_relative_eq!(gain(&m, channel), 0.5);

        m.update(1.5);
        assert_eq!(gain(&m, channel), 1.0);
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
    }

    #[test]
    fn test_stop_music_with_fade_restores_gain() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        m.stop_music(1.0);
        let channel = m.music_channel();

        m.update(0.5);
        assert_relative_eq!(gain(&m, channel), 0.5);
        assert!(m.is_music_playing());

        m.update(0.5);
        assert!(!m.is_music_playing());
        assert_eq!(gain(&m, channel), 1.0);
        assert_eq!(m.current_music(), None);
    }

    #[test]
    fn test_immediate_stop_cancels_fade_in() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 2.0);
        m.stop_music(0.0);
        assert!(!m.is_music_playing());
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
    }

    #[test]
    fn test_crossfade_promotes_incoming_channel() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        let old = m.music_channel();

        m.crossfade_music(SoundId::BattleTheme, 2.0);
        let new = m.incoming_channel().unwrap();

        m.update(1.0);
        assert_relative_eq!(gain(&m, old), 0.5);
        assert_relative_eq!(gain(&m, new), 0.3);

        m.update(1.0);
        assert!(m.backend().channel(old).is_none());
        assert_eq!(m.music_channel(), new);
        assert_relative_eq!(gain(&m, new), 0.6);
        assert_eq!(m.current_music(), Some(SoundId::BattleTheme));
        assert_eq!(m.incoming_channel(), None);
    }

    #[test]
    fn test_play_music_supersedes_crossfade() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        m.crossfade_music(SoundId::BattleTheme, 2.0);
        let temp = m.incoming_channel().unwrap();
        m.update(0.5);

        m.play_music(SoundId::MenuTheme, 0.0);
        assert!(m.backend().channel(temp).is_none());
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
        assert_eq!(gain(&m, m.music_channel()), 1.0);
    }

    #[test]
    fn test_zero_duration_crossfade_is_instant() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        m.crossfade_music(SoundId::BattleTheme, 0.0);
        assert_eq!(m.current_music(), Some(SoundId::BattleTheme));
        assert_relative_eq!(gain(&m, m.music_channel()), 0.6);
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
    }

    #[test]
    fn test_music_volume_change_follows_definition_volume() {
        let mut m = manager(1);
        m.play_music(SoundId::BattleTheme, 0.0);
        m.set_bus_volume(Bus::Music, 0.5);
        assert_relative_eq!(gain(&m, m.music_channel()), 0.3);
    }

    #[test]
    fn test_volume_change_retargets_fade_in() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 1.0);
        m.set_bus_volume(Bus::Music, 0.4);
        m.update(2.0);
        assert_relative_eq!(gain(&m, m.music_channel()), 0.4);
    }

    #[test]
    fn test_positional_effect_is_released() {
        let mut m = manager(1);
        m.play_effect_at(SoundId::Click, [3.0, 0.0, 1.0], 4.0);

        let (id, channel) = m.backend().positional_channels().next().unwrap();
        assert_eq!(channel.settings.spatial_blend, 1.0);
        assert!(!channel.settings.looping);

        m.update(0.5);
        assert!(m.backend().channel(id).is_some());
        m.update(0.6);
        assert!(m.backend().channel(id).is_none());
    }

    #[test]
    fn test_mutes() {
        let mut m = manager(2);
        m.play_music(SoundId::MenuTheme, 0.0);
        m.set_muted(Bus::Music, true);
        assert!(m.backend().channel(m.music_channel()).unwrap().settings.muted);
        assert_eq!(m.volumes().volume(Bus::Music), 1.0);

        m.set_muted(Bus::Effects, true);
        m.play_effect(SoundId::Click);
        assert!(m.backend().channel(m.pool().channels()[0]).unwrap().settings.muted);

        m.set_master_muted(true);
        assert_eq!(m.backend().master_volume(), 0.0);
        m.set_master_muted(false);
        assert_eq!(m.backend().master_volume(), 1.0);
    }

    #[test]
    fn test_effects_mute_reaches_positional_channels() {
        let mut m = manager(1);
        m.play_effect_at(SoundId::Explosion, [1.0, 0.0, 0.0], 1.0);
        let (id, _) = m.backend().positional_channels().next().unwrap();

        m.set_muted(Bus::Effects, true);
        let channel = m.backend().channel(id).unwrap();
        assert!(channel.settings.muted);
        assert!(channel.playing);

        m.set_muted(Bus::Effects, false);
        assert!(!m.backend().channel(id).unwrap().settings.muted);
    }

    #[test]
    fn test_stop_music_during_crossfade() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        let old = m.music_channel();
        m.crossfade_music(SoundId::BattleTheme, 2.0);
        let temp = m.incoming_channel().unwrap();
        m.update(1.0);

        m.stop_music(1.0);
        assert!(m.backend().channel(temp).is_none());
        assert_eq!(m.incoming_channel(), None);
        assert_eq!(m.music_channel(), old);

        m.update(0.5);
        assert_relative_eq!(gain(&m, old), 0.25);
        assert!(m.is_music_playing());

        m.update(0.5);
        assert!(!m.is_music_playing());
        assert_eq!(m.current_music(), None);
        assert_eq!(m.fade_state(Bus::Music), FadeState::Idle);
    }

    #[test]
    fn test_second_crossfade_supersedes_first() {
        let mut m = manager(1);
        m.play_music(SoundId::MenuTheme, 0.0);
        let old = m.music_channel();
        m.crossfade_music(SoundId::BattleTheme, 2.0);
        let first = m.incoming_channel().unwrap();
        m.update(1.0);

        m.crossfade_music(SoundId::MenuTheme, 2.0);
        let second = m.incoming_channel().unwrap();
        assert_ne!(first, second);
        assert!(m.backend().channel(first).is_none());

        // The outgoing channel continues down from where it was
        m.update(1.0);
        assert_relative_eq!(gain(&m, old), 0.25);
        assert_relative_eq!(gain(&m, second), 0.5);

        m.update(1.0);
        assert!(m.backend().channel(old).is_none());
        assert_eq!(m.music_channel(), second);
        assert_eq!(m.current_music(), Some(SoundId::MenuTheme));
        assert_relative_eq!(gain(&m, second), 1.0);
        // Music channel plus the one pooled effect channel
        assert_eq!(m.backend().open_count(), 2);
    }

    #[test]
    fn test_apply_settings() {
        let mut m = manager(1);
        let settings = AudioSettings {
            use_custom_volume: true,
            user_bgm_volume: 0.2,
            user_sfx_volume: 0.3,
            sfx_enabled: false,
            ..Default::default()
        };
        m.apply_settings(&settings);
        assert_relative_eq!(m.volumes().volume(Bus::Music), 0.2);
        assert_relative_eq!(m.volumes().volume(Bus::Effects), 0.3);
        assert!(m.volumes().is_muted(Bus::Effects));
        assert!(!m.volumes().is_muted(Bus::Music));
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let mut m = manager(3);
        m.play_music(SoundId::MenuTheme, 0.0);
        m.crossfade_music(SoundId::BattleTheme, 1.0);
        m.shutdown();
        assert_eq!(m.backend().open_count(), 0);
    }
}
