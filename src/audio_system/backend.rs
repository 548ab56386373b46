//! Audio backend seam
//!
//! The sound core decides what plays where and how loud; a backend owns the
//! actual output. `MemoryBackend` keeps every channel's state in memory, for
//! headless hosts and tests. The rodio backend lives in `player.rs`.

use std::collections::BTreeMap;

use super::clip::AudioClip;
use crate::error::AudioError;

/// World-space position of a positional channel
pub type Position = [f32; 3];

/// Handle to one backend playback channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

/// Mutable per-channel playback parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    pub pitch: f32,

    /// Gain (0.0-1.0)
    pub gain: f32,

    /// 0.0 = 2D, 1.0 = fully positional
    pub spatial_blend: f32,

    pub looping: bool,
    pub muted: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            gain: 1.0,
            spatial_blend: 0.0,
            looping: false,
            muted: false,
        }
    }
}

/// Output device abstraction.
///
/// Mutators on unknown channels are ignored; only `start` reports them,
/// since it is the one call whose failure means silence.
pub trait AudioBackend {
    /// Open a channel, positional when `position` is given
    fn open_channel(&mut self, position: Option<Position>) -> Result<ChannelId, AudioError>;

    /// Stop and dispose a channel
    fn close_channel(&mut self, id: ChannelId);

    /// Start `clip` on a channel, cutting off whatever it was playing
    fn start(
        &mut self,
        id: ChannelId,
        clip: &AudioClip,
        settings: &ChannelSettings,
    ) -> Result<(), AudioError>;

    fn stop(&mut self, id: ChannelId);

    fn set_gain(&mut self, id: ChannelId, gain: f32);

    fn set_muted(&mut self, id: ChannelId, muted: bool);

    /// Listener-wide output level (master mute)
    fn set_master_volume(&mut self, volume: f32);

    fn is_playing(&self, id: ChannelId) -> bool;
}

/// Snapshot of one in-memory channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub position: Option<Position>,
    pub clip: Option<AudioClip>,
    pub settings: ChannelSettings,
    pub playing: bool,

    /// Number of times `start` was called on this channel
    pub starts: u32,
}

/// Backend that records state instead of producing sound
#[derive(Debug)]
pub struct MemoryBackend {
    channels: BTreeMap<ChannelId, ChannelSnapshot>,
    next_id: u64,
    master_volume: f32,
    closed: Vec<ChannelId>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
            next_id: 1,
            master_volume: 1.0,
            closed: Vec::new(),
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelSnapshot> {
        self.channels.get(&id)
    }

    /// Number of channels currently open
    pub fn open_count(&self) -> usize {
        self.channels.len()
    }

    /// Channels closed so far, in order
    pub fn closed(&self) -> &[ChannelId] {
        &self.closed
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Positional channels currently open
    pub fn positional_channels(&self) -> impl Iterator<Item = (ChannelId, &ChannelSnapshot)> {
        self.channels
            .iter()
            .filter(|(_, c)| c.position.is_some())
            .map(|(id, c)| (*id, c))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MemoryBackend {
    fn open_channel(&mut self, position: Option<Position>) -> Result<ChannelId, AudioError> {
        let id = ChannelId(self.next_id);
        self.next_id += 1;
        self.channels.insert(
            id,
            ChannelSnapshot {
                position,
                clip: None,
                settings: ChannelSettings::default(),
                playing: false,
                starts: 0,
            },
        );
        Ok(id)
    }

    fn close_channel(&mut self, id: ChannelId) {
        if self.channels.remove(&id).is_some() {
            self.closed.push(id);
        }
    }

    fn start(
        &mut self,
        id: ChannelId,
        clip: &AudioClip,
        settings: &ChannelSettings,
    ) -> Result<(), AudioError> {
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or(AudioError::UnknownChannel(id.0))?;
        channel.clip = Some(clip.clone());
        channel.settings = *settings;
        channel.playing = true;
        channel.starts += 1;
        Ok(())
    }

    fn stop(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.playing = false;
        }
    }

    fn set_gain(&mut self, id: ChannelId, gain: f32) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.settings.gain = gain;
        }
    }

    fn set_muted(&mut self, id: ChannelId, muted: bool) {
        if let Some(channel) = self.channels.get_mut(&id) {
            channel.settings.muted = muted;
        }
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
    }

    fn is_playing(&self, id: ChannelId) -> bool {
        self.channels.get(&id).is_some_and(|c| c.playing)
    }
}
