/// Effect channel pool
///
/// A fixed set of pre-opened channels handed out round-robin, plus
/// positional channels that close themselves once their clip has run out.

use std::time::Duration;

use super::backend::{AudioBackend, ChannelId, Position};
use crate::error::AudioError;

/// Lowest pitch used when computing how long a transient channel lives
pub const MIN_RELEASE_PITCH: f32 = 0.01;

/// Seconds a clip of `duration` plays at `pitch`
pub fn transient_lifetime(duration: Duration, pitch: f32) -> f32 {
    duration.as_secs_f32() / pitch.max(MIN_RELEASE_PITCH)
}

#[derive(Debug, Clone, Copy)]
struct TransientChannel {
    id: ChannelId,
    remaining: f32,
}

/// Round-robin pool of reusable effect channels
#[derive(Debug)]
pub struct ChannelPool {
    channels: Vec<ChannelId>,
    index: usize,
    transients: Vec<TransientChannel>,
}

impl ChannelPool {
    /// Open `size` channels on the backend
    pub fn new<B: AudioBackend + ?Sized>(backend: &mut B, size: usize) -> Result<Self, AudioError> {
        if size == 0 {
            return Err(AudioError::EmptyPool);
        }

        let channels = (0..size)
            .map(|_| backend.open_channel(None))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Opened effect pool with {} channels", size);

        Ok(Self {
            channels,
            index: 0,
            transients: Vec::new(),
        })
    }

    /// Next channel in round-robin order, whether or not it is still playing
    pub fn acquire_effect_channel(&mut self) -> ChannelId {
        let id = self.channels[self.index];
        self.index = (self.index + 1) % self.channels.len();
        id
    }

    /// Open a positional channel that is closed after the clip has played
    pub fn acquire_transient_channel<B: AudioBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        position: Position,
        clip_duration: Duration,
        pitch: f32,
    ) -> Result<ChannelId, AudioError> {
        let id = backend.open_channel(Some(position))?;
        self.transients.push(TransientChannel {
            id,
            remaining: transient_lifetime(clip_duration, pitch),
        });
        Ok(id)
    }

    /// Advance transient lifetimes, closing the expired ones.
    ///
    /// Returns the number of channels released.
    pub fn tick<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, dt: f32) -> usize {
        let before = self.transients.len();
        self.transients.retain_mut(|transient| {
            transient.remaining -= dt;
            if transient.remaining <= 0.0 {
                backend.close_channel(transient.id);
                false
            } else {
                true
            }
        });
        before - self.transients.len()
    }

    /// Close a transient early (no-op for pooled or unknown channels)
    pub fn release_transient<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, id: ChannelId) {
        if let Some(pos) = self.transients.iter().position(|t| t.id == id) {
            self.transients.swap_remove(pos);
            backend.close_channel(id);
        }
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn size(&self) -> usize {
        self.channels.len()
    }

    pub fn transient_count(&self) -> usize {
        self.transients.len()
    }

    /// Positional channels still alive
    pub fn transient_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.transients.iter().map(|t| t.id)
    }

    /// Pooled and positional channels together
    pub fn all_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().copied().chain(self.transient_channels())
    }

    /// Close every channel the pool owns
    pub fn close_all<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) {
        for transient in self.transients.drain(..) {
            backend.close_channel(transient.id);
        }
        for id in &self.channels {
            backend.close_channel(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::MemoryBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_pool_rejected() {
        let mut backend = MemoryBackend::new();
        assert!(matches!(
            ChannelPool::new(&mut backend, 0),
            Err(AudioError::EmptyPool)
        ));
    }

    #[test]
    fn test_round_robin_wraps_at_pool_size() {
        let mut backend = MemoryBackend::new();
        let mut pool = ChannelPool::new(&mut backend, 3).unwrap();

        let first_lap: Vec<_> = (0..3).map(|_| pool.acquire_effect_channel()).collect();
        assert_eq!(first_lap, pool.channels());

        for k in 0..3 {
            assert_eq!(pool.acquire_effect_channel(), first_lap[k]);
        }
    }

    #[test]
    fn test_transient_released_after_scaled_duration() {
        let mut backend = MemoryBackend::new();
        let mut pool = ChannelPool::new(&mut backend, 1).unwrap();

        // 1s clip at double speed lives 0.5s
        let id = pool
            .acquire_transient_channel(&mut backend, [0.0, 1.0, 0.0], Duration::from_secs(1), 2.0)
            .unwrap();
        assert_eq!(pool.transient_count(), 1);

        assert_eq!(pool.tick(&mut backend, 0.3), 0);
        assert!(backend.channel(id).is_some());

        assert_eq!(pool.tick(&mut backend, 0.2), 1);
        assert!(backend.channel(id).is_none());
        assert_eq!(pool.transient_count(), 0);
    }

    #[test]
    fn test_all_channels_lists_transients() {
        let mut backend = MemoryBackend::new();
        let mut pool = ChannelPool::new(&mut backend, 2).unwrap();
        let id = pool
            .acquire_transient_channel(&mut backend, [0.0; 3], Duration::from_secs(1), 1.0)
            .unwrap();

        assert_eq!(pool.transient_channels().collect::<Vec<_>>(), vec![id]);
        let all: Vec<_> = pool.all_channels().collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], id);

        pool.tick(&mut backend, 1.0);
        assert_eq!(pool.transient_channels().count(), 0);
    }

    #[test]
    fn test_lifetime_guards_near_zero_pitch() {
        assert_relative_eq!(transient_lifetime(Duration::from_secs(1), 0.0), 100.0);
        assert_relative_eq!(transient_lifetime(Duration::from_secs(2), 1.0), 2.0);
        assert!(transient_lifetime(Duration::from_secs(1), -3.0).is_finite());
    }

    #[test]
    fn test_close_all() {
        let mut backend = MemoryBackend::new();
        let mut pool = ChannelPool::new(&mut backend, 2).unwrap();
        pool.acquire_transient_channel(&mut backend, [0.0; 3], Duration::from_secs(5), 1.0)
            .unwrap();
        assert_eq!(backend.open_count(), 3);

        pool.close_all(&mut backend);
        assert_eq!(backend.open_count(), 0);
    }
}
