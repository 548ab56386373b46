/// Audio system module
///
/// Centralized playback for a game: background music on one dedicated
/// channel, short effects on a round-robin channel pool, and positional
/// one-shots on channels that release themselves when the clip is done.
///
/// ## Architecture
///
/// ```text
/// SoundManager<B: AudioBackend>
///   ├── SoundLibrary (music)      id → SoundDefinition
///   ├── SoundLibrary (effects)    id → SoundDefinition
///   ├── VolumeState               bus volumes + mute, persisted
///   ├── FadeScheduler             one fade slot per bus
///   ├── music channel             + incoming channel while crossfading
///   └── ChannelPool               N effect channels + transient channels
///
/// AudioBackend
///   ├── MemoryBackend             headless / tests
///   └── RodioBackend              default output device (feature `rodio-backend`)
/// ```
///
/// Everything is driven by `SoundManager::update(dt)` from the host's frame
/// loop. Missing sounds are silent no-ops, never errors.
///
/// ## Usage
///
/// ```rust,ignore
/// use essential_core::audio_system::{MemoryBackend, SoundId, SoundManager};
///
/// let mut sound = SoundManager::new(backend, music, effects, volumes, 10)?;
/// sound.play_music(SoundId::MenuTheme, 1.0);
/// sound.play_effect(SoundId::Click);
///
/// // every frame
/// sound.update(dt);
/// ```
pub mod backend;
pub mod channel;
pub mod clip;
pub mod fade;
pub mod library;
pub mod manager;
#[cfg(feature = "rodio-backend")]
pub mod player;
pub mod source;
pub mod volume;

// Re-export commonly used types
pub use backend::{AudioBackend, ChannelId, ChannelSettings, MemoryBackend, Position};
pub use channel::ChannelPool;
pub use clip::AudioClip;
pub use fade::{FadeScheduler, FadeState};
pub use library::{LibraryManifest, SoundDefinition, SoundEntry, SoundLibrary};
pub use manager::SoundManager;
#[cfg(feature = "rodio-backend")]
pub use player::RodioBackend;
pub use source::{Bus, SoundId};
pub use volume::VolumeState;
