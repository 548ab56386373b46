/// Sound library
///
/// Maps logical identifiers to playback definitions. Missing entries and
/// definitions without a resolved clip are reported as absent so callers can
/// treat missing audio as a silent no-op.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::clip::AudioClip;
use super::source::SoundId;
use crate::assets::AssetResolver;

pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;

/// Playback definition for one sound
#[derive(Debug, Clone, PartialEq)]
pub struct SoundDefinition {
    pub id: SoundId,
    pub clip: Option<AudioClip>,

    /// Base volume (0.0-1.0)
    pub volume: f32,

    /// Fixed pitch (0.5-2.0)
    pub pitch: f32,

    pub random_pitch: bool,
    pub pitch_range: (f32, f32),

    pub looping: bool,
}

impl SoundDefinition {
    pub fn new(id: SoundId, clip: Option<AudioClip>) -> Self {
        Self {
            id,
            clip,
            volume: 1.0,
            pitch: 1.0,
            random_pitch: false,
            pitch_range: (0.95, 1.05),
            looping: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        self
    }

    /// Randomize pitch uniformly within `[min, max]` on every trigger
    pub fn with_random_pitch(mut self, min: f32, max: f32) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.random_pitch = true;
        self.pitch_range = (
            lo.clamp(MIN_PITCH, MAX_PITCH),
            hi.clamp(MIN_PITCH, MAX_PITCH),
        );
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

/// Authoring entry as stored in a library file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundEntry {
    pub id: SoundId,

    /// Asset address of the clip
    #[serde(default)]
    pub clip: String,

    #[serde(default = "default_one")]
    pub volume: f32,

    #[serde(default = "default_one")]
    pub pitch: f32,

    #[serde(default)]
    pub random_pitch: bool,

    #[serde(default = "default_pitch_range")]
    pub pitch_range: [f32; 2],

    #[serde(default, rename = "loop")]
    pub looping: bool,
}

fn default_one() -> f32 {
    1.0
}

fn default_pitch_range() -> [f32; 2] {
    [0.95, 1.05]
}

impl SoundEntry {
    fn into_definition(self, clip: Option<AudioClip>) -> SoundDefinition {
        let def = SoundDefinition::new(self.id, clip)
            .with_volume(self.volume)
            .with_pitch(self.pitch)
            .with_loop(self.looping);
        if self.random_pitch {
            def.with_random_pitch(self.pitch_range[0], self.pitch_range[1])
        } else {
            SoundDefinition {
                pitch_range: (self.pitch_range[0], self.pitch_range[1]),
                ..def
            }
        }
    }
}

/// Library file: separate music and effect tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryManifest {
    #[serde(default)]
    pub music: Vec<SoundEntry>,

    #[serde(default)]
    pub effects: Vec<SoundEntry>,
}

impl LibraryManifest {
    /// Read a library file; a missing or corrupt file yields an empty library
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("No sound library at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("Ignoring corrupt sound library {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Identifier to definition mapping
#[derive(Debug, Clone, Default)]
pub struct SoundLibrary {
    definitions: HashMap<SoundId, SoundDefinition>,
}

impl SoundLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from definitions; later duplicates win
    pub fn from_definitions(definitions: impl IntoIterator<Item = SoundDefinition>) -> Self {
        let mut library = Self::new();
        library.register(definitions);
        library
    }

    /// Resolve the clips of authoring entries and register them.
    ///
    /// All loads are started before any is awaited. Entries whose clip fails
    /// to resolve stay registered without a clip.
    pub fn load(entries: Vec<SoundEntry>, resolver: &dyn AssetResolver) -> Self {
        let pending: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let load = resolver.load_async(&entry.clip);
                (entry, load)
            })
            .collect();

        let definitions = pending.into_iter().map(|(entry, load)| {
            let clip = load.wait();
            if clip.is_none() {
                tracing::warn!("Sound {} has no playable clip ({:?})", entry.id, entry.clip);
            }
            entry.into_definition(clip)
        });

        Self::from_definitions(definitions)
    }

    /// Register definitions, overwriting existing ones with the same id
    pub fn register(&mut self, definitions: impl IntoIterator<Item = SoundDefinition>) {
        for definition in definitions {
            if let Some(previous) = self.definitions.insert(definition.id, definition) {
                tracing::debug!("Replaced duplicate definition for {}", previous.id);
            }
        }
    }

    /// Find a playable definition
    pub fn lookup(&self, id: SoundId) -> Option<&SoundDefinition> {
        self.definitions.get(&id).filter(|d| d.clip.is_some())
    }

    /// Whether a definition exists, playable or not
    pub fn contains(&self, id: SoundId) -> bool {
        self.definitions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Clips referenced by this library
    pub fn clips(&self) -> impl Iterator<Item = &AudioClip> {
        self.definitions.values().filter_map(|d| d.clip.as_ref())
    }
}
