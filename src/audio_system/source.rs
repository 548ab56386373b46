/// Sound identifiers and volume buses
///
/// Defines the closed set of sounds the game can request, and the two
/// buses every channel reads its volume from.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical sound identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundId {
    /// UI click
    Click,

    /// Explosion one-shot
    Explosion,

    /// Item pickup
    Pickup,

    /// Main menu music
    MenuTheme,

    /// In-game music
    BattleTheme,
}

impl SoundId {
    pub const ALL: [SoundId; 5] = [
        SoundId::Click,
        SoundId::Explosion,
        SoundId::Pickup,
        SoundId::MenuTheme,
        SoundId::BattleTheme,
    ];
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundId::Click => write!(f, "Click"),
            SoundId::Explosion => write!(f, "Explosion"),
            SoundId::Pickup => write!(f, "Pickup"),
            SoundId::MenuTheme => write!(f, "Menu Theme"),
            SoundId::BattleTheme => write!(f, "Battle Theme"),
        }
    }
}

/// Volume buses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bus {
    /// Background music
    Music,

    /// Sound effects
    Effects,
}

impl Bus {
    pub const ALL: [Bus; 2] = [Bus::Music, Bus::Effects];

    /// Stable slot index for per-bus arrays
    pub fn index(&self) -> usize {
        match self {
            Bus::Music => 0,
            Bus::Effects => 1,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::Music => write!(f, "Music"),
            Bus::Effects => write!(f, "Effects"),
        }
    }
}
