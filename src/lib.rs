//! Essential Core
//!
//! Game audio core (music with fades and crossfades, pooled and positional
//! effects, persisted bus volumes) plus the services around it: preferences,
//! audio settings, asset loading, a service registry and a package manifest
//! patcher.

pub mod assets;
pub mod audio_system;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod messaging;
pub mod prefs;
pub mod registry;
pub mod settings;
