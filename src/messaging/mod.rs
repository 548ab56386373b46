/// Messaging module
///
/// Broadcast of application events between loosely coupled parts, e.g. the
/// settings store notifying the sound manager.
///
/// ## Usage
///
/// ```rust,ignore
/// let event_bus = EventBus::new();
/// let (rx, _id) = event_bus.subscribe();
///
/// let settings = SettingsStore::load(prefs, event_bus.clone());
/// settings.set_user_bgm_volume(0.5);
///
/// // Once per frame on the audio thread
/// sound.sync_settings(&rx);
/// ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use events::Event;
