/// Service registry and composition root
///
/// `bootstrap` builds every service once, wires them together by
/// constructor injection, seals the registry and installs it as the
/// process-wide one. Other code receives its collaborators directly;
/// typed lookups are for the host's entry point.
///
/// The sound manager is handed back separately: it is driven from the
/// host's frame loop and its backend may not be shareable across threads.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;

use crate::assets::FileAssetResolver;
use crate::audio_system::{AudioBackend, LibraryManifest, SoundLibrary, SoundManager, VolumeState};
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::messaging::{Event, EventBus};
use crate::prefs::PreferenceStore;
use crate::settings::{SettingsStore, KEY_AUDIO};

/// Shared, thread-safe services keyed by type
pub struct ServiceRegistry {
    services: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    sealed: AtomicBool,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register a service, replacing one of the same type.
    ///
    /// Returns false once the registry is sealed.
    pub fn register<T: Any + Send + Sync>(&self, service: Arc<T>) -> bool {
        if self.is_sealed() {
            tracing::warn!(
                "Registry is sealed, ignoring {}",
                std::any::type_name::<T>()
            );
            return false;
        }
        if self
            .services
            .write()
            .insert(TypeId::of::<T>(), service)
            .is_some()
        {
            tracing::debug!("Replaced service {}", std::any::type_name::<T>());
        }
        true
    }

    /// Typed lookup; `None` when nothing of that type was registered
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let service = self.services.read().get(&TypeId::of::<T>()).cloned()?;
        service.downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    /// Refuse further registrations
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Arc<ServiceRegistry>> = OnceLock::new();

/// Publish `registry` process-wide. Only the first call succeeds; later
/// calls get their registry back.
pub fn install(registry: Arc<ServiceRegistry>) -> Result<(), Arc<ServiceRegistry>> {
    GLOBAL.set(registry)
}

/// The installed registry, if any
pub fn global() -> Option<&'static Arc<ServiceRegistry>> {
    GLOBAL.get()
}

/// Everything `bootstrap` produced
pub struct Services<B: AudioBackend> {
    pub registry: Arc<ServiceRegistry>,
    pub sound: SoundManager<B>,

    /// Settings changes for `sound`, drained by `tick`
    pub settings_events: Receiver<Event>,
}

impl<B: AudioBackend> Services<B> {
    /// Apply pending settings changes, then advance playback by `dt`
    pub fn tick(&mut self, dt: f32) {
        self.sound.sync_settings(&self.settings_events);
        self.sound.update(dt);
    }

    pub fn settings(&self) -> Option<Arc<SettingsStore>> {
        self.registry.get::<SettingsStore>()
    }

    /// Announce shutdown to subscribers and close every audio channel
    pub fn shutdown(&mut self) {
        if let Some(events) = self.registry.get::<EventBus>() {
            events.publish(Event::Shutdown);
        }
        self.sound.shutdown();
    }
}

/// Build and wire all services.
///
/// Registered: `AppConfig`, `EventBus`, `SettingsStore`, `FileAssetResolver`
/// and `Arc<dyn PreferenceStore>`. The registry comes back sealed, and the
/// first one built is also published through `install`.
pub fn bootstrap<B: AudioBackend>(
    config: &AppConfig,
    prefs: Arc<dyn PreferenceStore>,
    backend: B,
) -> AppResult<Services<B>> {
    let events = EventBus::new();

    // Stored settings win over stored bus volumes; fresh installs keep the latter
    let has_stored_settings = prefs.has_key(KEY_AUDIO);
    let settings = Arc::new(SettingsStore::load(Arc::clone(&prefs), events.clone()));

    let resolver = Arc::new(FileAssetResolver::new(config.asset_root.clone()).with_events(events.clone()));
    let manifest = LibraryManifest::load(&config.library_path());
    let music = SoundLibrary::load(manifest.music, resolver.as_ref());
    let effects = SoundLibrary::load(manifest.effects, resolver.as_ref());

    let volumes = VolumeState::load(Arc::clone(&prefs));
    let mut sound = SoundManager::new(backend, music, effects, volumes, config.effect_pool_size)
        .context("Failed to start the sound manager")?;
    if has_stored_settings {
        sound.apply_settings(&settings.audio());
    }
    let (settings_events, _) = events.subscribe();

    let registry = Arc::new(ServiceRegistry::new());
    registry.register(Arc::new(config.clone()));
    registry.register(Arc::new(events));
    registry.register(settings);
    registry.register(resolver);
    registry.register(Arc::new(prefs));
    registry.seal();
    if install(Arc::clone(&registry)).is_err() {
        tracing::warn!("A global registry is already installed, keeping it");
    }

    tracing::info!("Services ready ({} registered)", registry.len());
    Ok(Services {
        registry,
        sound,
        settings_events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[test]
    fn test_register_and_get() {
        let registry = ServiceRegistry::new();
        assert!(registry.get::<Counter>().is_none());

        assert!(registry.register(Arc::new(Counter(3))));
        assert_eq!(registry.get::<Counter>().unwrap().0, 3);
        assert!(registry.contains::<Counter>());
        assert!(!registry.contains::<String>());
    }

    #[test]
    fn test_sealed_registry_rejects_registration() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Counter(1)));
        registry.seal();

        assert!(!registry.register(Arc::new(Counter(2))));
        assert_eq!(registry.get::<Counter>().unwrap().0, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_install_only_once() {
        let first = Arc::new(ServiceRegistry::new());
        first.register(Arc::new(Counter(7)));

        // The global is process-wide, so the first install may come from elsewhere
        let _ = install(Arc::clone(&first));
        let installed = Arc::clone(global().unwrap());
        assert!(install(Arc::new(ServiceRegistry::new())).is_err());
        assert!(Arc::ptr_eq(global().unwrap(), &installed));
    }
}
