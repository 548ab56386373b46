//! Asset resolution
//!
//! Loads audio clips by address on a worker thread. Failures are logged with
//! their cause and resolve to `None`: callers treat that as "nothing loaded"
//! and never see an error. There is no retry and no timeout.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use parking_lot::Mutex;

use crate::audio_system::AudioClip;
use crate::error::AssetError;
use crate::messaging::{Event, EventBus};

/// Result of an asynchronous load, collected later
pub struct PendingAsset {
    state: PendingState,
}

enum PendingState {
    Waiting(Receiver<Option<AudioClip>>),
    Done(Option<AudioClip>),
}

impl PendingAsset {
    /// An already-completed load
    pub fn ready(clip: Option<AudioClip>) -> Self {
        Self {
            state: PendingState::Done(clip),
        }
    }

    fn waiting(rx: Receiver<Option<AudioClip>>) -> Self {
        Self {
            state: PendingState::Waiting(rx),
        }
    }

    /// Poll without blocking; `None` while the load is still running
    pub fn poll(&mut self) -> Option<Option<AudioClip>> {
        if let PendingState::Waiting(rx) = &self.state {
            let result = match rx.try_recv() {
                Ok(clip) => clip,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!("{}", AssetError::Abandoned);
                    None
                }
            };
            self.state = PendingState::Done(result);
        }

        match &self.state {
            PendingState::Done(clip) => Some(clip.clone()),
            PendingState::Waiting(_) => None,
        }
    }

    /// Block until the load finishes
    pub fn wait(self) -> Option<AudioClip> {
        match self.state {
            PendingState::Done(clip) => clip,
            PendingState::Waiting(rx) => rx.recv().unwrap_or_else(|_| {
                tracing::error!("{}", AssetError::Abandoned);
                None
            }),
        }
    }
}

/// Address-based clip loading
pub trait AssetResolver: Send + Sync {
    /// Start loading `address`; an empty address or any failure yields `None`
    fn load_async(&self, address: &str) -> PendingAsset;

    /// Give back a clip obtained from `load_async`
    fn release(&self, clip: &AudioClip);
}

/// Resolves addresses as paths relative to a root directory
pub struct FileAssetResolver {
    root: PathBuf,
    events: Option<EventBus>,
    loaded: Arc<Mutex<HashMap<String, usize>>>,
}

impl FileAssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            events: None,
            loaded: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Also publish `Event::AssetLoadFailed` on failures
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of clips handed out and not yet released
    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().values().sum()
    }

    fn resolve_path(root: &Path, address: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(address);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AssetError::NotFound(address.to_string()));
        }
        Ok(root.join(relative))
    }

    fn load_blocking(root: &Path, address: &str) -> Result<AudioClip, AssetError> {
        let path = Self::resolve_path(root, address)?;
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(address.to_string())
            } else {
                AssetError::ReadFailed {
                    address: address.to_string(),
                    source,
                }
            }
        })?;
        AudioClip::from_bytes(address, bytes)
    }
}

impl AssetResolver for FileAssetResolver {
    fn load_async(&self, address: &str) -> PendingAsset {
        if address.is_empty() {
            tracing::error!("[Assets] {}", AssetError::EmptyAddress);
            return PendingAsset::ready(None);
        }

        let (tx, rx) = bounded(1);
        let root = self.root.clone();
        let events = self.events.clone();
        let loaded = Arc::clone(&self.loaded);
        let address_owned = address.to_string();

        let spawned = std::thread::Builder::new()
            .name(format!("asset-load:{}", address))
            .spawn(move || {
                let address = address_owned;
                let result = match Self::load_blocking(&root, &address) {
                    Ok(clip) => {
                        *loaded.lock().entry(address.clone()).or_insert(0) += 1;
                        tracing::debug!("Loaded {} ({} bytes)", address, clip.data().len());
                        Some(clip)
                    }
                    Err(e) => {
                        let reason = error_chain(&e);
                        tracing::error!("[Assets] Load failed: {}\n{}", address, reason);
                        if let Some(events) = events {
                            events.publish(Event::AssetLoadFailed { address, reason });
                        }
                        None
                    }
                };
                // Receiver may already be gone; nothing to report then
                let _ = tx.send(result);
            });

        match spawned {
            Ok(_) => PendingAsset::waiting(rx),
            Err(e) => {
                tracing::error!("[Assets] Could not start load of {}: {}", address, e);
                PendingAsset::ready(None)
            }
        }
    }

    fn release(&self, clip: &AudioClip) {
        let mut loaded = self.loaded.lock();
        if let Some(count) = loaded.get_mut(clip.name()) {
            *count -= 1;
            if *count == 0 {
                loaded.remove(clip.name());
            }
            tracing::debug!("Released {}", clip.name());
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
