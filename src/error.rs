use thiserror::Error;

/// Library errors using thiserror for structured error handling.
///
/// The sound core itself never surfaces these to gameplay code: playback
/// failures are logged and degrade to silence. They exist for construction,
/// persistence, asset loading and the manifest tool.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to open playback channel")]
    ChannelOpenFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to decode audio clip: {name}")]
    DecodeFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown channel: {0}")]
    UnknownChannel(u64),

    #[error("Effect pool size must be at least 1")]
    EmptyPool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Could not determine the user config directory")]
    NoConfigDir,

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset address is empty")]
    EmptyAddress,

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Failed to read asset {address}")]
    ReadFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported or corrupt audio in {address}: {reason}")]
    InvalidAudio { address: String, reason: String },

    #[error("Asset load was abandoned before completing")]
    Abandoned,
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest.json not found: {0}")]
    NotFound(String),

    #[error("Failed to read or write {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest.json is not valid JSON")]
    Parse(#[source] serde_json::Error),

    #[error("Invalid manifest structure: {0}")]
    Structure(String),

    #[error("Unknown package: {0}")]
    UnknownPackage(String),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AssetError::NotFound("sfx/click.wav".to_string());
        assert_eq!(err.to_string(), "Asset not found: sfx/click.wav");

        let err = AudioError::EmptyPool;
        assert_eq!(err.to_string(), "Effect pool size must be at least 1");
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/config.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/config.json"
        );
    }
}
