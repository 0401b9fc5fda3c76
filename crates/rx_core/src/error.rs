use thiserror::Error;

use crate::channel::ChannelError;
use crate::config::ConfigError;
use crate::source::SourceError;
use crate::sparse::SparseError;

/// Session-level failures. Any of these aborts the frame loop.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Corrupt grid for {feature}: {source}")]
    CorruptGrid {
        feature: String,
        #[source]
        source: SparseError,
    },

    #[error("Observed player mismatch: config has {configured}, source observes {observed}")]
    PlayerMismatch { configured: u32, observed: u32 },

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the channels written so far can still be trusted.
    pub fn channels_intact(&self) -> bool {
        match self {
            SessionError::Channel(_) => false,
            SessionError::Io(_) => false,
            _ => true,
        }
    }
}
