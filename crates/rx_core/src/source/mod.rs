//! Frame sources
//!
//! A frame source hands the loop one snapshot per iteration plus whatever the
//! observed player issued since the previous pull. Live engine bindings and
//! the recorded-session player both implement [`FrameSource`].

mod recorded;
mod recording;

pub use recorded::RecordedSource;
pub use recording::{
    pack, sha256_hex, verify_packed, Frame, PackMetadata, Perspective, Recording, RecordingMeta, PACK_SCHEMA_VERSION,
};

#[cfg(test)]
pub(crate) use recording::fixtures;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::actions::RawAction;
use crate::config::Resolutions;
use crate::snapshot::Snapshot;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("LZ4 decompression error: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("Player {player} not in recording (available: {available:?})")]
    UnknownPlayer { player: u32, available: Vec<u32> },

    #[error("End of stream")]
    EndOfStream,

    #[error("Engine disconnected: {0}")]
    Disconnected(String),

    #[error("Malformed source: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMode {
    /// The loop advances the source by `step_mul` and paces itself
    Stepped,
    /// The source advances on its own clock; pulling blocks until a frame is due
    Realtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Replay or session name; becomes part of the session directory
    pub session_name: String,
    pub observed_player: u32,
    /// Layer resolutions the source produces, when it knows them
    pub resolutions: Option<Resolutions>,
    /// SHA-256 of the source file, when there is one
    pub source_sha256: Option<String>,
    pub game_version: Option<String>,
    pub map_name: Option<String>,
}

pub trait FrameSource {
    fn info(&self) -> &SourceInfo;

    fn mode(&self) -> FrameMode;

    /// Move the engine forward by `steps` game loops (stepped mode only)
    fn advance(&mut self, steps: u32) -> Result<(), SourceError>;

    /// Current snapshot. In real-time mode this blocks until the next frame.
    fn current_snapshot(&mut self) -> Result<Arc<Snapshot>, SourceError>;

    /// Actions issued since the previous call
    fn pending_actions(&mut self) -> Vec<RawAction>;

    /// Replay bytes for live sessions; `None` when the source has nothing to save
    fn save_replay(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(None)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &SourceInfo {
        (**self).info()
    }

    fn mode(&self) -> FrameMode {
        (**self).mode()
    }

    fn advance(&mut self, steps: u32) -> Result<(), SourceError> {
        (**self).advance(steps)
    }

    fn current_snapshot(&mut self) -> Result<Arc<Snapshot>, SourceError> {
        (**self).current_snapshot()
    }

    fn pending_actions(&mut self) -> Vec<RawAction> {
        (**self).pending_actions()
    }

    fn save_replay(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        (**self).save_replay()
    }
}
