//! # rx_core - Replay Feature Extraction
//!
//! Turns a stream of engine observation snapshots into durable per-feature
//! channels for offline analysis.
//!
//! ## Pipeline
//! - `source`: frame sources (recorded sessions, stepped or real-time)
//! - `features`: snapshot → closed set of grid and scalar features
//! - `sparse`: CSR compaction of dense grids
//! - `actions`: raw commands → symbolic (function, arguments)
//! - `channel`: append-only per-feature output channels
//! - `session`: the frame loop, pacing, cancellation and finalization

// Doc formatting lints - purely cosmetic
#![allow(clippy::doc_lazy_continuation)]

pub mod actions;
pub mod channel;
pub mod config;
pub mod error;
pub mod features;
pub mod pacing;
pub mod snapshot;
pub mod session;
pub mod source;
pub mod sparse;

pub use actions::{ActionMapper, CommandSchema, FunctionTable, SymbolicAction, Untranslatable};
pub use channel::{ChannelRegistry, SessionId};
pub use config::{ExtractConfig, Resolutions};
pub use error::SessionError;
pub use features::{FeatureBundle, FeatureDecomposer, FeatureId, LayerDecomposer};
pub use pacing::Pacer;
pub use session::{CancelToken, EpisodeResult, Extractor, SessionReport, Termination};
pub use snapshot::{Outcome, Snapshot};
pub use source::{FrameMode, FrameSource, RecordedSource, Recording};
pub use sparse::{Grid, SparseGrid};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
