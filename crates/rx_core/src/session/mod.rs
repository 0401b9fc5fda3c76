//! Extraction session
//!
//! The frame loop and everything around it. One [`Extractor`] runs one
//! session: a single source, a single observed player, one output directory.
//!
//! ## States
//!
//! `Initializing → Running → Finalizing → Terminated`
//!
//! Finalizing is entered exactly once per run, whether the loop stopped on a
//! player result, a step limit, the end of the stream, cancellation or a
//! failure.

mod finalize;
mod orchestrator;
pub mod profile;

#[cfg(test)]
mod orchestrator_tests;

pub use finalize::{
    save_replay_artifact, write_manifest_atomic, EpisodeResult, ManifestChannel, SessionManifest, SessionReport,
    SessionState, SessionStats, Termination, MANIFEST_VERSION, REPLAY_DIR,
};
pub use orchestrator::Extractor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag, observed at iteration boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
