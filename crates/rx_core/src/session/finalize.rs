//! Session finalization: episode result, summary, manifest and replay artifact

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::profile::ProfileReport;
use crate::channel::{ChannelStats, SessionId};
use crate::config::ExtractConfig;
use crate::error::SessionError;
use crate::snapshot::{Outcome, Snapshot};
use crate::source::SourceInfo;

/// Manifest schema version
pub const MANIFEST_VERSION: u32 = 1;

/// Directory under the output root that receives saved replays
pub const REPLAY_DIR: &str = "replays";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Running,
    Finalizing,
    Terminated,
}

/// Why the frame loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The engine reported a player result
    Finished,
    Cancelled,
    /// `max_game_steps` reached
    StepLimit,
    /// The source ran out of frames without a result
    SourceExhausted,
    Failed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Termination::Finished => "finished",
            Termination::Cancelled => "cancelled",
            Termination::StepLimit => "step limit reached",
            Termination::SourceExhausted => "source exhausted",
            Termination::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames fully written
    pub frames: u64,
    pub pacing_computations: u64,
    /// Real-time pulls that blocked on the source
    pub blocking_waits: u64,
    pub actions_written: u64,
    pub actions_skipped: u64,
    /// Layers replaced by zero grids
    pub degraded_features: u64,
    pub grid_rows: u64,
    pub scalar_rows: u64,
}

/// Final score and outcome, from the observed player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub game_loop: u32,
    pub score: i64,
    pub outcome: Outcome,
}

impl EpisodeResult {
    /// Outcome stays `Undecided` when the snapshot carries no result for `player`
    pub fn from_snapshot(snapshot: &Snapshot, player: u32) -> Self {
        Self {
            game_loop: snapshot.game_loop,
            score: snapshot.score.score,
            outcome: snapshot.result_for(player).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: SessionId,
    pub session_dir: PathBuf,
    pub termination: Termination,
    pub result: Option<EpisodeResult>,
    pub stats: SessionStats,
    /// Every state entered, in order
    pub states: Vec<SessionState>,
    pub channels: Vec<ChannelStats>,
    pub replay_path: Option<PathBuf>,
    pub profile: Option<ProfileReport>,
    pub error: Option<String>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Session: {} ({})", self.session, self.termination)?;
        writeln!(
            f,
            "Frames: {}, actions written: {}, skipped: {}",
            self.stats.frames, self.stats.actions_written, self.stats.actions_skipped
        )?;
        match &self.result {
            Some(result) => {
                writeln!(f, "Score: {}", result.score)?;
                write!(f, "Result: {}", result.outcome)
            }
            None => {
                writeln!(f, "Score: unknown")?;
                write!(f, "Result: unknown")
            }
        }
    }
}

// ============================================================================
// Manifest
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestChannel {
    pub name: String,
    pub rows: u64,
}

/// `session.json`, written once per run at finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub manifest_version: u32,
    pub crate_version: String,
    pub session: String,
    pub source: SourceInfo,
    pub config: ExtractConfig,
    pub started_at: String,
    pub finished_at: String,
    pub termination: Termination,
    pub result: Option<EpisodeResult>,
    pub stats: SessionStats,
    pub channels: Vec<ManifestChannel>,
    pub error: Option<String>,
}

impl SessionManifest {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Write via a temp file and rename so readers never see a half-written manifest
pub fn write_manifest_atomic(path: &Path, manifest: &SessionManifest) -> Result<(), SessionError> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(manifest)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// `<root>/replays/<session>.replay` plus a `.txt` with the final score
pub fn save_replay_artifact(
    output_root: &Path,
    session: &SessionId,
    bytes: &[u8],
    result: Option<&EpisodeResult>,
) -> Result<PathBuf, SessionError> {
    let dir = output_root.join(REPLAY_DIR);
    fs::create_dir_all(&dir)?;

    let replay_path = dir.join(format!("{}.replay", session.dir_name()));
    fs::write(&replay_path, bytes)?;

    let summary = match result {
        Some(r) => format!("Score: {}\nResult: {}\nGame loop: {}\n", r.score, r.outcome, r.game_loop),
        None => "Score: unknown\nResult: unknown\n".to_string(),
    };
    fs::write(replay_path.with_extension("txt"), summary)?;
    Ok(replay_path)
}
