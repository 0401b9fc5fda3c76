//! Frame loop tests over recorded and scripted sources

use super::*;
use crate::actions::{RawAction, RawPoint, RawTarget};
use crate::channel::{read_grid_channel, read_rows, read_sparse_channel, MANIFEST_FILE};
use crate::config::ExtractConfig;
use crate::error::SessionError;
use crate::actions::FunctionTable;
use crate::features::{FeatureBundle, FeatureCatalog, FeatureDecomposer, LayerDecomposer};
use crate::sparse::Grid;
use crate::snapshot::{Outcome, Snapshot};
use crate::source::fixtures::recording;
use crate::source::{FrameMode, FrameSource, RecordedSource, SourceError, SourceInfo};
use std::path::Path;
use std::sync::Arc;

fn config(root: &Path) -> ExtractConfig {
    ExtractConfig {
        fps: 30.0,
        step_mul: 10,
        screen_resolution: 4,
        minimap_resolution: 2,
        output_root: root.to_path_buf(),
        ..Default::default()
    }
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path).map(|t| t.lines().count()).unwrap_or(0)
}

#[test]
fn test_three_frame_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let mut rec = recording(&[1], 3, true);
    rec.perspectives[0].frames[1].actions =
        vec![RawAction::UnitCommand { ability_id: 999_999, target: None, queue_command: false }];

    let source = RecordedSource::from_recording(rec, 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(config(dir.path()), source).unwrap().run().unwrap();

    assert_eq!(report.termination, Termination::Finished);
    assert_eq!(report.stats.frames, 3);
    assert_eq!(report.stats.actions_written, 2);
    assert_eq!(report.stats.actions_skipped, 1);
    assert_eq!(
        report.result,
        Some(EpisodeResult { game_loop: 30, score: 200, outcome: Outcome::Victory })
    );

    let session_dir = dir.path().join("fixture_player_1");
    assert_eq!(report.session_dir, session_dir);

    let catalog = FeatureCatalog::new();
    for id in catalog.ids() {
        let path = session_dir.join(format!("{}.txt", catalog.channel_of(*id)));
        let expected = match id.class() {
            crate::features::FeatureClass::Grid => 9,
            crate::features::FeatureClass::Scalar => 3,
        };
        assert_eq!(line_count(&path), expected, "{}", catalog.channel_of(*id));
    }

    let actions = read_rows(&session_dir.join("action.txt")).unwrap();
    let action_loops: Vec<i64> = actions.iter().map(|row| row[0]).collect();
    assert_eq!(action_loops, vec![10, 30]);
    assert_eq!(actions[0], vec![10, 331, 0, 1, 2]);

    let loops = read_rows(&session_dir.join("game_loop.txt")).unwrap();
    assert_eq!(loops, vec![vec![10], vec![20], vec![30]]);
}

#[test]
fn test_grids_reconstruct_from_channels() {
    let dir = tempfile::tempdir().unwrap();
    let source = RecordedSource::from_recording(recording(&[1], 3, true), 1, FrameMode::Stepped).unwrap();
    Extractor::new(config(dir.path()), source).unwrap().run().unwrap();

    let grids = read_grid_channel(&dir.path().join("fixture_player_1/screen_unit_type.txt"), 4, 4).unwrap();
    assert_eq!(grids.len(), 3);
    for (i, grid) in grids.iter().enumerate() {
        assert_eq!(grid.cells()[i], 1);
        assert_eq!(grid.count_nonzero(), 1);
    }

    // Layers the fixture never carries are all-zero triples
    let creep = read_sparse_channel(&dir.path().join("fixture_player_1/minimap_creep.txt")).unwrap();
    assert!(creep.iter().all(|s| s.values.is_empty() && s.row_ptr == vec![0, 0, 0]));
}

#[test]
fn test_n_frames_without_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;

    let source = RecordedSource::from_recording(recording(&[1], 5, false), 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(cfg, source).unwrap().run().unwrap();

    assert_eq!(report.termination, Termination::SourceExhausted);
    assert_eq!(report.stats.frames, 5);
    assert_eq!(report.stats.pacing_computations, 5);
    assert_eq!(report.stats.blocking_waits, 0);
    assert_eq!(report.result.map(|r| r.outcome), Some(Outcome::Undecided));
}

#[test]
fn test_realtime_blocks_instead_of_pacing() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.realtime = true;

    let mut rec = recording(&[1], 4, false);
    rec.meta.loops_per_second = 10_000.0;
    let source = RecordedSource::from_recording(rec, 1, FrameMode::Realtime).unwrap();
    let report = Extractor::new(cfg, source).unwrap().run().unwrap();

    assert_eq!(report.termination, Termination::SourceExhausted);
    assert_eq!(report.stats.frames, 4);
    assert_eq!(report.stats.blocking_waits, 4);
    assert_eq!(report.stats.pacing_computations, 0);
}

#[test]
fn test_step_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;
    cfg.max_game_steps = 20;

    let source = RecordedSource::from_recording(recording(&[1], 5, false), 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(cfg, source).unwrap().run().unwrap();

    assert_eq!(report.termination, Termination::StepLimit);
    assert_eq!(report.stats.frames, 2);
}

#[test]
fn test_players_get_separate_directories() {
    let dir = tempfile::tempdir().unwrap();
    let rec = recording(&[1, 2], 3, true);

    for player in [1, 2] {
        let mut cfg = config(dir.path());
        cfg.observed_player = player;
        let source = RecordedSource::from_recording(rec.clone(), player, FrameMode::Stepped).unwrap();
        Extractor::new(cfg, source).unwrap().run().unwrap();
    }

    let p1 = dir.path().join("fixture_player_1");
    let p2 = dir.path().join("fixture_player_2");
    assert_eq!(line_count(&p1.join("game_loop.txt")), 3);
    assert_eq!(line_count(&p2.join("game_loop.txt")), 3);
    assert_eq!(read_rows(&p2.join("player.txt")).unwrap()[0][0], 2);
}

#[test]
fn test_player_mismatch_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.observed_player = 2;

    let source = RecordedSource::from_recording(recording(&[1, 2], 3, true), 1, FrameMode::Stepped).unwrap();
    let err = Extractor::new(cfg, source).unwrap().run().unwrap_err();
    assert!(matches!(err, SessionError::PlayerMismatch { configured: 2, observed: 1 }));
    assert!(!dir.path().join("fixture_player_1").exists());
}

#[test]
fn test_manifest_written() {
    let dir = tempfile::tempdir().unwrap();
    let source = RecordedSource::from_recording(recording(&[1], 2, true), 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(config(dir.path()), source).unwrap().run().unwrap();

    let manifest = SessionManifest::load(&report.session_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.session, "fixture_player_1");
    assert_eq!(manifest.termination, Termination::Finished);
    assert_eq!(manifest.stats.frames, 2);
    assert_eq!(manifest.channels.len(), FeatureCatalog::new().len() + 1);
    assert!(!report.session_dir.join("session.json.tmp").exists());
}

// ============================================================================
// Scripted source
// ============================================================================

/// Endless source; cancels or fails on a chosen pull
struct ScriptedSource {
    info: SourceInfo,
    pulls: u32,
    cancel_on: Option<(u32, CancelToken)>,
    fail_on: Option<u32>,
    replay: Option<Vec<u8>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            info: SourceInfo {
                session_name: "scripted".to_string(),
                observed_player: 1,
                resolutions: None,
                source_sha256: None,
                game_version: None,
                map_name: None,
            },
            pulls: 0,
            cancel_on: None,
            fail_on: None,
            replay: None,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn mode(&self) -> FrameMode {
        FrameMode::Stepped
    }

    fn advance(&mut self, _steps: u32) -> Result<(), SourceError> {
        Ok(())
    }

    fn current_snapshot(&mut self) -> Result<Arc<Snapshot>, SourceError> {
        self.pulls += 1;
        if self.fail_on == Some(self.pulls) {
            return Err(SourceError::Disconnected("engine went away".to_string()));
        }
        if let Some((at, token)) = &self.cancel_on {
            if *at == self.pulls {
                token.cancel();
            }
        }
        let mut snapshot = Snapshot { game_loop: self.pulls * 10, ..Default::default() };
        snapshot.score.score = i64::from(self.pulls);
        Ok(Arc::new(snapshot))
    }

    fn pending_actions(&mut self) -> Vec<RawAction> {
        vec![RawAction::CameraMove { center_minimap: RawPoint::new(1, 1) }]
    }

    fn save_replay(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.replay.clone())
    }
}

#[test]
fn test_cancellation_finalizes_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;

    let token = CancelToken::new();
    let mut source = ScriptedSource::new();
    source.cancel_on = Some((3, token.clone()));

    let report = Extractor::new(cfg, source).unwrap().with_cancel_token(token).run().unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.states.iter().filter(|s| **s == SessionState::Finalizing).count(), 1);
    assert_eq!(report.states.last(), Some(&SessionState::Terminated));
    assert_eq!(report.stats.frames, 2);
    // Best-effort result from the last pulled snapshot
    assert_eq!(report.result.map(|r| r.score), Some(3));

    let session_dir = dir.path().join("scripted_player_1");
    assert_eq!(line_count(&session_dir.join("game_loop.txt")), 2);
    assert_eq!(line_count(&session_dir.join("screen_height_map.txt")), 6);
    assert_eq!(line_count(&session_dir.join("action.txt")), 2);
}

#[test]
fn test_cancel_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(config(dir.path()), ScriptedSource::new()).unwrap();
    extractor.cancel_token().cancel();

    let report = extractor.run().unwrap();
    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.stats.frames, 0);
    assert_eq!(report.result, None);
    assert!(report.to_string().contains("Score: unknown"));
}

#[test]
fn test_source_failure_still_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;

    let mut source = ScriptedSource::new();
    source.fail_on = Some(3);

    let err = Extractor::new(cfg, source).unwrap().run().unwrap_err();
    assert!(matches!(err, SessionError::Source(SourceError::Disconnected(_))));
    assert!(err.channels_intact());

    let session_dir = dir.path().join("scripted_player_1");
    assert_eq!(line_count(&session_dir.join("game_loop.txt")), 2);

    let manifest = SessionManifest::load(&session_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.termination, Termination::Failed);
    assert!(manifest.error.unwrap().contains("engine went away"));
}

#[test]
fn test_replay_artifact_saved() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;
    cfg.save_replay = true;

    let token = CancelToken::new();
    let mut source = ScriptedSource::new();
    source.cancel_on = Some((2, token.clone()));
    source.replay = Some(b"replay-bytes".to_vec());

    let report = Extractor::new(cfg, source).unwrap().with_cancel_token(token).run().unwrap();

    let path = report.replay_path.unwrap();
    assert_eq!(path, dir.path().join("replays/scripted_player_1.replay"));
    assert_eq!(std::fs::read(&path).unwrap(), b"replay-bytes");
    assert!(path.with_extension("txt").exists());
}

#[test]
fn test_replay_write_failure_still_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(crate::session::REPLAY_DIR), "not a directory").unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;
    cfg.save_replay = true;

    let token = CancelToken::new();
    let mut source = ScriptedSource::new();
    source.cancel_on = Some((2, token.clone()));
    source.replay = Some(b"replay-bytes".to_vec());

    let report = Extractor::new(cfg, source).unwrap().with_cancel_token(token).run().unwrap();

    assert_eq!(report.replay_path, None);
    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.states.last(), Some(&SessionState::Terminated));
    let manifest = SessionManifest::load(&dir.path().join("scripted_player_1").join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.termination, Termination::Cancelled);
}

/// Layer decomposer that shrinks the last grid on one game loop
struct ShrinkingDecomposer {
    inner: LayerDecomposer,
    shrink_at: u32,
}

impl FeatureDecomposer for ShrinkingDecomposer {
    fn decompose(&self, snapshot: &Snapshot) -> FeatureBundle {
        let mut bundle = self.inner.decompose(snapshot);
        if snapshot.game_loop == self.shrink_at {
            if let Some((_, grid)) = bundle.grids.last_mut() {
                *grid = Grid::zeros(1, 1);
            }
        }
        bundle
    }
}

#[test]
fn test_corrupt_grid_leaves_no_partial_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.fps = 1_000.0;
    let decomposer = ShrinkingDecomposer { inner: LayerDecomposer::new(cfg.resolutions()), shrink_at: 20 };

    let source = RecordedSource::from_recording(recording(&[1], 3, false), 1, FrameMode::Stepped).unwrap();
    let err = Extractor::with_parts(cfg, source, decomposer, FunctionTable::builtin())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, SessionError::CorruptGrid { .. }));
    assert!(err.channels_intact());

    let session_dir = dir.path().join("fixture_player_1");
    let catalog = FeatureCatalog::new();
    for id in catalog.ids().iter().filter(|id| id.class() == crate::features::FeatureClass::Grid) {
        let path = session_dir.join(format!("{}.txt", catalog.channel_of(*id)));
        assert_eq!(line_count(&path), 3, "{}", catalog.channel_of(*id));
    }
    let manifest = SessionManifest::load(&session_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.termination, Termination::Failed);
}

#[test]
fn test_profile_report_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.profile = true;

    let source = RecordedSource::from_recording(recording(&[1], 2, true), 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(cfg, source).unwrap().run().unwrap();

    let profile = report.profile.unwrap();
    assert!(profile.stages.iter().any(|(name, t)| *name == "decompose" && t.calls == 2));
}

#[test]
fn test_screen_action_target_out_of_bounds_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut rec = recording(&[1], 1, true);
    // 4x4 screen; x = 4 is outside
    rec.perspectives[0].frames[0].actions = vec![RawAction::UnitCommand {
        ability_id: 16,
        target: Some(RawTarget::Screen(RawPoint::new(4, 0))),
        queue_command: false,
    }];
    let source = RecordedSource::from_recording(rec, 1, FrameMode::Stepped).unwrap();
    let report = Extractor::new(config(dir.path()), source).unwrap().run().unwrap();

    assert_eq!(report.stats.actions_skipped, 1);
    assert_eq!(line_count(&dir.path().join("fixture_player_1/action.txt")), 0);
}
