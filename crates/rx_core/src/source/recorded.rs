//! Recorded-session playback
//!
//! Stepped mode: `advance(n)` moves a game-loop cursor forward by `n`; every
//! recorded frame at or before the cursor is consumed, the latest becomes the
//! current snapshot and their actions accumulate until pulled. When a step
//! lands in a gap the cursor closes it to the next recorded frame.
//!
//! Real-time mode: `current_snapshot` sleeps until the next frame is due at
//! the recording's loops-per-second rate, then returns it.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use super::recording::Recording;
use super::{FrameMode, FrameSource, SourceError, SourceInfo};
use crate::actions::RawAction;
use crate::snapshot::Snapshot;

#[derive(Debug)]
struct Played {
    snapshot: Arc<Snapshot>,
    actions: Vec<RawAction>,
}

#[derive(Debug)]
pub struct RecordedSource {
    info: SourceInfo,
    mode: FrameMode,
    frames: Vec<Played>,
    loops_per_second: f64,
    /// Game loop reached by stepping
    cursor: u64,
    /// Index of the first frame not yet consumed
    next: usize,
    current: Option<Arc<Snapshot>>,
    pending: Vec<RawAction>,
    clock_start: Option<Instant>,
}

impl RecordedSource {
    pub fn open(path: &Path, player: u32, mode: FrameMode) -> Result<Self, SourceError> {
        let (recording, checksum) = Recording::load(path)?;
        let mut source = Self::from_recording(recording, player, mode)?;
        source.info.source_sha256 = Some(checksum);
        Ok(source)
    }

    pub fn from_recording(recording: Recording, player: u32, mode: FrameMode) -> Result<Self, SourceError> {
        let available = recording.players();
        let Recording { meta, perspectives } = recording;
        let perspective = perspectives
            .into_iter()
            .find(|p| p.player_id == player)
            .ok_or(SourceError::UnknownPlayer { player, available })?;

        let frames = perspective
            .frames
            .into_iter()
            .map(|f| Played { snapshot: Arc::new(f.snapshot), actions: f.actions })
            .collect::<Vec<_>>();
        debug!(session = %meta.replay_name, player, frames = frames.len(), "recording opened");

        Ok(Self {
            info: SourceInfo {
                session_name: meta.replay_name,
                observed_player: player,
                resolutions: meta.resolutions,
                source_sha256: None,
                game_version: meta.game_version,
                map_name: meta.map_name,
            },
            mode,
            frames,
            loops_per_second: meta.loops_per_second,
            cursor: 0,
            next: 0,
            current: None,
            pending: Vec::new(),
            clock_start: None,
        })
    }

    pub fn remaining_frames(&self) -> usize {
        self.frames.len() - self.next
    }

    fn consume(&mut self, idx: usize) {
        let frame = &mut self.frames[idx];
        self.current = Some(Arc::clone(&frame.snapshot));
        self.pending.append(&mut frame.actions);
        self.next = idx + 1;
    }

    fn frame_loop(&self, idx: usize) -> u64 {
        u64::from(self.frames[idx].snapshot.game_loop)
    }

    /// Wall-clock offset of frame `idx` from the first frame, `None` when
    /// it does not fit a `Duration`
    fn due_offset(&self, idx: usize) -> Option<Duration> {
        if !(self.loops_per_second.is_finite() && self.loops_per_second > 0.0) {
            return Some(Duration::ZERO);
        }
        let loops = self.frame_loop(idx).saturating_sub(self.frame_loop(0));
        Duration::try_from_secs_f64(loops as f64 / self.loops_per_second).ok()
    }
}

impl FrameSource for RecordedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn mode(&self) -> FrameMode {
        self.mode
    }

    fn advance(&mut self, steps: u32) -> Result<(), SourceError> {
        if self.next >= self.frames.len() {
            return Err(SourceError::EndOfStream);
        }
        self.cursor += u64::from(steps);
        if self.frame_loop(self.next) > self.cursor {
            self.cursor = self.frame_loop(self.next);
        }
        while self.next < self.frames.len() && self.frame_loop(self.next) <= self.cursor {
            self.consume(self.next);
        }
        Ok(())
    }

    fn current_snapshot(&mut self) -> Result<Arc<Snapshot>, SourceError> {
        if self.mode == FrameMode::Realtime {
            if self.next >= self.frames.len() {
                return Err(SourceError::EndOfStream);
            }
            let start = *self.clock_start.get_or_insert_with(Instant::now);
            let due = self
                .due_offset(self.next)
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| {
                    SourceError::Malformed(format!(
                        "frame {} is not reachable at {} loops per second",
                        self.next, self.loops_per_second
                    ))
                })?;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
            self.consume(self.next);
        }
        self.current
            .clone()
            .ok_or_else(|| SourceError::Malformed("no frame has been reached yet".to_string()))
    }

    fn pending_actions(&mut self) -> Vec<RawAction> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixtures::recording;

    #[test]
    fn test_stepped_playback() {
        let mut source = RecordedSource::from_recording(recording(&[1], 3, true), 1, FrameMode::Stepped).unwrap();
        assert_eq!(source.info().session_name, "fixture");

        for expected_loop in [10, 20, 30] {
            source.advance(10).unwrap();
            assert_eq!(source.current_snapshot().unwrap().game_loop, expected_loop);
            assert_eq!(source.pending_actions().len(), 1);
            assert!(source.pending_actions().is_empty());
        }
        assert!(matches!(source.advance(10), Err(SourceError::EndOfStream)));
    }

    #[test]
    fn test_large_steps_merge_actions() {
        let mut source = RecordedSource::from_recording(recording(&[1], 4, false), 1, FrameMode::Stepped).unwrap();
        source.advance(25).unwrap();
        assert_eq!(source.current_snapshot().unwrap().game_loop, 20);
        assert_eq!(source.pending_actions().len(), 2);
        assert_eq!(source.remaining_frames(), 2);
    }

    #[test]
    fn test_small_steps_close_gaps() {
        let mut source = RecordedSource::from_recording(recording(&[1], 2, false), 1, FrameMode::Stepped).unwrap();
        source.advance(1).unwrap();
        assert_eq!(source.current_snapshot().unwrap().game_loop, 10);
        source.advance(1).unwrap();
        assert_eq!(source.current_snapshot().unwrap().game_loop, 20);
    }

    #[test]
    fn test_snapshot_before_first_step() {
        let mut source = RecordedSource::from_recording(recording(&[1], 2, false), 1, FrameMode::Stepped).unwrap();
        assert!(matches!(source.current_snapshot(), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_unknown_player() {
        let err = RecordedSource::from_recording(recording(&[1, 2], 1, false), 3, FrameMode::Stepped).unwrap_err();
        match err {
            SourceError::UnknownPlayer { player, available } => {
                assert_eq!(player, 3);
                assert_eq!(available, vec![1, 2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_realtime_waits_for_frames() {
        let mut rec = recording(&[1], 3, false);
        rec.meta.loops_per_second = 1_000.0;
        let mut source = RecordedSource::from_recording(rec, 1, FrameMode::Realtime).unwrap();

        let started = Instant::now();
        for expected_loop in [10, 20, 30] {
            assert_eq!(source.current_snapshot().unwrap().game_loop, expected_loop);
        }
        // 20 loops between first and last frame at 1000 loops/s
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(matches!(source.current_snapshot(), Err(SourceError::EndOfStream)));
    }

    #[test]
    fn test_realtime_unreachable_frame_is_an_error() {
        let mut rec = recording(&[1], 2, false);
        rec.meta.loops_per_second = 1e-300;
        let mut source = RecordedSource::from_recording(rec, 1, FrameMode::Realtime).unwrap();

        assert_eq!(source.current_snapshot().unwrap().game_loop, 10);
        assert!(matches!(source.current_snapshot(), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_open_records_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        recording(&[1], 2, false).save_json(&path).unwrap();

        let source = RecordedSource::open(&path, 1, FrameMode::Stepped).unwrap();
        assert_eq!(source.info().source_sha256.as_deref().map(str::len), Some(64));
    }
}
