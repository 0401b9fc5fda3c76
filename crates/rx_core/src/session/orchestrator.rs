//! Frame loop

use chrono::Utc;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::finalize::{
    save_replay_artifact, write_manifest_atomic, EpisodeResult, ManifestChannel, SessionManifest, SessionReport,
    SessionState, SessionStats, Termination, MANIFEST_VERSION,
};
use super::profile::{Stage, Stopwatch};
use super::CancelToken;
use crate::actions::{ActionMapper, CommandSchema, FunctionTable, RawAction};
use crate::channel::{ChannelHandle, ChannelRegistry, SessionId, MANIFEST_FILE};
use crate::config::ExtractConfig;
use crate::error::SessionError;
use crate::features::{FeatureCatalog, FeatureDecomposer, FeatureId, LayerDecomposer, ACTION_CHANNEL};
use crate::pacing::Pacer;
use crate::snapshot::Snapshot;
use crate::source::{FrameMode, FrameSource, SourceError};
use crate::sparse::{self, Grid};

/// Drives one extraction session from a frame source to its channels
pub struct Extractor<S: FrameSource, D: FeatureDecomposer = LayerDecomposer> {
    config: ExtractConfig,
    source: S,
    decomposer: D,
    mapper: ActionMapper,
    cancel: CancelToken,
}

/// Everything the loop mutates while Running
struct RunContext {
    session: SessionId,
    registry: ChannelRegistry,
    features: FxHashMap<FeatureId, ChannelHandle>,
    action: ChannelHandle,
    stats: SessionStats,
    states: Vec<SessionState>,
    stopwatch: Stopwatch,
    /// Most recent snapshot pulled from the source
    last: Option<Arc<Snapshot>>,
}

impl RunContext {
    fn enter(&mut self, state: SessionState) {
        debug!(session = %self.session, ?state, "state");
        self.states.push(state);
    }
}

impl<S: FrameSource> Extractor<S> {
    /// Extractor with the layer decomposer and the built-in function table
    pub fn new(config: ExtractConfig, source: S) -> Result<Self, SessionError> {
        let decomposer = LayerDecomposer::new(config.resolutions());
        Self::with_parts(config, source, decomposer, FunctionTable::builtin())
    }
}

impl<S: FrameSource, D: FeatureDecomposer> Extractor<S, D> {
    pub fn with_parts(
        config: ExtractConfig,
        source: S,
        decomposer: D,
        schema: Arc<dyn CommandSchema + Send + Sync>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let mapper = ActionMapper::new(schema, config.resolutions());
        Ok(Self { config, source, decomposer, mapper, cancel: CancelToken::new() })
    }

    /// Token that stops the loop at the next iteration boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Run the session to completion.
    ///
    /// A failure while Running still goes through Finalizing (manifest
    /// included) before the error is returned.
    pub fn run(mut self) -> Result<SessionReport, SessionError> {
        let started_at = Utc::now().to_rfc3339();
        let mut ctx = self.initialize()?;

        ctx.enter(SessionState::Running);
        let outcome = self.run_frames(&mut ctx);

        let (termination, failure) = match outcome {
            Ok(termination) => (termination, None),
            Err(err) => {
                warn!(session = %ctx.session, error = %err, "session failed, finalizing");
                (Termination::Failed, Some(err))
            }
        };

        let finalized = self.finalize(&mut ctx, termination, started_at, failure.as_ref());
        match (failure, finalized) {
            (Some(err), Ok(_)) => Err(err),
            (Some(err), Err(final_err)) => {
                warn!(error = %final_err, "finalization after failure also failed");
                Err(err)
            }
            (None, result) => result,
        }
    }

    // ========================================================================
    // Initializing
    // ========================================================================

    fn initialize(&mut self) -> Result<RunContext, SessionError> {
        let info = self.source.info().clone();
        if info.observed_player != self.config.observed_player {
            return Err(SessionError::PlayerMismatch {
                configured: self.config.observed_player,
                observed: info.observed_player,
            });
        }
        if let Some(resolutions) = info.resolutions {
            if resolutions != self.config.resolutions() {
                warn!(
                    source = ?resolutions,
                    configured = ?self.config.resolutions(),
                    "source resolutions differ from configuration; mismatched layers will be zeroed"
                );
            }
        }
        if (self.source.mode() == FrameMode::Realtime) != self.config.realtime {
            warn!(mode = ?self.source.mode(), "source mode overrides the realtime setting");
        }

        let session = SessionId::new(&info.session_name, info.observed_player);
        let mut registry = ChannelRegistry::new(session.dir(&self.config.output_root));
        registry.ensure_dir()?;

        let catalog = FeatureCatalog::new();
        let features = catalog
            .ids()
            .iter()
            .map(|&id| (id, registry.handle(catalog.channel_of(id))))
            .collect();
        let action = registry.handle(ACTION_CHANNEL);

        info!(
            session = %session,
            dir = %registry.session_dir().display(),
            channels = registry.len(),
            mode = ?self.source.mode(),
            "session initialized"
        );

        Ok(RunContext {
            session,
            registry,
            features,
            action,
            stats: SessionStats::default(),
            states: vec![SessionState::Initializing],
            stopwatch: Stopwatch::new(self.config.profile),
            last: None,
        })
    }

    // ========================================================================
    // Running
    // ========================================================================

    fn run_frames(&mut self, ctx: &mut RunContext) -> Result<Termination, SessionError> {
        let stepped = self.source.mode() == FrameMode::Stepped;
        let pacer = Pacer::from_fps(self.config.fps);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }
            let started = Instant::now();

            if stepped {
                let t = ctx.stopwatch.start();
                let advanced = self.source.advance(self.config.step_mul);
                ctx.stopwatch.stop(Stage::Advance, t);
                match advanced {
                    Err(SourceError::EndOfStream) => return Ok(Termination::SourceExhausted),
                    other => other?,
                }
            }

            let t = ctx.stopwatch.start();
            let pulled = self.source.current_snapshot();
            ctx.stopwatch.stop(Stage::Observe, t);
            let snapshot = match pulled {
                Err(SourceError::EndOfStream) => return Ok(Termination::SourceExhausted),
                other => other?,
            };
            if !stepped {
                ctx.stats.blocking_waits += 1;
            }
            let actions = self.source.pending_actions();
            ctx.last = Some(Arc::clone(&snapshot));

            if self.cancel.is_cancelled() {
                return Ok(Termination::Cancelled);
            }

            self.write_frame(ctx, &snapshot, &actions)?;

            let t = ctx.stopwatch.start();
            ctx.registry.flush()?;
            ctx.stopwatch.stop(Stage::Flush, t);
            ctx.stats.frames += 1;

            if snapshot.is_terminal() {
                return Ok(Termination::Finished);
            }
            if stepped && self.config.max_game_steps > 0 && u64::from(snapshot.game_loop) >= self.config.max_game_steps
            {
                return Ok(Termination::StepLimit);
            }

            if stepped {
                let t = ctx.stopwatch.start();
                pacer.pace(started);
                ctx.stopwatch.stop(Stage::Pace, t);
                ctx.stats.pacing_computations += 1;
            }
        }
    }

    /// Shape a grid channel is decoded with
    fn grid_shape(&self, id: FeatureId, grid: &Grid) -> (usize, usize) {
        let resolutions = self.config.resolutions();
        match id {
            FeatureId::Screen(_) => (resolutions.screen as usize, resolutions.screen as usize),
            FeatureId::Minimap(_) => (resolutions.minimap as usize, resolutions.minimap as usize),
            FeatureId::Other(_) => (grid.rows(), grid.cols()),
        }
    }

    fn write_frame(
        &self,
        ctx: &mut RunContext,
        snapshot: &Snapshot,
        actions: &[RawAction],
    ) -> Result<(), SessionError> {
        let t = ctx.stopwatch.start();
        let bundle = self.decomposer.decompose(snapshot);
        ctx.stopwatch.stop(Stage::Decompose, t);
        ctx.stats.degraded_features += bundle.issues.len() as u64;

        // Every grid is encoded and checked before the first append
        let t = ctx.stopwatch.start();
        let mut encoded = Vec::with_capacity(bundle.grids.len());
        for (id, grid) in &bundle.grids {
            let stored = sparse::encode(grid);
            if self.config.verify_grids {
                let (rows, cols) = self.grid_shape(*id, grid);
                stored
                    .validate(rows, cols)
                    .map_err(|source| SessionError::CorruptGrid { feature: id.channel_name(), source })?;
            }
            encoded.push((ctx.features[id], stored));
        }
        for (handle, stored) in &encoded {
            ctx.registry.append_sparse(*handle, stored)?;
            ctx.stats.grid_rows += 3;
        }
        ctx.stopwatch.stop(Stage::Grids, t);

        let t = ctx.stopwatch.start();
        for (id, values) in &bundle.scalars {
            let handle = ctx.features[id];
            ctx.registry.append(handle, values)?;
            ctx.stats.scalar_rows += 1;
        }
        ctx.stopwatch.stop(Stage::Scalars, t);

        let t = ctx.stopwatch.start();
        for action in actions {
            match self.mapper.translate(action) {
                Ok(symbolic) => {
                    ctx.registry.append(ctx.action, &symbolic.to_row(snapshot.game_loop))?;
                    ctx.stats.actions_written += 1;
                }
                Err(reason) => {
                    debug!(game_loop = snapshot.game_loop, %reason, ?action, "action skipped");
                    ctx.stats.actions_skipped += 1;
                }
            }
        }
        ctx.stopwatch.stop(Stage::Actions, t);
        Ok(())
    }

    // ========================================================================
    // Finalizing
    // ========================================================================

    fn finalize(
        &mut self,
        ctx: &mut RunContext,
        termination: Termination,
        started_at: String,
        failure: Option<&SessionError>,
    ) -> Result<SessionReport, SessionError> {
        ctx.enter(SessionState::Finalizing);

        // Rows appended before a failure are kept as they are
        let flushed = ctx.registry.flush();

        let player = self.config.observed_player;
        let result = ctx.last.as_deref().map(|s| EpisodeResult::from_snapshot(s, player));

        let mut replay_path = None;
        if self.config.save_replay {
            match self.source.save_replay() {
                Ok(Some(bytes)) => {
                    match save_replay_artifact(&self.config.output_root, &ctx.session, &bytes, result.as_ref()) {
                        Ok(path) => {
                            info!(path = %path.display(), "replay saved");
                            replay_path = Some(path);
                        }
                        Err(err) => warn!(error = %err, "replay artifact could not be written"),
                    }
                }
                Ok(None) => info!("source has no replay to save"),
                Err(err) => warn!(error = %err, "replay could not be saved"),
            }
        }

        let channels = ctx.registry.stats();
        let manifest = SessionManifest {
            manifest_version: MANIFEST_VERSION,
            crate_version: crate::VERSION.to_string(),
            session: ctx.session.dir_name(),
            source: self.source.info().clone(),
            config: self.config.clone(),
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            termination,
            result,
            stats: ctx.stats,
            channels: channels.iter().map(|c| ManifestChannel { name: c.name.clone(), rows: c.rows }).collect(),
            error: failure.map(|e| e.to_string()),
        };
        write_manifest_atomic(&ctx.registry.session_dir().join(MANIFEST_FILE), &manifest)?;

        info!(
            session = %ctx.session,
            termination = %termination,
            frames = ctx.stats.frames,
            score = ?result.map(|r| r.score),
            outcome = ?result.map(|r| r.outcome),
            "session finalized"
        );
        ctx.enter(SessionState::Terminated);
        flushed?;

        Ok(SessionReport {
            session: ctx.session.clone(),
            session_dir: ctx.registry.session_dir().to_path_buf(),
            termination,
            result,
            stats: ctx.stats,
            states: ctx.states.clone(),
            channels,
            replay_path,
            profile: ctx.stopwatch.is_enabled().then(|| ctx.stopwatch.report()),
            error: manifest.error,
        })
    }
}
