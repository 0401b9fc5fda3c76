//! rx_extract CLI
//!
//! Recorded session → per-feature channels, plus packing and offline
//! inspection of the results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rx_core::actions::{CommandSchema, FunctionTable};
use rx_core::channel::{read_grid_channel, read_rows};
use rx_core::session::SessionReport;
use rx_core::source::{pack, verify_packed, PackMetadata};
use rx_core::{CancelToken, ExtractConfig, Extractor, FrameMode, LayerDecomposer, RecordedSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rx_extract", version)]
#[command(about = "Extract per-feature channels from recorded game sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction session
    Extract(ExtractArgs),

    /// Convert a JSON recording to MessagePack+LZ4
    Pack {
        /// Input JSON recording
        #[arg(long)]
        r#in: PathBuf,

        /// Output packed recording
        #[arg(long)]
        out: PathBuf,

        /// Verify the checksum after writing
        #[arg(long, default_value = "false")]
        verify: bool,

        /// Output metadata JSON file
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Reconstruct a channel file
    Inspect {
        /// Channel file (`<session>/<channel>.txt`)
        channel: PathBuf,

        /// Grid rows; with --cols, decode as a grid channel
        #[arg(long, requires = "cols")]
        rows: Option<usize>,

        #[arg(long, requires = "rows")]
        cols: Option<usize>,

        /// Print only this frame
        #[arg(long)]
        frame: Option<usize>,
    },
}

#[derive(Args, Debug, Default)]
struct ExtractArgs {
    /// Recorded session (`.json` or packed)
    #[arg(long)]
    replay: PathBuf,

    /// Config file (YAML or JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which player's perspective to extract
    #[arg(long)]
    observed_player: Option<u32>,

    /// Target frames per second
    #[arg(long)]
    fps: Option<f64>,

    /// Game steps per observation
    #[arg(long)]
    step_mul: Option<u32>,

    #[arg(long)]
    screen_resolution: Option<u32>,

    #[arg(long)]
    minimap_resolution: Option<u32>,

    /// Play the recording back on its own clock
    #[arg(long)]
    realtime: bool,

    /// Print per-stage timings at the end
    #[arg(long)]
    profile: bool,

    /// Stop at this game loop (0 = unlimited)
    #[arg(long)]
    max_game_steps: Option<u64>,

    /// Root directory for session directories
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Function schema file extending or replacing the built-in table
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Save the replay artifact when the source provides one
    #[arg(long)]
    save_replay: bool,

    /// Skip encoded-grid validation before writing
    #[arg(long)]
    no_verify: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => {
            let token = CancelToken::new();
            let handler_token = token.clone();
            ctrlc::set_handler(move || {
                eprintln!("\n⏹  Interrupted, finishing the current frame...");
                handler_token.cancel();
            })
            .context("Failed to install Ctrl-C handler")?;

            let report = run_extract(&args, token)?;
            print_report(&report);
        }

        Commands::Pack { r#in, out, verify, metadata } => {
            println!("🔨 Packing recording...");
            println!("   Input:  {}", r#in.display());
            println!("   Output: {}", out.display());

            let meta = pack(&r#in, &out).context("Failed to pack recording")?;
            print_metadata(&meta);

            if verify {
                verify_integrity(&out, &meta.checksum)?;
            }
            if let Some(metadata_path) = metadata {
                save_metadata(&metadata_path, &meta)?;
            }
        }

        Commands::Inspect { channel, rows, cols, frame } => inspect(&channel, rows.zip(cols), frame)?,
    }

    Ok(())
}

// ============================================================================
// extract
// ============================================================================

fn build_config(args: &ExtractArgs) -> Result<ExtractConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ExtractConfig::default(),
    };

    if let Some(v) = args.observed_player {
        config.observed_player = v;
    }
    if let Some(v) = args.fps {
        config.fps = v;
    }
    if let Some(v) = args.step_mul {
        config.step_mul = v;
    }
    if let Some(v) = args.screen_resolution {
        config.screen_resolution = v;
    }
    if let Some(v) = args.minimap_resolution {
        config.minimap_resolution = v;
    }
    if let Some(v) = args.max_game_steps {
        config.max_game_steps = v;
    }
    if let Some(v) = &args.output_dir {
        config.output_root = v.clone();
    }
    config.realtime |= args.realtime;
    config.profile |= args.profile;
    config.save_replay |= args.save_replay;
    if args.no_verify {
        config.verify_grids = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_extract(args: &ExtractArgs, token: CancelToken) -> Result<SessionReport> {
    let config = build_config(args)?;
    let mode = if config.realtime { FrameMode::Realtime } else { FrameMode::Stepped };

    let source = RecordedSource::open(&args.replay, config.observed_player, mode)
        .with_context(|| format!("Failed to open recording: {}", args.replay.display()))?;

    let schema: Arc<dyn CommandSchema + Send + Sync> = match &args.schema {
        Some(path) => Arc::new(
            FunctionTable::load(path).with_context(|| format!("Failed to load schema: {}", path.display()))?,
        ),
        None => FunctionTable::builtin(),
    };

    info!(
        replay = %args.replay.display(),
        player = config.observed_player,
        fps = config.fps,
        step_mul = config.step_mul,
        "starting extraction"
    );

    let decomposer = LayerDecomposer::new(config.resolutions());
    let report = Extractor::with_parts(config, source, decomposer, schema)?
        .with_cancel_token(token)
        .run()
        .context("Extraction failed")?;
    Ok(report)
}

fn print_report(report: &SessionReport) {
    println!("\n✅ Session {} ({})", report.session, report.termination);
    println!("   Directory: {}", report.session_dir.display());
    println!("   Frames:    {}", report.stats.frames);
    println!(
        "   Actions:   {} written, {} skipped",
        report.stats.actions_written, report.stats.actions_skipped
    );
    if report.stats.degraded_features > 0 {
        println!("   ⚠️  Degraded layers: {}", report.stats.degraded_features);
    }
    if let Some(path) = &report.replay_path {
        println!("   Replay:    {}", path.display());
    }
    match &report.result {
        Some(result) => {
            println!("Score: {}", result.score);
            println!("Result: {}", result.outcome);
        }
        None => println!("Score: unknown\nResult: unknown"),
    }
    if let Some(profile) = &report.profile {
        println!("\n⏱  Profile\n{profile}");
    }
}

// ============================================================================
// pack
// ============================================================================

fn print_metadata(meta: &PackMetadata) {
    println!("\n✅ Recording packed successfully!");
    println!(
        "   Original size:   {} bytes ({:.2} KB)",
        meta.original_size,
        meta.original_size as f64 / 1024.0
    );
    println!(
        "   Compressed size: {} bytes ({:.2} KB)",
        meta.compressed_size,
        meta.compressed_size as f64 / 1024.0
    );
    println!("   Compression:     {:.1}%", meta.compression_ratio * 100.0);
    println!("   Frames:          {}", meta.frames);
    println!("   Checksum:        {}", meta.checksum);
    println!("   Created:         {}", meta.created_at);
}

fn verify_integrity(path: &Path, checksum: &str) -> Result<()> {
    println!("\n🔍 Verifying packed recording...");
    if verify_packed(path, checksum)? {
        println!("✅ Verification passed");
        Ok(())
    } else {
        anyhow::bail!("❌ Verification failed - checksum mismatch!")
    }
}

fn save_metadata(path: &Path, meta: &PackMetadata) -> Result<()> {
    let metadata_json = serde_json::to_string_pretty(meta)?;
    std::fs::write(path, metadata_json)?;
    println!("\n📄 Metadata saved to: {}", path.display());
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

fn inspect(channel: &Path, shape: Option<(usize, usize)>, frame: Option<usize>) -> Result<()> {
    match shape {
        Some((rows, cols)) => {
            let grids = read_grid_channel(channel, rows, cols)
                .with_context(|| format!("Failed to read grid channel: {}", channel.display()))?;
            println!("{}: {} frames of {}x{}", channel.display(), grids.len(), rows, cols);
            for (i, grid) in grids.iter().enumerate() {
                if frame.is_some_and(|f| f != i) {
                    continue;
                }
                println!("frame {i}: {} nonzero", grid.count_nonzero());
                if frame.is_some() {
                    for r in 0..grid.rows() {
                        let line: Vec<String> = grid.row(r).iter().map(|v| v.to_string()).collect();
                        println!("  {}", line.join(" "));
                    }
                }
            }
        }
        None => {
            let rows = read_rows(channel).with_context(|| format!("Failed to read channel: {}", channel.display()))?;
            println!("{}: {} rows", channel.display(), rows.len());
            for (i, row) in rows.iter().enumerate() {
                if frame.is_some_and(|f| f != i) {
                    continue;
                }
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{i}: {}", line.join(","));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const RECORDING: &str = r#"{
        "meta": { "replay_name": "cli_test", "resolutions": { "screen": 4, "minimap": 2 } },
        "perspectives": [
            { "player_id": 1, "frames": [
                { "snapshot": { "game_loop": 10 },
                  "actions": [ { "kind": "select_army", "add": false } ] },
                { "snapshot": { "game_loop": 20,
                                "player_result": [ { "player_id": 1, "result": "defeat" } ] } }
            ] }
        ]
    }"#;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("extract.yaml");
        std::fs::write(&config_path, "fps: 15\nstep_mul: 4\n").unwrap();

        let cli = Cli::try_parse_from([
            "rx_extract",
            "extract",
            "--replay",
            "game.json",
            "--config",
            config_path.to_str().unwrap(),
            "--step-mul",
            "8",
            "--no-verify",
        ])
        .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };

        let config = build_config(&args).unwrap();
        assert_eq!(config.fps, 15.0);
        assert_eq!(config.step_mul, 8);
        assert!(!config.verify_grids);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = ExtractArgs { fps: Some(0.0), ..Default::default() };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_extract_recording() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("cli_test.json");
        std::fs::write(&replay, RECORDING).unwrap();

        let args = ExtractArgs {
            replay,
            fps: Some(1_000.0),
            screen_resolution: Some(4),
            minimap_resolution: Some(2),
            output_dir: Some(dir.path().join("out")),
            ..Default::default()
        };
        let report = run_extract(&args, CancelToken::new()).unwrap();

        assert_eq!(report.stats.frames, 2);
        assert_eq!(report.stats.actions_written, 1);
        assert_eq!(report.result.map(|r| r.score), Some(0));

        let actions = read_rows(&dir.path().join("out/cli_test_player_1/action.txt")).unwrap();
        assert_eq!(actions, vec![vec![10, 7, 0]]);
    }
}
