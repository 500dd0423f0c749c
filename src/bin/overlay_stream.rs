//! overlay_stream - live overlay loop
//!
//! This tool:
//! 1. Pulls frames from the configured source (stills or stub:// stream)
//! 2. Hands them to a background detection worker, dropping frames while it is busy
//! 3. Renders the newest detection batch on the display thread
//! 4. Periodically writes the latest composed frame to the output directory

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use drone_overlay::config::OverlayConfig;
use drone_overlay::{compose, DetectionWorker, DisplayLoop, FileSource, Size, SubmitOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: image file, image directory or stub://name.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many captured frames (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    frames: u64,
    /// Capture rate override.
    #[arg(long)]
    fps: Option<u32>,
    /// Directory for composed snapshots.
    #[arg(long, default_value = "overlay_out")]
    out_dir: PathBuf,
    /// Write a snapshot every N rendered batches (0 disables snapshots).
    #[arg(long, default_value_t = 10)]
    snapshot_every: u64,
    /// Config file (JSON or TOML). Falls back to DRONE_OVERLAY_CONFIG.
    #[arg(long, env = "DRONE_OVERLAY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = OverlayConfig::load_from(args.config.as_deref())?;
    if let Some(source) = &args.source {
        cfg.source.path = source.clone();
    }
    let fps = args.fps.unwrap_or(cfg.source.target_fps);
    if fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);

    if args.snapshot_every > 0 {
        std::fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("creating {}", args.out_dir.display()))?;
    }

    let mut source = FileSource::new(cfg.file_config())?;
    source.connect()?;

    let registry = cfg.detector.build_registry()?;
    let (submitter, batches, worker) =
        DetectionWorker::spawn(registry, cfg.worker_options())?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    // The display surface follows the upright size of the captured frames.
    let first = source.next_frame()?;
    let mut display = DisplayLoop::new(
        first.display_surface()?,
        cfg.overlay.stroke,
        cfg.overlay.clamp,
    );
    submitter.try_submit(first);
    let mut captured = 1u64;
    let mut snapshots = 0u64;
    let mut last_health_log = Instant::now();

    log::info!(
        "overlay_stream running: source={} backend={} fps={}",
        cfg.source.path,
        cfg.detector.backend,
        fps
    );

    while !stop.load(Ordering::SeqCst) && (args.frames == 0 || captured < args.frames) {
        let tick = Instant::now();

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("capture failed: {:#}", e);
                std::thread::sleep(frame_interval);
                continue;
            }
        };
        captured += 1;

        let (w, h) = frame.display_size();
        let surface = display.surface();
        if surface.width != w as f32 || surface.height != h as f32 {
            display.resize(Size::from_pixels(w, h)?);
        }
        let upright = frame.upright();
        if submitter.try_submit(frame) == SubmitOutcome::Closed {
            log::error!("detection worker stopped unexpectedly");
            break;
        }

        if display.pump(&batches) {
            log::debug!(
                "frame {:?}: {} overlay element(s)",
                display.last_frame_seq(),
                display.layer().len()
            );
            if args.snapshot_every > 0 && display.rendered_batches() % args.snapshot_every == 0 {
                let path = args.out_dir.join(format!("overlay_{:06}.png", snapshots));
                compose(&upright, display.layer())
                    .save(&path)
                    .with_context(|| format!("writing snapshot {}", path.display()))?;
                snapshots += 1;
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = worker.stats();
            let source_stats = source.stats();
            log::info!(
                "source health={} frames={} | worker processed={} failed={} dropped={} | display rendered={} stale={} mismatched={}",
                source.is_healthy(),
                source_stats.frames_captured,
                stats.processed,
                stats.failed,
                stats.dropped,
                display.rendered_batches(),
                display.stale_batches(),
                display.aspect_mismatches()
            );
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log::info!("stopping detection worker...");
    drop(submitter);
    let stats = worker.stats();
    worker.stop()?;
    display.pump(&batches);

    println!("stream summary:");
    println!("  frames captured: {}", captured);
    println!("  frames processed: {}", stats.processed);
    println!("  frames skipped (inference failed): {}", stats.failed);
    println!("  frames dropped (worker busy): {}", stats.dropped);
    println!("  batches rendered: {}", display.rendered_batches());
    println!("  overlay elements on screen: {}", display.layer().len());
    println!("  snapshots written: {}", snapshots);
    Ok(())
}
