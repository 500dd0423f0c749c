//! overlay_image - detect objects in one still image and write an annotated copy

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use drone_overlay::config::OverlayConfig;
use drone_overlay::ui::Ui;
use drone_overlay::{annotate_still, Frame, Orientation};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to analyze (jpg or png).
    #[arg(long)]
    image: PathBuf,
    /// EXIF orientation of the stored pixels (1-8).
    #[arg(long, default_value_t = 1)]
    orientation: u8,
    /// Where to write the annotated PNG.
    #[arg(long, default_value = "overlay.png")]
    out: PathBuf,
    /// Config file (JSON or TOML). Falls back to DRONE_OVERLAY_CONFIG.
    #[arg(long, env = "DRONE_OVERLAY_CONFIG")]
    config: Option<PathBuf>,
    /// Outline thickness in pixels. Defaults to overlay.stroke_width from the
    /// config when set there, otherwise to the still-image preset (12).
    #[arg(long)]
    stroke_width: Option<f32>,
    /// Print detections as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Output style: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::from_flag(args.ui.as_deref(), std::io::stderr().is_terminal());

    let cfg = OverlayConfig::load_from(args.config.as_deref())?;
    let orientation = Orientation::from_exif(args.orientation)?;
    let mut style = cfg.overlay.still_stroke();
    if let Some(width) = args.stroke_width {
        if !width.is_finite() || width <= 0.0 {
            bail!("--stroke-width must be greater than zero");
        }
        style.width = width;
    }

    let frame = {
        let _stage = ui.stage("load image");
        let decoded = image::open(&args.image)
            .with_context(|| format!("decode image {}", args.image.display()))?;
        Frame::from_image(0, orientation, decoded.into_rgb8())?
    };

    let registry = cfg.detector.build_registry()?;
    let annotated = {
        let mut stage = ui.stage("detect");
        let annotated = annotate_still(
            &registry,
            &frame,
            cfg.detector.nms_threshold,
            style,
            cfg.overlay.clamp,
        )?;
        stage.note(format!("{} detection(s)", annotated.detections.len()));
        annotated
    };

    {
        let _stage = ui.stage("write overlay");
        annotated
            .image
            .save(&args.out)
            .with_context(|| format!("writing overlay to {}", args.out.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&annotated.detections)?);
        return Ok(());
    }

    let (width, height) = frame.display_size();
    println!("overlay summary:");
    println!("  image: {} ({}x{} upright)", args.image.display(), width, height);
    println!("  backend: {}", cfg.detector.backend);
    println!("  detections: {}", annotated.detections.len());
    for (det, element) in annotated.detections.iter().zip(&annotated.elements) {
        println!(
            "    {} {:.2} at ({:.0}, {:.0}) {:.0}x{:.0}",
            det.label,
            det.confidence,
            element.rect.x,
            element.rect.y,
            element.rect.width,
            element.rect.height
        );
    }
    println!("  output: {}", args.out.display());
    Ok(())
}
