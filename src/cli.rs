// ============================================================================
// RasterPad CLI: headless fill / crop / export via command-line arguments
// ============================================================================
//
// Usage examples:
//   rasterpad --input photo.png --fill 10,10 --color "#ff0000" --output out.png
//   rasterpad --width 64 --height 64 --background "#fff" --fill 0,0 --data-url image/png
//   rasterpad -i scan.png --clip 0,0,100,100 --fill 5,5 --tolerance 40 -o out.rpx
//   rasterpad -i sprite.png --crop -o trimmed.bmp
//
// Everything runs synchronously on the current thread.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::Rect;
use crate::components::colors::parse_hex;
use crate::config::EngineConfig;
use crate::error::{CanvasError, Result};
use crate::io;
use crate::manager::CanvasManager;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RasterPad headless image processor.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rasterpad",
    about = "RasterPad headless fill / crop / export tool",
    long_about = "Load an image (or start from a blank canvas), apply tolerance flood\n\
                  fills, optionally crop, then export as PNG, JPEG, BMP, a raw .rpx\n\
                  pixel dump, or a base64 data URL.\n\n\
                  Example:\n  \
                  rasterpad --input photo.png --fill 10,10 --color \"#ff0000\" --output out.png"
)]
pub struct CliArgs {
    /// Input image. When omitted a blank canvas of --width x --height is used.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Width of the blank canvas.
    #[arg(long, default_value_t = 256)]
    pub width: u32,

    /// Height of the blank canvas.
    #[arg(long, default_value_t = 256)]
    pub height: u32,

    /// Background of the blank canvas (#rgb, #rrggbb or #rrggbbaa).
    #[arg(long, default_value = "#00000000")]
    pub background: String,

    /// Restrict fills to a region: x,y,w,h.
    #[arg(long, value_name = "X,Y,W,H")]
    pub clip: Option<String>,

    /// Flood fill seeded at x,y. May be repeated.
    #[arg(long, value_name = "X,Y")]
    pub fill: Vec<String>,

    /// Fill colour.
    #[arg(short, long, default_value = "#000000")]
    pub color: String,

    /// Per-channel fill tolerance (0–255). Defaults to the config value.
    #[arg(short, long)]
    pub tolerance: Option<i32>,

    /// Global fill alpha (0–1).
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f32,

    /// Crop to the painted (non-transparent) pixels before export.
    #[arg(long)]
    pub crop: bool,

    /// Output file; format from the extension: png, jpg, bmp, rpx.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the result as a data URL of this mime type (image/png, image/jpeg, image/bmp).
    #[arg(long, value_name = "MIME")]
    pub data_url: Option<String>,

    /// Engine config file (key=value). Defaults to the per-user config.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug-level logging and timing output.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match execute(&args) {
        Ok(report) => {
            if let Some(url) = &report.data_url {
                println!("{}", url);
            }
            if args.verbose {
                for line in &report.notes {
                    eprintln!("  {}", line);
                }
                eprintln!("  done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("cli failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// What a CLI run produced.
#[derive(Debug, Default)]
pub struct CliReport {
    pub width: u32,
    pub height: u32,
    pub filled_pixels: usize,
    pub data_url: Option<String>,
    pub notes: Vec<String>,
}

/// Do the work of [`run`] without touching stdout.
pub fn execute(args: &CliArgs) -> Result<CliReport> {
    if args.output.is_none() && args.data_url.is_none() {
        return Err(CanvasError::Configuration("nothing to do: pass --output and/or --data-url".into()));
    }

    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load(),
    };

    let mut manager = match &args.input {
        Some(path) => CanvasManager::from_image(io::load_image(path)?, config)?,
        None => {
            let bg = parse_color(&args.background)?;
            let mut m = CanvasManager::new(args.width, args.height, config)?;
            m.new_image(args.width, args.height, bg);
            m
        }
    };

    let mut report = CliReport::default();
    manager.set_color_hex(&args.color)?;
    manager.set_alpha(args.alpha);
    if let Some(t) = args.tolerance {
        manager.set_tolerance(t);
    }
    if let Some(spec) = &args.clip {
        let rect = parse_rect(spec)?;
        if manager.set_clip(rect).is_none() {
            report.notes.push(format!("clip {} misses the canvas, ignored", spec));
        }
    }

    for spec in &args.fill {
        let (x, y) = parse_point(spec)?;
        let outcome = manager.fill(x, y)?;
        report.filled_pixels += outcome.pixels;
        report.notes.push(format!("fill at {},{}: {} px", x, y, outcome.pixels));
    }

    if args.crop && !manager.crop_to_drawn() {
        report.notes.push("crop skipped: canvas is fully transparent".into());
    }

    report.width = manager.width();
    report.height = manager.height();

    if let Some(path) = &args.output {
        io::save_image(manager.surface().base(), path)?;
        report.notes.push(format!("wrote {}", path.display()));
    }
    if let Some(mime) = &args.data_url {
        report.data_url = Some(manager.to_data_url(mime)?);
    }
    Ok(report)
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

fn parse_color(s: &str) -> Result<image::Rgba<u8>> {
    parse_hex(s).ok_or_else(|| CanvasError::Configuration(format!("bad colour '{}'", s)))
}

fn parse_ints(s: &str, n: usize) -> Result<Vec<i32>> {
    let parts: std::result::Result<Vec<i32>, _> = s.split(',').map(|p| p.trim().parse::<i32>()).collect();
    match parts {
        Ok(v) if v.len() == n => Ok(v),
        _ => Err(CanvasError::Configuration(format!("expected {} comma-separated integers, got '{}'", n, s))),
    }
}

/// `x,y`
pub fn parse_point(s: &str) -> Result<(i32, i32)> {
    let v = parse_ints(s, 2)?;
    Ok((v[0], v[1]))
}

/// `x,y,w,h`
pub fn parse_rect(s: &str) -> Result<Rect> {
    let v = parse_ints(s, 4)?;
    Ok(Rect::new(v[0], v[1], v[2], v[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["rasterpad"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn point_and_rect_parsing() {
        assert_eq!(parse_point(" 3, -4").unwrap(), (3, -4));
        assert!(parse_point("3").is_err());
        assert!(parse_point("a,b").is_err());
        assert_eq!(parse_rect("1,2,3,4").unwrap(), Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn requires_an_output() {
        assert!(matches!(execute(&args(&[])), Err(CanvasError::Configuration(_))));
    }

    #[test]
    fn blank_canvas_fill_to_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("missing.cfg");
        let a = args(&[
            "--width", "4", "--height", "4", "--background", "#fff", "--fill", "0,0", "--color", "#f00",
            "--data-url", "image/png", "--config", cfg.to_str().unwrap(),
        ]);
        let report = execute(&a).unwrap();
        assert_eq!(report.filled_pixels, 16);
        assert!(report.data_url.unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn bad_mime_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("missing.cfg");
        let a = args(&["--data-url", "image/gif", "--config", cfg.to_str().unwrap()]);
        assert!(matches!(execute(&a), Err(CanvasError::UnsupportedMime(_))));
    }
}
