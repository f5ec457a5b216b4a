//! vehicle_analysis - detect vehicles in an image or video and report plate,
//! damage, color and brand per vehicle.
//!
//! Image mode analyzes one picture and optionally saves the annotated result.
//! Video mode walks the frames of a file (or a `stub://` source), optionally
//! writes annotated frames as `frame_NNNNNN.png`, and finishes with a timing
//! summary. Ctrl-C stops a video run after the current frame.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vehicle_analysis::config::AnalysisConfig;
use vehicle_analysis::ingest::{FileConfig, FileSource};
use vehicle_analysis::render::{draw_report, overlay_items, CaptionFont};
use vehicle_analysis::{RecognitionReport, VehicleAnalyzer};

#[path = "../ui.rs"]
mod ui;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Image,
    Video,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// What the input is.
    #[arg(value_enum)]
    mode: Mode,
    /// Image or video path (`stub://name?frames=N` for a synthetic video).
    input: String,
    /// Annotated image file (image mode) or frame directory (video mode).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Stop after this many frames; zero or negative means no limit.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    max_frames: i64,
    /// Timing summary path (defaults to the configured report path in video mode).
    #[arg(long, env = "VEHICLE_ANALYSIS_TIMING_REPORT")]
    timing_report: Option<PathBuf>,
    /// Print each report as a JSON line on stdout.
    #[arg(long)]
    json: bool,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::new(
        args.ui,
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    );

    let cfg = {
        let _stage = ui.stage("Load configuration");
        AnalysisConfig::load()?
    };
    let mut analyzer = {
        let _stage = ui.stage("Load detectors");
        let analyzer = VehicleAnalyzer::from_config(&cfg)?;
        analyzer.detectors().warm_up()?;
        analyzer
    };

    let font = CaptionFont::from_settings(&cfg.render)?;
    match &font {
        Some(font) => log::info!("captions enabled ({}px)", font.size()),
        None if args.output.is_some() => {
            log::info!("no caption font configured (render.font); drawing boxes only")
        }
        None => {}
    }

    match args.mode {
        Mode::Image => run_image(&args, &ui, &mut analyzer, font.as_ref())?,
        Mode::Video => run_video(&args, &ui, &mut analyzer, font.as_ref())?,
    }

    let timing_path = match (args.mode, &args.timing_report) {
        (_, Some(path)) => Some(path.clone()),
        (Mode::Video, None) => Some(cfg.analysis.timing_report.clone()),
        (Mode::Image, None) => None,
    };
    if let Some(path) = timing_path {
        analyzer.write_timing_summary(&path)?;
    }
    Ok(())
}

fn run_image(
    args: &Args,
    ui: &ui::Ui,
    analyzer: &mut VehicleAnalyzer,
    font: Option<&CaptionFont>,
) -> Result<()> {
    let mut image = {
        let _stage = ui.stage("Read image");
        image::open(&args.input)
            .with_context(|| format!("failed to read image {}", args.input))?
            .to_rgb8()
    };
    let reports = {
        let _stage = ui.stage("Analyze");
        analyzer.analyze(&image)?
    };
    emit_reports(args.json, 0, &reports)?;
    log::info!("{} vehicle(s) recognized", reports.len());

    if let Some(output) = &args.output {
        let _stage = ui.stage("Write annotated image");
        for report in &reports {
            draw_report(&mut image, report, font);
        }
        image
            .save(output)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    Ok(())
}

fn run_video(
    args: &Args,
    ui: &ui::Ui,
    analyzer: &mut VehicleAnalyzer,
    font: Option<&CaptionFont>,
) -> Result<()> {
    let mut source = {
        let _stage = ui.stage("Open video");
        let mut source = FileSource::new(FileConfig::new(args.input.clone()))?;
        source.connect()?;
        source
    };
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let limit = frame_limit(args.max_frames);
    let progress = ui.frames(limit);
    let mut processed = 0u64;
    let mut skipped = 0u64;

    while running.load(Ordering::SeqCst) && limit.map_or(true, |limit| processed < limit) {
        let Some(mut frame) = source.next_frame()? else {
            break;
        };
        processed += 1;

        let reports = match analyzer.analyze_frame(&frame) {
            Ok(reports) => reports,
            Err(err) => {
                log::error!("skipping frame {}: {:#}", frame.index, err);
                skipped += 1;
                continue;
            }
        };
        emit_reports(args.json, frame.index, &reports)?;

        if let Some(dir) = &args.output {
            for report in &reports {
                draw_report(&mut frame.image, report, font);
            }
            save_frame(dir, frame.index, &frame.image)?;
        }
        progress.frame_done(reports.len());
    }
    progress.finish(processed);

    if !running.load(Ordering::SeqCst) {
        log::info!("interrupted; stopping after {} frame(s)", processed);
    }
    let stats = source.stats();
    log::info!(
        "video {}: {} frame(s) decoded, {} analyzed, {} skipped",
        stats.path,
        stats.frames_decoded,
        processed - skipped,
        skipped
    );
    Ok(())
}

/// `--max-frames` as a frame cap; zero or negative means unlimited.
fn frame_limit(max_frames: i64) -> Option<u64> {
    (max_frames > 0).then_some(max_frames as u64)
}

fn save_frame(dir: &Path, index: u64, image: &image::RgbImage) -> Result<()> {
    let path = dir.join(format!("frame_{:06}.png", index));
    image
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn emit_reports(json: bool, frame: u64, reports: &[RecognitionReport]) -> Result<()> {
    for report in reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            log::info!("frame {}: {}", frame, report);
            for item in overlay_items(report).iter().skip(1) {
                log::debug!("  {:?} {} at {}", item.kind, item.text, item.bbox);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_max_frames_is_unlimited() {
        assert_eq!(frame_limit(-1), None);
        assert_eq!(frame_limit(0), None);
        assert_eq!(frame_limit(1), Some(1));
        assert_eq!(frame_limit(250), Some(250));
    }

    #[test]
    fn max_frames_accepts_negative_values() {
        let args = Args::try_parse_from([
            "vehicle_analysis",
            "video",
            "stub://demo",
            "--max-frames",
            "-1",
        ])
        .unwrap();
        assert_eq!(frame_limit(args.max_frames), None);
        let args = Args::try_parse_from(["vehicle_analysis", "video", "stub://demo"]).unwrap();
        assert_eq!(args.max_frames, -1);
    }
}
