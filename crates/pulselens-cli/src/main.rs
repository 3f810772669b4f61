use std::f32::consts::PI;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulselens_signals::{AdaptiveCalibrator, Frame, PipelineConfig, PpgProcessor};

#[derive(Parser)]
#[command(name = "pulselens", about = "Fingertip PPG vitals from recorded camera frames")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a raw RGBA frame dump (frames back to back) and print one JSON record per frame
    Replay {
        frames: PathBuf,
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        #[arg(long, default_value_t = 30.0)]
        fps: f32,
        /// Pipeline configuration (TOML); PULSELENS_* variables override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Calibration history to start from (JSON)
        #[arg(long)]
        calibration_in: Option<PathBuf>,
        /// Where to write the calibration history afterwards (JSON)
        #[arg(long)]
        calibration_out: Option<PathBuf>,
    },
    /// Run a synthetic fingertip pulse through the pipeline
    Synth {
        #[arg(long, default_value_t = 20.0)]
        seconds: f32,
        #[arg(long, default_value_t = 72.0)]
        bpm: f32,
        #[arg(long, default_value_t = 30.0)]
        fps: f32,
        /// Print only the final record
        #[arg(long)]
        summary: bool,
    },
    /// Print the default configuration as TOML, or write it to a file
    Config { out: Option<PathBuf> },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => PipelineConfig::from_file_with_env(path)?,
        None => {
            let mut config = PipelineConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Replay {
            frames,
            width,
            height,
            fps,
            config,
            calibration_in,
            calibration_out,
        } => {
            if fps <= 0.0 {
                return Err("fps must be positive".into());
            }
            let config = load_config(config.as_ref())?;
            let mut processor = PpgProcessor::with_config(config.clone())?;

            if let Some(path) = calibration_in {
                let json = fs::read_to_string(&path)?;
                let restored = AdaptiveCalibrator::from_json(config.calibration.clone(), &json)?;
                processor.calibrator_mut().restore(restored.snapshot());
            }

            let bytes = fs::read(&frames)?;
            let frame_len = width * height * 4;
            if frame_len == 0 {
                return Err("width and height must be non-zero".into());
            }
            if bytes.len() % frame_len != 0 {
                log::warn!(
                    "{} trailing bytes ignored",
                    bytes.len() % frame_len
                );
            }

            for (i, chunk) in bytes.chunks_exact(frame_len).enumerate() {
                let frame = Frame::new(width, height, chunk)?;
                let timestamp_ms = (i as f32 * 1000.0 / fps).round() as i64;
                let record = processor.process_frame(&frame, timestamp_ms);
                println!("{}", serde_json::to_string(&record)?);
            }

            if let Some(path) = calibration_out {
                fs::write(&path, processor.calibrator().to_json()?)?;
                log::info!("calibration history written to {}", path.display());
            }
        }
        Commands::Synth {
            seconds,
            bpm,
            fps,
            summary,
        } => {
            if fps <= 0.0 {
                return Err("fps must be positive".into());
            }
            let mut config = load_config(None)?;
            config.sample_rate = fps;
            config.peaks.sample_rate = fps;
            config.wavelet.sample_rate = fps;
            let mut processor = PpgProcessor::with_config(config)?;

            let (width, height) = (16, 16);
            let frames = (seconds * fps) as usize;
            let mut last = None;
            for i in 0..frames {
                let t = i as f32 / fps;
                let red = 190.0 + 6.0 * (2.0 * PI * bpm / 60.0 * t).sin();
                let data = synthetic_frame(width, height, red);
                let frame = Frame::new(width, height, &data)?;
                let record = processor.process_frame(&frame, (t * 1000.0).round() as i64);
                if !summary {
                    println!("{}", serde_json::to_string(&record)?);
                }
                last = Some(record);
            }

            if let (true, Some(record)) = (summary, last) {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Commands::Config { out } => {
            let config = PipelineConfig::default();
            match out {
                Some(path) => {
                    config.save_to_file(&path)?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{}", config.to_toml_string()?),
            }
        }
    }
    Ok(())
}

/// Fingertip-coloured frame with mean red `red`, dithered across pixels.
fn synthetic_frame(width: usize, height: usize, red: f32) -> Vec<u8> {
    let pixels = width * height;
    let mut data = Vec::with_capacity(pixels * 4);
    for i in 0..pixels {
        let dither = (i as f32 + 0.5) / pixels as f32 - 0.5;
        let r = (red + dither).round().clamp(0.0, 255.0) as u8;
        data.extend_from_slice(&[r, 40, 40, 255]);
    }
    data
}
