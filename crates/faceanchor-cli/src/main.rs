use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceanchor_core::{
    calibrate, DetectionRecord, Engine, PerspectiveCamera, SlotUpdate, VideoSize, ViewportSize,
};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::str::FromStr;

mod config;

#[derive(Parser)]
#[command(name = "faceanchor", about = "Face-tracked overlay placement tools")]
struct Cli {
    /// TOML settings file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the camera calibration for a viewport and video size
    Calibrate {
        /// Viewport size in pixels, e.g. 1920x1080
        #[arg(long)]
        viewport: Size,
        /// Native video size in pixels, e.g. 640x480
        #[arg(long)]
        video: Size,
    },
    /// Replay recorded detections (JSON lines, one array of records per frame)
    Replay {
        /// Detection log to replay
        file: PathBuf,
        #[arg(long)]
        viewport: Size,
        #[arg(long)]
        video: Size,
        /// Number of face slots (overrides FACEANCHOR_MAX_FACES)
        #[arg(long)]
        max_faces: Option<usize>,
    },
    /// Print the effective settings as TOML
    Settings,
}

/// `WIDTHxHEIGHT` pixel size.
#[derive(Debug, Clone, Copy)]
struct Size {
    width: u32,
    height: u32,
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}"));
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl Size {
    fn viewport(self) -> ViewportSize {
        ViewportSize::new(f64::from(self.width), f64::from(self.height))
    }

    fn video(self) -> VideoSize {
        VideoSize::new(self.width, self.height)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Calibrate { viewport, video } => {
            let calibration = calibrate(
                viewport.viewport(),
                video.video(),
                config.settings.camera_min_video_dim_fov,
            )?;
            println!("{}", serde_json::to_string_pretty(&calibration)?);
        }
        Commands::Replay {
            file,
            viewport,
            video,
            max_faces,
        } => {
            let max_faces = max_faces.unwrap_or(config.max_faces);
            replay(&file, viewport, video, max_faces, config)?;
        }
        Commands::Settings => {
            print!("{}", toml::to_string_pretty(&config.settings)?);
        }
    }

    Ok(())
}

fn replay(
    path: &std::path::Path,
    viewport: Size,
    video: Size,
    max_faces: usize,
    config: config::Config,
) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;

    let mut engine = Engine::new(config.settings)?;
    engine.init(
        max_faces,
        video.video(),
        Some(Box::new(|slot: usize, visible: bool| {
            tracing::info!(slot, visible, "detection changed");
        })),
    );

    let mut camera = PerspectiveCamera::default();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0usize;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let detections: Vec<DetectionRecord> = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: bad detection frame", path.display(), index + 1))?;

        let Some(update) = engine.update_camera(viewport.viewport(), &mut camera)? else {
            anyhow::bail!("engine not initialized (max faces must be at least 1)");
        };
        let slots = engine.update(&detections, &update.calibration);

        let frame = serde_json::json!({
            "frame": frames,
            "slots": slots.iter().map(slot_json).collect::<Vec<_>>(),
        });
        writeln!(out, "{frame}")?;
        frames += 1;
    }

    tracing::info!(frames, "replay finished");
    Ok(())
}

fn slot_json(update: &SlotUpdate) -> serde_json::Value {
    let mut value = serde_json::json!({
        "slot": update.slot,
        "visible": update.visible,
        "changed": update.changed,
    });
    match &update.pose {
        Some(Ok(pose)) => {
            value["position"] = serde_json::json!(pose.position.to_array());
            value["rotation"] = serde_json::json!([pose.rotation.x, pose.rotation.y, pose.rotation.z]);
        }
        Some(Err(err)) => {
            value["error"] = serde_json::json!(err.to_string());
        }
        None => {}
    }
    value
}
