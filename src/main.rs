//! Head-coupled view application: drives the off-axis camera from face tracking.

use anyhow::{Context, Result};
use clap::Parser;
use head_coupled_view::{
    app::{AppConfig, HeadCoupledApp, ViewerMode},
    calibration::{CalibrationStore, FileStore, MemoryStore},
    camera::PerspectiveCamera,
    config::Config,
    detection::Detector,
    replay::{Recording, ReplayDetector},
};
use log::{debug, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Replay recorded detections instead of using a camera
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Restart the recording when it ends
    #[arg(long = "loop")]
    looping: bool,

    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Stop after this many display refreshes
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Display refresh rate
    #[arg(long)]
    fps: Option<u32>,

    /// Viewport width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// File holding persisted calibration
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Restore factory calibration before starting
    #[arg(long)]
    reset_calibration: bool,

    /// Fixed viewpoint instead of face tracking
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    manual: Option<Vec<f64>>,

    /// Build debug overlay markers for each detection
    #[arg(long)]
    overlay: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Command-line flags take precedence over the configuration file
    fn apply(&self, config: &mut Config) {
        if let Some(cam) = self.cam {
            config.capture.camera_index = cam;
        }
        if let Some(fps) = self.fps {
            config.display.target_fps = fps;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(store) = &self.store {
            config.calibration.store_path = Some(store.clone());
        }
        if let Some([x, y, z]) = self.manual.as_deref() {
            config.manual.enabled = true;
            config.manual.x = *x;
            config.manual.y = *y;
            config.manual.z = *z;
        }
        if self.overlay {
            config.display.debug_overlay = true;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head-coupled view");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if let Some(path) = &args.write_config {
        config.to_file(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let store: Box<dyn CalibrationStore> = match &config.calibration.store_path {
        Some(path) => Box::new(FileStore::open(path)?),
        None => {
            info!("No calibration store configured, calibration is kept in memory");
            Box::new(MemoryStore::default())
        }
    };

    let mut app_config = AppConfig::from_config(&config);
    let (detector, tick_limit) = build_detector(&args, &config, &mut app_config)?;
    let tick_limit = args.ticks.or(tick_limit);

    let mut app = HeadCoupledApp::new(app_config, detector, store)?;
    if args.reset_calibration {
        app.reset()?;
    }
    if let ViewerMode::Manual { x, y, z } = app.config().mode {
        info!("Manual viewpoint ({x}, {y}, {z})");
    }

    let aspect_ratio = app.config().viewport.aspect_ratio();
    let mut camera = PerspectiveCamera::new(50.0, aspect_ratio, 0.1, config.display.far);

    run(&mut app, &mut camera, config.display.target_fps, tick_limit);

    info!(
        "Finished after {} ticks: detection {:?}, tracking {:?}, viewer {:?}",
        app.ticks(),
        app.detection_state(),
        app.tracking_state(),
        app.viewer_position()
    );
    Ok(())
}

/// Pick the detection source; a finite recording also bounds the run
fn build_detector(
    args: &Args,
    config: &Config,
    app_config: &mut AppConfig,
) -> Result<(Option<Box<dyn Detector>>, Option<u64>)> {
    if let Some(path) = &args.replay {
        let recording = Recording::from_file(path)
            .with_context(|| format!("Failed to load recording {}", path.display()))?;
        if recording.capture_size.is_some() {
            app_config.capture_size = recording.capture_size;
        }
        let limit = (!args.looping).then(|| (recording.frames.len() as u64 + 1) * (recording.latency_ticks as u64 + 1));
        let detector: Box<dyn Detector> = Box::new(ReplayDetector::new(recording, args.looping));
        return Ok((Some(detector), limit));
    }

    Ok((live_detector(config)?, None))
}

#[cfg(feature = "webcam")]
fn live_detector(config: &Config) -> Result<Option<Box<dyn Detector>>> {
    let detector: Box<dyn Detector> = Box::new(head_coupled_view::webcam::spawn_detector(&config.models, &config.capture)?);
    Ok(Some(detector))
}

#[cfg(not(feature = "webcam"))]
fn live_detector(_config: &Config) -> Result<Option<Box<dyn Detector>>> {
    log::warn!("Built without webcam support; pass --replay to track recorded faces");
    Ok(None)
}

fn run(app: &mut HeadCoupledApp, camera: &mut PerspectiveCamera, fps: u32, tick_limit: Option<u64>) {
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut next_frame = Instant::now();
    let mut last_report = Instant::now();

    info!("Entering refresh loop at {fps} fps");
    while tick_limit.map_or(true, |limit| app.ticks() < limit) {
        let state = app.tick(camera);
        debug!(
            "Tick {}: position {:?}, near {:.4}, fov {:.2}",
            app.ticks(),
            state.position,
            state.near,
            state.fov
        );
        if let Some(overlay) = app.overlay() {
            debug!("Overlay: {overlay:?}");
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            info!(
                "Eye at ({:.3}, {:.3}, {:.3}), fov {:.2}",
                state.position.x, state.position.y, state.position.z, state.fov
            );
            last_report = Instant::now();
        }

        next_frame += frame_time;
        let now = Instant::now();
        if next_frame > now {
            std::thread::sleep(next_frame - now);
        } else {
            next_frame = now;
        }
    }
}
