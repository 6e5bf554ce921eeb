use std::io::Write;
use std::path::PathBuf;

use ar_frame_sync::config::SessionConfig;
use ar_frame_sync::io::object_to_json;
use ar_frame_sync::marker::MarkerDatabase;
use ar_frame_sync::replay::{ScriptedEngine, SessionScript};
use ar_frame_sync::visualization::log_snapshot;
use ar_frame_sync::{FrameSync, TickOutcome};
use clap::Parser;
use indicatif::ProgressBar;

#[derive(Parser)]
#[command(version, about, author)]
struct ReplayCli {
    /// path to a session script (JSON)
    script: PathBuf,

    /// session config (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// directory of reference images, enables marker recognition
    #[arg(short, long)]
    markers: Option<PathBuf>,

    /// write the final snapshot here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// save a rerun recording here
    #[arg(long)]
    rerun: Option<PathBuf>,

    /// hit test at this screen pixel after the last tick
    #[arg(long, num_args = 2, value_names = ["X", "Y"])]
    hit: Option<Vec<f32>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
    let cli = ReplayCli::parse();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = &cli.markers {
        config.enable_augmented_images = true;
        config.marker_directory = dir.clone();
    }
    let database = if config.enable_augmented_images {
        Some(MarkerDatabase::from_dir(&config.marker_directory)?)
    } else {
        None
    };

    let script = SessionScript::load(&cli.script)?;
    let frame_num = script.frames.len();
    log::info!("replaying {} frames from {}", frame_num, cli.script.display());

    let recording = match &cli.rerun {
        Some(path) => Some(rerun::RecordingStreamBuilder::new("ar-frame-sync").save(path)?),
        None => None,
    };

    let mut sync = FrameSync::with_database(config, database)?;
    sync.attach_engine(ScriptedEngine::new(script));

    let (mut tracked, mut lost, mut failed) = (0, 0, 0);
    let pb = ProgressBar::new(frame_num as u64);
    for _ in 0..frame_num {
        match sync.tick() {
            TickOutcome::Tracked => tracked += 1,
            TickOutcome::Lost => lost += 1,
            TickOutcome::Failed(_) => failed += 1,
            TickOutcome::NoSession => {}
        }
        sync.default_projection_matrix();
        if sync.take_texture_uv_dirty() {
            log::debug!("texture uv changed: {:?}", sync.texture_uv());
        }
        if let Some(recording) = &recording {
            log_snapshot(recording, "world", &sync.snapshot())?;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    log::info!(
        "{} tracked, {} lost, {} failed; {} planes, {} markers tracking",
        tracked,
        lost,
        failed,
        sync.planes().len(),
        sync.marker_table().map(|t| t.tracked().count()).unwrap_or(0)
    );
    for image in sync.augmented_images().iter().filter(|i| i.is_tracking) {
        log::info!(
            "  marker {} ({}): {:.3} x {:.3}",
            image.index,
            image.name.as_deref().unwrap_or("?"),
            image.width,
            image.height
        );
    }

    if let Some(xy) = &cli.hit {
        match sync.hit_pose(xy[0], xy[1]) {
            Some(hit) => log::info!("hit at ({}, {}): distance {:.3}", xy[0], xy[1], hit.distance),
            None => log::info!("no hit at ({}, {})", xy[0], xy[1]),
        }
    }

    if let Some(output) = &cli.output {
        object_to_json(output, &sync.snapshot())?;
        log::info!("snapshot written to {}", output.display());
    }
    Ok(())
}
