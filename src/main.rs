use snow_mpm::{Scene, SimulationParameters, SimulationStatistics, Simulator};

use std::path::PathBuf;

use eyre::WrapErr;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
#[structopt(name = "snow_mpm")]
struct Opt {
    /// Index of the built-in scene to simulate
    #[structopt(short, long, default_value = "7")]
    scene: usize,
    /// Total number of steps to run
    #[structopt(long, default_value = "600")]
    steps: usize,
    /// Number of steps between two dumped frames
    #[structopt(long, default_value = "1")]
    steps_per_frame: usize,
    /// JSON file overriding the default simulation parameters
    #[structopt(long, parse(from_os_str))]
    settings: Option<PathBuf>,
    /// Directory the frames are written to, one MessagePack file per frame
    #[structopt(short, long, parse(from_os_str))]
    output_dir: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opt = Opt::from_args();

    let params = match &opt.settings {
        Some(path) => std::fs::read(path)
            .wrap_err_with(|| format!("Failed to read JSON settings file: {:?}", path))
            .and_then(|json| {
                serde_json::from_slice::<SimulationParameters>(&json)
                    .wrap_err("Serde failed to deserialize JSON.")
            })?,
        None => SimulationParameters::default(),
    };

    if opt.steps_per_frame == 0 {
        return Err(eyre::eyre!("--steps-per-frame must be at least 1"));
    }

    if let Some(dir) = &opt.output_dir {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create output directory: {:?}", dir))?;
    }

    let scene = Scene::preset(opt.scene)?;
    let mut sim = Simulator::new(&scene, params)?;

    let frames = opt.steps / opt.steps_per_frame;
    for frame in 0..frames {
        for _ in 0..opt.steps_per_frame {
            sim.step()
                .wrap_err_with(|| format!("Simulation failed during frame {}", frame))?;
        }

        tracing::debug!(
            frame,
            time = sim.total_time(),
            energy = sim.total_energy(),
            volume = sim.total_volume(),
            "frame statistics"
        );

        if let Some(dir) = &opt.output_dir {
            let path = dir.join(format!("{:04}.dat", frame));
            let mut writer = std::fs::File::create(&path)
                .wrap_err_with(|| format!("Failed to create frame file: {:?}", path))?;
            rmp_serde::encode::write(&mut writer, &sim.snapshot())?;
        }
    }

    tracing::info!(
        steps = sim.steps(),
        time = sim.total_time(),
        mass = sim.total_mass(),
        momentum = ?sim.total_linear_momentum(),
        angular_momentum = ?sim.total_angular_momentum(),
        energy = sim.total_energy(),
        volume = sim.total_volume(),
        "finished \"{}\"",
        scene.description()
    );

    Ok(())
}
