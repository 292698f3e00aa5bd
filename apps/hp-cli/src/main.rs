use clap::{Parser, Subcommand};
use hp_core::{celsius, SensorId, Timestamp};
use hp_hal::MockBackend;
use hp_runtime::{Controller, RuntimeResult};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[derive(Parser)]
#[command(name = "hp-cli")]
#[command(about = "Heating plant controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a plant configuration file
    Validate {
        /// Path to the plant YAML file
        config_path: PathBuf,
    },
    /// Run the control loop against the mock hardware backend
    Run {
        /// Path to the plant YAML file
        config_path: PathBuf,
        /// Stop after this many cycles instead of running forever
        #[arg(long)]
        cycles: Option<u64>,
        /// Override the configured loop period, in seconds
        #[arg(long)]
        period: Option<u64>,
        /// Override the configured state directory
        #[arg(long)]
        state_dir: Option<PathBuf>,
        /// Mock outdoor temperature, in Celsius
        #[arg(long, default_value_t = 5.0)]
        outdoor: f64,
        /// Mock reading for every other sensor, in Celsius
        #[arg(long, default_value_t = 40.0)]
        temp: f64,
    },
}

fn main() -> RuntimeResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            config_path,
            cycles,
            period,
            state_dir,
            outdoor,
            temp,
        } => cmd_run(&config_path, cycles, period, state_dir, outdoor, temp),
    }
}

fn cmd_validate(config_path: &std::path::Path) -> RuntimeResult<()> {
    println!("Validating plant: {}", config_path.display());
    let config = hp_config::load_yaml(config_path)?;
    println!("✓ Configuration '{}' is valid", config.name);
    Ok(())
}

fn cmd_run(
    config_path: &std::path::Path,
    cycles: Option<u64>,
    period: Option<u64>,
    state_dir: Option<PathBuf>,
    outdoor: f64,
    temp: f64,
) -> RuntimeResult<()> {
    let mut config = hp_config::load_yaml(config_path)?;
    if let Some(period) = period {
        config.loop_period_s = period;
    }
    if let Some(dir) = state_dir {
        config.state_dir = Some(dir);
    }

    let mut backend = MockBackend::new();
    for sensor in &config.sensors {
        let reading = if sensor.name == config.building.outdoor_sensor {
            celsius(outdoor)
        } else {
            celsius(temp)
        };
        backend.set_temperature(SensorId::from_index(sensor.channel), reading);
    }

    let period_s = config.loop_period_s;
    let mut controller = Controller::new(&config, Box::new(backend))?;

    match cycles {
        // Finite runs step through simulated time without sleeping.
        Some(cycles) => {
            controller.online(Timestamp::ZERO)?;
            let start = chrono::Local::now().naive_local();
            for cycle in 0..cycles {
                let now = Timestamp::from_secs(period_s * (cycle + 1));
                let wall = start + chrono::Duration::seconds((period_s * cycle) as i64);
                let report = controller.step(now, wall)?;
                match report.heat_request {
                    Some(t) => println!(
                        "cycle {}: heat request {:.1} °C",
                        cycle + 1,
                        t.as_celsius()
                    ),
                    None => println!("cycle {}: no demand", cycle + 1),
                }
                for (name, err) in &report.failures {
                    println!("cycle {}: {} failed: {}", cycle + 1, name, err);
                }
            }
            controller.shutdown(Timestamp::from_secs(period_s * (cycles + 1)))?;
            println!("✓ Completed {} cycles", cycles);
            Ok(())
        }
        None => {
            let stop = AtomicBool::new(false);
            controller.run(&stop)
        }
    }
}
