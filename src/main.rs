use std::process::ExitCode;

use attractor::{AttractorConfig, Simulation, SimulationError};

/// `attractor [config.json] [name=value ...]`
///
/// Settings such as `rho=99.96` or `vertex_size=1024` are applied after the
/// config file.
fn run() -> Result<(), SimulationError> {
    let mut config_path = None;
    let mut settings = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.split_once('=') {
            Some((name, value)) => settings.push((name.to_string(), value.to_string())),
            None => config_path = Some(arg),
        }
    }

    let mut simulation = match config_path {
        Some(path) => {
            log::info!("Loading config from {}", path);
            Simulation::from_config(AttractorConfig::load(&path)?)?
        }
        None => Simulation::new(),
    };
    for (name, value) in &settings {
        simulation = simulation.with_setting(name, value)?;
    }
    simulation.run()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
