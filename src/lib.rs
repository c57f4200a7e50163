pub mod builder;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod highs;
pub mod input;
mod log;
pub mod output;
pub mod profile;
pub mod solver;
pub mod statistics;
pub mod system;
pub mod utils;
use error::Error;
use input::{Config, Input};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use system::Network;
use tracing::{info, warn};

/// Builds the network of one configuration and, unless disabled, solves it.
pub fn run_scenario(input: &Input, config: &Config) -> Result<Network, Error> {
    let network_config = config.network_config()?;
    let source = input.data_source(config);
    let mut network = builder::build(&network_config, &source)?;
    if config.solve {
        let solver = solver::factory(&config.solver, config.solver_options())?;
        dispatch::solve(&mut network, solver.as_ref())?;
    }
    Ok(network)
}

/// Runs independent scenarios in parallel. Results keep the input order.
pub fn run_scenarios(
    input: &Input,
    scenarios: &[(String, Config)],
) -> Vec<Result<Network, Error>> {
    scenarios
        .par_iter()
        .map(|(name, config)| {
            info!(scenario = name.as_str(), "running scenario");
            run_scenario(input, config)
        })
        .collect()
}

fn report(network: &Network) {
    log::network_summary(network);
    if network.dispatch().is_none() {
        log::skipped_solve_line();
        return;
    }
    log::generation_table(&statistics::generation_summary(network));
    log::emissions(&statistics::emissions_summary(network));
    log::costs(statistics::cost_summary(network).as_ref());
    if let Some(yearly) = statistics::yearly_statistics(network) {
        log::yearly_statistics(&yearly);
    }
    let unit = statistics::EnergyUnit::GWh;
    log::monthly_energy(
        &statistics::monthly_generation(network, unit),
        &statistics::monthly_demand(network, unit),
        unit,
    );
}

pub fn run(input_args: &InputArgs) -> Result<(), Error> {
    log::show_greeting();

    let begin = Instant::now();
    let input = Input::build(&input_args.path)?;
    log::input_reading_line(&input_args.path);

    let scenarios = input.scenarios();
    if input.config.solve {
        log::solving_line(&input.config.solver);
    }
    let results = run_scenarios(&input, &scenarios);

    let mut first_failure = None;
    for ((name, _), result) in scenarios.iter().zip(results) {
        if scenarios.len() > 1 {
            log::scenario_line(name);
        }
        match result {
            Ok(network) => {
                report(&network);
                let path = if scenarios.len() > 1 {
                    Path::new(&input_args.path).join(name).display().to_string()
                } else {
                    input_args.path.clone()
                };
                log::output_generation_line(&path);
                if let Err(e) = output::generate_outputs(&network, &path) {
                    warn!(
                        scenario = name.as_str(),
                        "writing outputs failed: {e}"
                    );
                    first_failure.get_or_insert(e);
                }
            }
            Err(e) => {
                warn!(scenario = name.as_str(), "scenario failed: {e}");
                first_failure.get_or_insert(e);
            }
        }
    }

    log::show_farewell(begin.elapsed());

    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub struct InputArgs {
    pub path: String,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = args[1].clone();

        Ok(Self { path })
    }
}
