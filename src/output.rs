use crate::error::Error;
use crate::statistics::{self, EnergyUnit};
use crate::system::Network;

use csv::Writer;
use serde;
use std::fs;
use std::path::Path;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn timestamps(network: &Network) -> Vec<String> {
    network
        .snapshots
        .timestamps()
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .collect()
}

#[derive(serde::Serialize)]
struct GeneratorDispatchOutput<'a> {
    snapshot: usize,
    timestamp: &'a str,
    generator: &'a str,
    bus: &'a str,
    carrier: &'a str,
    p_mw: f64,
}

fn write_generators_dispatch(
    network: &Network,
    path: &Path,
) -> Result<(), Error> {
    let Some(dispatch) = network.dispatch() else {
        return Ok(());
    };
    let stamps = timestamps(network);
    let mut wtr = Writer::from_path(path.join("dispatch_generators.csv"))?;
    for g in network.generators.iter() {
        for (t, stamp) in stamps.iter().enumerate() {
            wtr.serialize(GeneratorDispatchOutput {
                snapshot: t,
                timestamp: stamp,
                generator: &g.name,
                bus: &network.buses[g.bus_id].name,
                carrier: &g.carrier,
                p_mw: dispatch.generator_p[g.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct StorageDispatchOutput<'a> {
    snapshot: usize,
    timestamp: &'a str,
    storage_unit: &'a str,
    dispatch_mw: f64,
    store_mw: f64,
    /// dispatch minus store
    p_mw: f64,
    state_of_charge_mwh: f64,
}

fn write_storage_dispatch(network: &Network, path: &Path) -> Result<(), Error> {
    let Some(dispatch) = network.dispatch() else {
        return Ok(());
    };
    let stamps = timestamps(network);
    let mut wtr = Writer::from_path(path.join("dispatch_storage.csv"))?;
    for s in network.storage_units.iter() {
        for (t, stamp) in stamps.iter().enumerate() {
            wtr.serialize(StorageDispatchOutput {
                snapshot: t,
                timestamp: stamp,
                storage_unit: &s.name,
                dispatch_mw: dispatch.storage_dispatch[s.id][t],
                store_mw: dispatch.storage_store[s.id][t],
                p_mw: dispatch.storage_net(s.id, t),
                state_of_charge_mwh: dispatch.state_of_charge[s.id][t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct LineFlowOutput<'a> {
    snapshot: usize,
    timestamp: &'a str,
    line: &'a str,
    flow_mw: f64,
    s_nom_mw: f64,
}

fn write_lines_flows(network: &Network, path: &Path) -> Result<(), Error> {
    let Some(dispatch) = network.dispatch() else {
        return Ok(());
    };
    let stamps = timestamps(network);
    let mut wtr = Writer::from_path(path.join("flows_lines.csv"))?;
    for l in network.lines.iter() {
        for (t, stamp) in stamps.iter().enumerate() {
            wtr.serialize(LineFlowOutput {
                snapshot: t,
                timestamp: stamp,
                line: &l.name,
                flow_mw: dispatch.line_flow[l.id][t],
                s_nom_mw: l.s_nom,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct LoadOutput<'a> {
    snapshot: usize,
    timestamp: &'a str,
    load: &'a str,
    bus: &'a str,
    p_mw: f64,
}

fn write_loads(network: &Network, path: &Path) -> Result<(), Error> {
    let stamps = timestamps(network);
    let mut wtr = Writer::from_path(path.join("loads.csv"))?;
    for l in network.loads.iter() {
        for (t, stamp) in stamps.iter().enumerate() {
            wtr.serialize(LoadOutput {
                snapshot: t,
                timestamp: stamp,
                load: &l.name,
                bus: &network.buses[l.bus_id].name,
                p_mw: l.p_set[t],
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn write_generation_summary(
    network: &Network,
    path: &Path,
) -> Result<(), Error> {
    let mut wtr = Writer::from_path(path.join("generation_summary.csv"))?;
    for generation in statistics::generation_summary(network) {
        wtr.serialize(generation)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct MonthlyGenerationOutput<'a> {
    month: &'a str,
    carrier: &'a str,
    energy: f64,
    unit: &'a str,
}

fn write_monthly_generation(
    network: &Network,
    path: &Path,
    unit: EnergyUnit,
) -> Result<(), Error> {
    let mut wtr = Writer::from_path(path.join("monthly_generation.csv"))?;
    for month in statistics::monthly_generation(network, unit).iter() {
        for (carrier, energy) in month.values.iter() {
            wtr.serialize(MonthlyGenerationOutput {
                month: &month.month,
                carrier,
                energy: *energy,
                unit: unit.label(),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the time series and summaries of `network` into `path`. Only
/// the loads are written for a network that was not solved.
pub fn generate_outputs(network: &Network, path: &str) -> Result<(), Error> {
    let root = Path::new(path);
    fs::create_dir_all(root)?;
    write_loads(network, root)?;
    if network.dispatch().is_some() {
        write_generators_dispatch(network, root)?;
        write_storage_dispatch(network, root)?;
        write_lines_flows(network, root)?;
        write_generation_summary(network, root)?;
        write_monthly_generation(network, root, EnergyUnit::GWh)?;
    }
    info!(path, "outputs written");
    Ok(())
}
