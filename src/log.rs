use crate::statistics::{
    CarrierGeneration, CostSummary, EmissionsSummary, EnergyUnit, MonthlyEnergy,
    YearlyStatistics,
};
use crate::system::Network;
use std::time::Duration;

pub fn show_greeting() {
    println!("\n# gridmix: regional power dispatch");
}

pub fn input_reading_line(path: &str) {
    println!("\nReading input files from '{path}'");
}

pub fn scenario_line(name: &str) {
    println!("\n## Scenario: {name}");
}

/// Helper function for displaying the topology of a built network
pub fn network_summary(network: &Network) {
    println!("\n# Network: {}", network.name);
    println!("- Snapshots: {}", network.snapshots.len());
    println!("- Buses: {}", network.meta.buses_count);
    println!("- Generators: {}", network.meta.generators_count);
    println!("- Loads: {}", network.meta.loads_count);
    println!("- Storage units: {}", network.meta.storage_units_count);
    println!("- Lines: {}", network.meta.lines_count);

    println!("\nInstalled capacity (GW):");
    for (carrier, mw) in network.capacity_by_carrier().iter() {
        println!("{0: >14} | {1: >10.2}", carrier, mw / 1000.0);
    }

    let load: Vec<f64> = (0..network.snapshots.len())
        .map(|t| network.total_load_at(t))
        .collect();
    let peak = load.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = load.iter().cloned().fold(f64::INFINITY, f64::min);
    println!(
        "\nLoad: peak {:.2} GW, min {:.2} GW, total {:.2} GWh",
        peak / 1000.0,
        min / 1000.0,
        network.total_demand() / 1000.0
    );
}

pub fn solving_line(solver: &str) {
    println!("\nSolving dispatch with '{solver}'");
}

pub fn skipped_solve_line() {
    println!("\nSolve disabled, inspecting topology only");
}

/// Helper function for displaying the generation table
pub fn generation_table(generation: &[CarrierGeneration]) {
    println!("\n# Generation");
    println!(
        "{0: ^14} | {1: ^14} | {2: ^12} | {3: ^8}",
        "carrier", "energy (GWh)", "peak (GW)", "CF"
    );
    println!("-------------------------------------------------------------");
    for g in generation.iter() {
        println!(
            "{0: >14} | {1: >14.2} | {2: >12.2} | {3: >8.3}",
            g.carrier,
            g.total_mwh / 1000.0,
            g.peak_mw / 1000.0,
            g.capacity_factor
        );
    }
}

pub fn emissions(summary: &EmissionsSummary) {
    println!("\n# Emissions");
    println!("- Total CO2: {:.2} kt", summary.total_tonnes / 1000.0);
    println!("- Intensity: {:.1} kg/MWh", summary.intensity_kg_per_mwh);
}

pub fn costs(summary: Option<&CostSummary>) {
    println!("\n# Costs");
    match summary {
        Some(c) => {
            println!("- Total cost: {:.2}", c.total_cost);
            println!("- Average cost: {:.2} /MWh", c.average_cost);
        }
        None => println!("- No served demand"),
    }
}

/// Helper function for displaying the annualized statistics
pub fn yearly_statistics(stats: &YearlyStatistics) {
    println!("\n# Yearly statistics ({} h simulated)", stats.hours_simulated);
    println!("- Generation: {:.2} TWh", stats.total_generation_mwh / 1e6);
    println!("- Demand: {:.2} TWh", stats.total_demand_mwh / 1e6);
    println!(
        "- Peak / min demand: {:.2} / {:.2} GW",
        stats.peak_demand_mw / 1000.0,
        stats.min_demand_mw / 1000.0
    );
    println!("- CO2: {:.2} Mt", stats.total_emissions_tonnes / 1e6);
    println!("- Intensity: {:.1} kg/MWh", stats.emission_intensity_kg_per_mwh);
    println!("{0: ^14} | {1: ^8} | {2: ^8}", "carrier", "mix (%)", "CF");
    for (carrier, share) in stats.generation_mix_percent.iter() {
        let cf = stats.capacity_factors.get(carrier).copied().unwrap_or(0.0);
        println!("{0: >14} | {1: >8.2} | {2: >8.3}", carrier, share, cf);
    }
}

/// Helper function for displaying generation and demand per month
pub fn monthly_energy(
    generation: &[MonthlyEnergy],
    demand: &[MonthlyEnergy],
    unit: EnergyUnit,
) {
    println!("\n# Monthly energy ({})", unit.label());
    println!("{0: ^8} | {1: ^12} | {2: ^12}", "month", "generation", "demand");
    for (g, d) in generation.iter().zip(demand.iter()) {
        let generated: f64 = g.values.values().sum();
        let demanded: f64 = d.values.values().sum();
        println!(
            "{0: >8} | {1: >12.3} | {2: >12.3}",
            g.month, generated, demanded
        );
    }
}

pub fn output_generation_line(path: &str) {
    println!("\nWriting outputs to '{path}'");
}

pub fn show_farewell(time: Duration) {
    println!(
        "\nTotal running time: {:.2} s",
        time.as_millis() as f64 / 1000.0
    )
}
