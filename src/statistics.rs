//! Read-only aggregation of a solved network into generation, emission and
//! cost summaries. Every function returns an empty or neutral result on a
//! network that has not been solved.

use crate::data::HOURS_PER_YEAR;
use crate::system::Network;
use serde::Serialize;
use std::collections::BTreeMap;

/// Display unit for energy totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyUnit {
    #[default]
    MWh,
    GWh,
    TWh,
}

impl EnergyUnit {
    /// How many MWh make one unit.
    pub fn divisor(&self) -> f64 {
        match self {
            EnergyUnit::MWh => 1.0,
            EnergyUnit::GWh => 1e3,
            EnergyUnit::TWh => 1e6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnergyUnit::MWh => "MWh",
            EnergyUnit::GWh => "GWh",
            EnergyUnit::TWh => "TWh",
        }
    }

    pub fn convert(&self, mwh: f64) -> f64 {
        mwh / self.divisor()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierGeneration {
    pub carrier: String,
    pub total_mwh: f64,
    pub peak_mw: f64,
    pub capacity_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmissionsSummary {
    pub by_carrier_tonnes: BTreeMap<String, f64>,
    pub total_tonnes: f64,
    /// kg CO2 per MWh of served demand
    pub intensity_kg_per_mwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostSummary {
    pub total_cost: f64,
    /// per MWh of served demand
    pub average_cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyStatistics {
    pub hours_simulated: usize,
    /// Factor applied to energy and emission totals.
    pub scale: f64,
    pub total_generation_mwh: f64,
    pub total_demand_mwh: f64,
    pub peak_demand_mw: f64,
    pub min_demand_mw: f64,
    pub generation_mix_percent: BTreeMap<String, f64>,
    pub capacity_factors: BTreeMap<String, f64>,
    pub total_emissions_tonnes: f64,
    /// kg CO2 per MWh generated
    pub emission_intensity_kg_per_mwh: f64,
}

/// Energy of one calendar month. Labels carry the year (`2023-07`, not
/// `Jul`), so a horizon crossing New Year keeps its two Januaries apart.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyEnergy {
    pub month: String,
    pub values: BTreeMap<String, f64>,
}

/// Summed dispatch per carrier and snapshot (MW). Empty when unsolved.
fn carrier_series(network: &Network) -> BTreeMap<String, Vec<f64>> {
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let Some(dispatch) = network.dispatch() else {
        return series;
    };
    let n = network.snapshots.len();
    for g in network.generators.iter() {
        let entry = series
            .entry(g.carrier.clone())
            .or_insert_with(|| vec![0.0; n]);
        let output = dispatch.generator_p[g.id].iter();
        for (total, p) in entry.iter_mut().zip(output) {
            *total += p;
        }
    }
    series
}

fn capacity_factor(energy_mwh: f64, capacity_mw: f64, hours: usize) -> f64 {
    if capacity_mw > 0.0 && hours > 0 {
        energy_mwh / (capacity_mw * hours as f64)
    } else {
        0.0
    }
}

pub fn generation_summary(network: &Network) -> Vec<CarrierGeneration> {
    let capacity = network.capacity_by_carrier();
    let hours = network.snapshots.len();
    carrier_series(network)
        .into_iter()
        .map(|(carrier, series)| {
            let total_mwh: f64 = series.iter().sum();
            let peak_mw = series.iter().cloned().fold(0.0, f64::max);
            let capacity_mw = capacity.get(&carrier).copied().unwrap_or(0.0);
            CarrierGeneration {
                capacity_factor: capacity_factor(total_mwh, capacity_mw, hours),
                carrier,
                total_mwh,
                peak_mw,
            }
        })
        .collect()
}

pub fn emissions_summary(network: &Network) -> EmissionsSummary {
    let mut summary = EmissionsSummary::default();
    for generation in generation_summary(network) {
        let tonnes = generation.total_mwh
            * network.co2_emissions(&generation.carrier);
        summary.total_tonnes += tonnes;
        summary.by_carrier_tonnes.insert(generation.carrier, tonnes);
    }
    let demand = network.total_demand();
    if summary.total_tonnes > 0.0 && demand > 0.0 {
        summary.intensity_kg_per_mwh = summary.total_tonnes * 1000.0 / demand;
    }
    summary
}

/// `None` before solving or when nothing was served.
pub fn cost_summary(network: &Network) -> Option<CostSummary> {
    let dispatch = network.dispatch()?;
    let demand = network.total_demand();
    if demand <= 0.0 {
        return None;
    }
    Some(CostSummary {
        total_cost: dispatch.objective,
        average_cost: dispatch.objective / demand,
    })
}

/// Annualized statistics; totals of partial-year runs are scaled by
/// `8760 / n`. `None` before solving.
pub fn yearly_statistics(network: &Network) -> Option<YearlyStatistics> {
    network.dispatch()?;
    let hours = network.snapshots.len();
    let scale = HOURS_PER_YEAR as f64 / hours as f64;

    let generation = generation_summary(network);
    let generation_mwh: f64 = generation.iter().map(|g| g.total_mwh).sum();
    let demand: Vec<f64> =
        (0..hours).map(|t| network.total_load_at(t)).collect();

    let generation_mix_percent = generation
        .iter()
        .map(|g| {
            let share = if generation_mwh > 0.0 {
                100.0 * g.total_mwh / generation_mwh
            } else {
                0.0
            };
            (g.carrier.clone(), share)
        })
        .collect();
    let capacity_factors = generation
        .iter()
        .map(|g| (g.carrier.clone(), g.capacity_factor))
        .collect();

    let emissions = emissions_summary(network);
    let total_generation_mwh = generation_mwh * scale;
    let total_emissions_tonnes = emissions.total_tonnes * scale;
    let emission_intensity_kg_per_mwh = if total_generation_mwh > 0.0 {
        total_emissions_tonnes * 1000.0 / total_generation_mwh
    } else {
        0.0
    };

    Some(YearlyStatistics {
        hours_simulated: hours,
        scale,
        total_generation_mwh,
        total_demand_mwh: demand.iter().sum::<f64>() * scale,
        peak_demand_mw: demand
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max),
        min_demand_mw: demand.iter().cloned().fold(f64::INFINITY, f64::min),
        generation_mix_percent,
        capacity_factors,
        total_emissions_tonnes,
        emission_intensity_kg_per_mwh,
    })
}

fn group_by_month(
    network: &Network,
    series: &BTreeMap<String, Vec<f64>>,
    unit: EnergyUnit,
) -> Vec<MonthlyEnergy> {
    let mut months: Vec<MonthlyEnergy> = vec![];
    for (t, timestamp) in network.snapshots.timestamps().enumerate() {
        let month = timestamp.format("%Y-%m").to_string();
        if months.last().map(|m| m.month != month).unwrap_or(true) {
            months.push(MonthlyEnergy {
                month,
                values: series.keys().map(|k| (k.clone(), 0.0)).collect(),
            });
        }
        if let Some(current) = months.last_mut() {
            for (key, values) in series.iter() {
                if let Some(total) = current.values.get_mut(key) {
                    *total += unit.convert(values[t]);
                }
            }
        }
    }
    months
}

/// Generation per carrier and calendar month. Empty when unsolved.
pub fn monthly_generation(
    network: &Network,
    unit: EnergyUnit,
) -> Vec<MonthlyEnergy> {
    let series = carrier_series(network);
    if series.is_empty() {
        return vec![];
    }
    group_by_month(network, &series, unit)
}

/// Demand per calendar month under the key `"demand"`. The loads are
/// exogenous, so this does not need a solve.
pub fn monthly_demand(
    network: &Network,
    unit: EnergyUnit,
) -> Vec<MonthlyEnergy> {
    let demand: Vec<f64> = (0..network.snapshots.len())
        .map(|t| network.total_load_at(t))
        .collect();
    let series = BTreeMap::from([("demand".to_string(), demand)]);
    group_by_month(network, &series, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, NetworkConfig};
    use crate::data::DataSource;
    use crate::dispatch::solve;
    use crate::highs::HighsSolver;
    use crate::system::{fixtures, Snapshots};
    use approx::assert_relative_eq;

    fn solved_coal_only(n: usize) -> Network {
        let mut network = fixtures::coal_only(n);
        solve(&mut network, &HighsSolver::default()).unwrap();
        network
    }

    fn solved_placeholder(n: usize) -> Network {
        let config = NetworkConfig::new(n, false, false, fixtures::start());
        let mut network = build(&config, &DataSource::placeholder()).unwrap();
        solve(&mut network, &HighsSolver::default()).unwrap();
        network
    }

    #[test]
    fn test_energy_unit_divisors() {
        assert_eq!(EnergyUnit::MWh.convert(2.5e6), 2.5e6);
        assert_eq!(EnergyUnit::GWh.convert(2.5e6), 2.5e3);
        assert_eq!(EnergyUnit::TWh.convert(2.5e6), 2.5);
        assert_eq!(EnergyUnit::TWh.label(), "TWh");
    }

    #[test]
    fn test_coal_only_summaries() {
        let network = solved_coal_only(24);

        let generation = generation_summary(&network);
        assert_eq!(generation.len(), 1);
        assert_eq!(generation[0].carrier, "coal");
        assert_relative_eq!(
            generation[0].total_mwh,
            12_000.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(generation[0].peak_mw, 500.0, max_relative = 1e-9);
        assert_relative_eq!(
            generation[0].capacity_factor,
            0.5,
            max_relative = 1e-9
        );

        let emissions = emissions_summary(&network);
        assert_relative_eq!(
            emissions.total_tonnes,
            10_200.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            emissions.intensity_kg_per_mwh,
            850.0,
            max_relative = 1e-9
        );

        let costs = cost_summary(&network).unwrap();
        assert_relative_eq!(costs.total_cost, 4_200_000.0, max_relative = 1e-9);
        assert_relative_eq!(costs.average_cost, 350.0, max_relative = 1e-9);
    }

    #[test]
    fn test_coal_only_yearly_statistics() {
        let network = solved_coal_only(24);
        let yearly = yearly_statistics(&network).unwrap();
        assert_eq!(yearly.hours_simulated, 24);
        assert_relative_eq!(yearly.scale, 365.0);
        assert_relative_eq!(
            yearly.total_generation_mwh,
            12_000.0 * 365.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            yearly.total_demand_mwh,
            12_000.0 * 365.0,
            max_relative = 1e-9
        );
        assert_eq!(yearly.peak_demand_mw, 500.0);
        assert_eq!(yearly.min_demand_mw, 500.0);
        assert_relative_eq!(
            yearly.capacity_factors["coal"],
            0.5,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            yearly.total_emissions_tonnes,
            10_200.0 * 365.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            yearly.emission_intensity_kg_per_mwh,
            850.0,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_generation_mix_sums_to_one_hundred() {
        let network = solved_placeholder(24);
        let yearly = yearly_statistics(&network).unwrap();
        let total: f64 = yearly.generation_mix_percent.values().sum();
        assert!((total - 100.0).abs() < 0.1, "{total}");
        assert!(yearly.generation_mix_percent.len() > 1);
    }

    #[test]
    fn test_annualization_is_scale_invariant() {
        let day = yearly_statistics(&solved_placeholder(24)).unwrap();
        let two_days = yearly_statistics(&solved_placeholder(48)).unwrap();
        assert_relative_eq!(
            day.total_generation_mwh,
            two_days.total_generation_mwh,
            max_relative = 1e-6
        );
        assert_relative_eq!(
            day.peak_demand_mw,
            two_days.peak_demand_mw,
            max_relative = 1e-12
        );
        for (carrier, cf) in day.capacity_factors.iter() {
            assert_relative_eq!(
                *cf,
                two_days.capacity_factors[carrier],
                epsilon = 1e-6
            );
        }
        assert_relative_eq!(
            day.emission_intensity_kg_per_mwh,
            two_days.emission_intensity_kg_per_mwh,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_unsolved_network_aggregates_to_empty() {
        let network = fixtures::coal_only(24);
        assert!(generation_summary(&network).is_empty());
        assert_eq!(emissions_summary(&network), EmissionsSummary::default());
        assert!(cost_summary(&network).is_none());
        assert!(yearly_statistics(&network).is_none());
        assert!(monthly_generation(&network, EnergyUnit::TWh).is_empty());
    }

    #[test]
    fn test_cost_summary_without_demand() {
        let mut network = fixtures::coal_only(4);
        network.loads[0].p_set = vec![0.0; 4];
        solve(&mut network, &HighsSolver::default()).unwrap();
        assert!(cost_summary(&network).is_none());
        assert_eq!(emissions_summary(&network).intensity_kg_per_mwh, 0.0);
    }

    #[test]
    fn test_monthly_labels_carry_the_year() {
        let mut network = fixtures::coal_only(48);
        let new_years_eve = chrono::NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        network.snapshots = Snapshots::new(new_years_eve, 48);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let months = monthly_generation(&network, EnergyUnit::MWh);
        let labels: Vec<&str> =
            months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["2023-12", "2024-01"]);
        assert_relative_eq!(months[1].values["coal"], 24.0 * 500.0);
    }

    #[test]
    fn test_monthly_grouping_only_lists_present_months() {
        let network = solved_coal_only(24 * 40);
        let months = monthly_generation(&network, EnergyUnit::GWh);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2023-01");
        assert_eq!(months[1].month, "2023-02");
        assert_relative_eq!(
            months[0].values["coal"],
            31.0 * 12.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            months[1].values["coal"],
            9.0 * 12.0,
            max_relative = 1e-9
        );

        let demand = monthly_demand(&network, EnergyUnit::MWh);
        assert_eq!(demand.len(), 2);
        assert_relative_eq!(demand[1].values["demand"], 9.0 * 12_000.0);
    }
}
