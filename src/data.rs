//! Built-in policy tables and estimates for the modelled grid, and the
//! [`DataSource`] that tells the builder whether any of them were replaced
//! by external data.

use crate::profile;
use std::collections::BTreeMap;
use tracing::warn;

/// Per-carrier scalar values, keyed by carrier name.
pub type CarrierTable = BTreeMap<String, f64>;

pub const MW_PER_GW: f64 = 1000.0;
pub const MWH_PER_TWH: f64 = 1e6;
pub const HOURS_PER_YEAR: usize = 8760;

pub const BUS_VOLTAGE_KV: f64 = 500.0;

/// Installed capacity estimates (GW), used when no capacity data is loaded.
const INSTALLED_CAPACITY_GW: [(&str, f64); 7] = [
    ("coal", 65.0),
    ("gas", 25.0),
    ("nuclear", 16.0),
    ("hydro", 12.0),
    ("solar", 35.0),
    ("wind", 12.0),
    ("biomass", 3.0),
];

/// Marginal costs (currency/MWh). Covers the split carriers that external
/// capacity data may introduce.
const MARGINAL_COSTS: [(&str, f64); 12] = [
    ("coal", 350.0),
    ("gas", 550.0),
    ("CCGT", 500.0),
    ("OCGT", 650.0),
    ("nuclear", 50.0),
    ("hydro", 20.0),
    ("PHS", 15.0),
    ("solar", 0.0),
    ("wind", 0.0),
    ("onwind", 0.0),
    ("offwind", 0.0),
    ("biomass", 200.0),
];

/// CO2 emission factors (t/MWh). Biomass counts as carbon neutral.
const CO2_EMISSIONS_T_MWH: [(&str, f64); 12] = [
    ("coal", 0.85),
    ("gas", 0.40),
    ("CCGT", 0.37),
    ("OCGT", 0.50),
    ("nuclear", 0.0),
    ("hydro", 0.0),
    ("PHS", 0.0),
    ("solar", 0.0),
    ("wind", 0.0),
    ("onwind", 0.0),
    ("offwind", 0.0),
    ("biomass", 0.0),
];

pub const DEFAULT_ANNUAL_DEMAND_TWH: f64 = 800.0;

/// Shares of the annual demand per consumption sector.
pub const SECTOR_SHARES: [(&str, f64); 5] = [
    ("industrial", 0.65),
    ("commercial", 0.175),
    ("residential", 0.125),
    ("transport", 0.03),
    ("agriculture", 0.02),
];

/// Normalized demand shape of a typical summer day, from 00:00 to 23:00.
pub const LOAD_PROFILE: [f64; 24] = [
    0.70, 0.65, 0.62, 0.60, 0.60, 0.62, //
    0.68, 0.78, 0.88, 0.95, 0.98, 1.00, //
    0.98, 0.95, 0.96, 0.98, 1.00, 0.98, //
    0.95, 0.92, 0.88, 0.85, 0.80, 0.75,
];

pub const SOLAR_PROFILE: [f64; 24] = [
    0.00, 0.00, 0.00, 0.00, 0.00, 0.05, //
    0.20, 0.45, 0.70, 0.88, 0.95, 1.00, //
    0.98, 0.92, 0.82, 0.65, 0.40, 0.15, //
    0.02, 0.00, 0.00, 0.00, 0.00, 0.00,
];

pub const WIND_PROFILE: [f64; 24] = [
    0.35, 0.38, 0.40, 0.42, 0.45, 0.48, //
    0.45, 0.40, 0.32, 0.28, 0.25, 0.22, //
    0.20, 0.22, 0.25, 0.30, 0.35, 0.42, //
    0.48, 0.50, 0.48, 0.45, 0.42, 0.38,
];

/// Name of the only region in single-region runs.
pub const SINGLE_REGION: &str = "guangdong";

#[derive(Debug)]
pub struct Region {
    pub name: &'static str,
    pub load_share: f64,
    /// Fraction of each carrier's installed capacity located in the region.
    /// Per carrier these are not normalized across regions.
    pub capacity_shares: &'static [(&'static str, f64)],
}

/// The first region is the transmission hub.
pub const REGIONS: [Region; 4] = [
    Region {
        name: "pearl_river_delta",
        load_share: 0.70,
        capacity_shares: &[
            ("coal", 0.40),
            ("gas", 0.70),
            ("nuclear", 0.60),
            ("solar", 0.50),
            ("wind", 0.30),
            ("hydro", 0.10),
            ("biomass", 0.50),
        ],
    },
    Region {
        name: "east_guangdong",
        load_share: 0.12,
        capacity_shares: &[
            ("coal", 0.20),
            ("gas", 0.10),
            ("nuclear", 0.20),
            ("solar", 0.15),
            ("wind", 0.25),
            ("hydro", 0.10),
            ("biomass", 0.15),
        ],
    },
    Region {
        name: "west_guangdong",
        load_share: 0.10,
        capacity_shares: &[
            ("coal", 0.25),
            ("gas", 0.15),
            ("nuclear", 0.20),
            ("solar", 0.20),
            ("wind", 0.35),
            ("hydro", 0.20),
            ("biomass", 0.20),
        ],
    },
    Region {
        name: "north_guangdong",
        load_share: 0.08,
        capacity_shares: &[
            ("coal", 0.15),
            ("gas", 0.05),
            ("nuclear", 0.00),
            ("solar", 0.15),
            ("wind", 0.10),
            ("hydro", 0.60),
            ("biomass", 0.15),
        ],
    },
];

/// Thermal limits (GW) of the lines from the hub to every other region.
pub const HUB_CONNECTIONS_GW: [(&str, f64); 3] = [
    ("east_guangdong", 15.0),
    ("west_guangdong", 12.0),
    ("north_guangdong", 10.0),
];

pub const LINE_REACTANCE: f64 = 0.01;
pub const LINE_RESISTANCE: f64 = 0.001;

#[derive(Debug)]
pub struct StorageSpec {
    pub name: &'static str,
    pub carrier: &'static str,
    pub p_nom: f64,
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub marginal_cost: f64,
}

pub const STORAGE_UNITS: [StorageSpec; 2] = [
    StorageSpec {
        name: "battery_storage",
        carrier: "battery",
        p_nom: 5000.0,
        max_hours: 4.0,
        efficiency_store: 0.92,
        efficiency_dispatch: 0.92,
        marginal_cost: 5.0,
    },
    StorageSpec {
        name: "pumped_hydro",
        carrier: "pumped_hydro",
        p_nom: 8000.0,
        max_hours: 8.0,
        efficiency_store: 0.85,
        efficiency_dispatch: 0.87,
        marginal_cost: 2.0,
    },
];

#[derive(Debug)]
pub struct ImportSpec {
    pub name: &'static str,
    pub carrier: &'static str,
    pub p_nom: f64,
    pub marginal_cost: f64,
    pub availability: f64,
}

/// Contracted inter-provincial transfer, mostly hydro.
pub const IMPORT_FEED: ImportSpec = ImportSpec {
    name: "west_east_import",
    carrier: "import_hydro",
    p_nom: 50.0 * MW_PER_GW,
    marginal_cost: 280.0,
    availability: 0.8,
};

/// Aggregate carriers of the estimates and the split carriers that
/// supersede them in external capacity data.
const SPLIT_CARRIERS: [(&str, &[&str]); 2] = [
    ("gas", &["CCGT", "OCGT"]),
    ("wind", &["onwind", "offwind"]),
];

fn table(entries: &[(&str, f64)]) -> CarrierTable {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The tables a network is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub installed_capacity_gw: CarrierTable,
    pub marginal_costs: CarrierTable,
    pub co2_emissions: CarrierTable,
    pub annual_demand_twh: f64,
}

impl ModelData {
    /// Built-in estimates.
    pub fn estimates() -> Self {
        Self {
            installed_capacity_gw: table(&INSTALLED_CAPACITY_GW),
            marginal_costs: table(&MARGINAL_COSTS),
            co2_emissions: table(&CO2_EMISSIONS_T_MWH),
            annual_demand_twh: DEFAULT_ANNUAL_DEMAND_TWH,
        }
    }

    /// Replaces the installed capacity of each carrier present in
    /// `capacities`, keeping the estimates of the others. An aggregate
    /// estimate is dropped once any of its split carriers is given, unless
    /// the aggregate itself is given too.
    pub fn apply_capacities(&mut self, capacities: &CarrierTable) {
        for (carrier, gw) in capacities.iter() {
            self.installed_capacity_gw.insert(carrier.clone(), *gw);
        }
        for (aggregate, splits) in SPLIT_CARRIERS.iter() {
            let split = splits.iter().any(|c| capacities.contains_key(*c));
            if split && !capacities.contains_key(*aggregate) {
                self.installed_capacity_gw.remove(*aggregate);
            }
        }
    }

    /// Annual demand per sector (TWh), rounded to whole TWh.
    pub fn sector_demand_twh(&self) -> Vec<(&'static str, f64)> {
        SECTOR_SHARES
            .iter()
            .map(|(sector, share)| {
                (*sector, (self.annual_demand_twh * share).round())
            })
            .collect()
    }
}

impl Default for ModelData {
    fn default() -> Self {
        Self::estimates()
    }
}

/// Where the model tables came from. Threaded explicitly through the
/// builder.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// At least one external dataset was loaded.
    RealData {
        data: ModelData,
        hourly_demand_mw: Option<Vec<f64>>,
    },
    PlaceholderData { data: ModelData },
}

impl DataSource {
    pub fn placeholder() -> Self {
        Self::PlaceholderData {
            data: ModelData::estimates(),
        }
    }

    pub fn model_data(&self) -> &ModelData {
        match self {
            Self::RealData { data, .. } => data,
            Self::PlaceholderData { data } => data,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Self::RealData { .. })
    }

    /// Total hourly demand (MW) for the first `n_snapshots` hours. A real
    /// series that cannot cover the horizon, or holds a negative or
    /// non-finite value within it, is replaced by the synthetic profile.
    pub fn hourly_demand(&self, n_snapshots: usize) -> Vec<f64> {
        if let Self::RealData {
            hourly_demand_mw: Some(series),
            ..
        } = self
        {
            if series.len() < n_snapshots {
                warn!(
                    available = series.len(),
                    requested = n_snapshots,
                    "hourly demand series too short, using synthetic profile"
                );
            } else if let Some(hour) = series[..n_snapshots]
                .iter()
                .position(|d| !d.is_finite() || *d < 0.0)
            {
                warn!(
                    hour,
                    value = series[hour],
                    "invalid hourly demand value, using synthetic profile"
                );
            } else {
                return series[..n_snapshots].to_vec();
            }
        }
        profile::synthetic_demand(
            self.model_data().annual_demand_twh,
            n_snapshots,
        )
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_estimated_carrier_has_a_cost() {
        let data = ModelData::estimates();
        for carrier in data.installed_capacity_gw.keys() {
            assert!(data.marginal_costs.contains_key(carrier), "{carrier}");
        }
    }

    #[test]
    fn test_sector_demand_rounds_to_whole_twh() {
        let data = ModelData::estimates();
        let sectors = data.sector_demand_twh();
        assert_eq!(
            sectors,
            vec![
                ("industrial", 520.0),
                ("commercial", 140.0),
                ("residential", 100.0),
                ("transport", 24.0),
                ("agriculture", 16.0),
            ]
        );
    }

    #[test]
    fn test_apply_capacities_only_replaces_given_carriers() {
        let mut data = ModelData::estimates();
        let mut capacities = CarrierTable::new();
        capacities.insert("coal".to_string(), 70.5);
        data.apply_capacities(&capacities);
        assert_eq!(data.installed_capacity_gw["coal"], 70.5);
        assert_eq!(data.installed_capacity_gw["gas"], 25.0);
        assert_eq!(data.installed_capacity_gw["wind"], 12.0);
    }

    #[test]
    fn test_split_carriers_replace_their_aggregate() {
        let mut data = ModelData::estimates();
        let capacities: CarrierTable = [
            ("CCGT", 20.0),
            ("OCGT", 5.0),
            ("onwind", 8.0),
            ("offwind", 4.0),
        ]
        .iter()
        .map(|(c, gw)| (c.to_string(), *gw))
        .collect();
        data.apply_capacities(&capacities);
        let gw = &data.installed_capacity_gw;
        assert!(!gw.contains_key("gas"));
        assert!(!gw.contains_key("wind"));
        assert_eq!(gw["CCGT"] + gw["OCGT"], 25.0);
        assert_eq!(gw["onwind"] + gw["offwind"], 12.0);
        assert_eq!(gw["coal"], 65.0);
    }

    #[test]
    fn test_single_split_carrier_drops_its_aggregate() {
        let mut data = ModelData::estimates();
        let mut capacities = CarrierTable::new();
        capacities.insert("offwind".to_string(), 3.0);
        data.apply_capacities(&capacities);
        assert!(!data.installed_capacity_gw.contains_key("wind"));
        assert_eq!(data.installed_capacity_gw["gas"], 25.0);
    }

    #[test]
    fn test_explicit_aggregate_is_kept_beside_its_splits() {
        let mut data = ModelData::estimates();
        let mut capacities = CarrierTable::new();
        capacities.insert("gas".to_string(), 10.0);
        capacities.insert("CCGT".to_string(), 15.0);
        data.apply_capacities(&capacities);
        assert_eq!(data.installed_capacity_gw["gas"], 10.0);
        assert_eq!(data.installed_capacity_gw["CCGT"], 15.0);
    }

    #[test]
    fn test_real_series_is_truncated_to_horizon() {
        let source = DataSource::RealData {
            data: ModelData::estimates(),
            hourly_demand_mw: Some(vec![1.0, 2.0, 3.0, 4.0]),
        };
        assert_eq!(source.hourly_demand(3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_short_real_series_falls_back_to_synthetic_profile() {
        let source = DataSource::RealData {
            data: ModelData::estimates(),
            hourly_demand_mw: Some(vec![1.0, 2.0]),
        };
        let expected =
            profile::synthetic_demand(DEFAULT_ANNUAL_DEMAND_TWH, 24);
        assert_eq!(source.hourly_demand(24), expected);
    }

    #[test]
    fn test_invalid_real_demand_falls_back_to_synthetic_profile() {
        let expected =
            profile::synthetic_demand(DEFAULT_ANNUAL_DEMAND_TWH, 3);
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let source = DataSource::RealData {
                data: ModelData::estimates(),
                hourly_demand_mw: Some(vec![1.0, bad, 3.0]),
            };
            assert_eq!(source.hourly_demand(3), expected);
        }
    }

    #[test]
    fn test_invalid_demand_past_the_horizon_is_ignored() {
        let source = DataSource::RealData {
            data: ModelData::estimates(),
            hourly_demand_mw: Some(vec![1.0, 2.0, -3.0]),
        };
        assert_eq!(source.hourly_demand(2), vec![1.0, 2.0]);
    }

    #[test]
    fn test_regions_start_with_the_hub() {
        for (region, _) in HUB_CONNECTIONS_GW.iter() {
            assert_ne!(*region, REGIONS[0].name);
            assert!(REGIONS.iter().any(|r| r.name == *region));
        }
    }
}
