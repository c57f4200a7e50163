use crate::builder::NetworkConfig;
use crate::data::{CarrierTable, DataSource, ModelData};
use crate::error::{ConfigError, Error};
use crate::solver::SolverOptions;
use crate::system::InitialState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const CAPACITIES_FILE: &str = "capacities.csv";
pub const HOURLY_DEMAND_FILE: &str = "hourly_demand.csv";

/// Partial configuration applied on top of the base one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioOverride {
    pub name: String,
    pub snapshots: Option<usize>,
    pub multi_region: Option<bool>,
    pub include_storage: Option<bool>,
    pub storage_initial_state: Option<InitialState>,
    pub annual_demand_twh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub snapshots: usize,
    pub multi_region: bool,
    pub include_storage: bool,
    pub start_date: String,
    pub storage_initial_state: InitialState,
    pub solver: String,
    pub time_limit: f64,
    pub solve: bool,
    pub annual_demand_twh: Option<f64>,
    pub scenarios: Vec<ScenarioOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshots: 24,
            multi_region: false,
            include_storage: true,
            start_date: "2023-01-01".to_string(),
            storage_initial_state: InitialState::default(),
            solver: "highs".to_string(),
            time_limit: 300.0,
            solve: true,
            annual_demand_twh: None,
            scenarios: vec![],
        }
    }
}

impl Config {
    /// Midnight of `start_date`.
    pub fn start_time(&self) -> Result<NaiveDateTime, ConfigError> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| ConfigError::InvalidStartDate {
                value: self.start_date.clone(),
            })
    }

    pub fn network_config(&self) -> Result<NetworkConfig, ConfigError> {
        let mut network_config = NetworkConfig::new(
            self.snapshots,
            self.multi_region,
            self.include_storage,
            self.start_time()?,
        );
        network_config.storage_initial_state = self.storage_initial_state;
        Ok(network_config)
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            time_limit: self.time_limit,
            ..SolverOptions::default()
        }
    }

    /// The configuration of one scenario. Scenarios do not nest.
    pub fn with_override(&self, scenario: &ScenarioOverride) -> Config {
        Config {
            snapshots: scenario.snapshots.unwrap_or(self.snapshots),
            multi_region: scenario.multi_region.unwrap_or(self.multi_region),
            include_storage: scenario
                .include_storage
                .unwrap_or(self.include_storage),
            storage_initial_state: scenario
                .storage_initial_state
                .unwrap_or(self.storage_initial_state),
            annual_demand_twh: scenario
                .annual_demand_twh
                .or(self.annual_demand_twh),
            scenarios: vec![],
            ..self.clone()
        }
    }
}

fn read_to_string(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_config_input(filepath: &Path) -> Result<Config, Error> {
    let contents = read_to_string(filepath)?;
    serde_json::from_str(&contents).map_err(|source| Error::Json {
        path: filepath.display().to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct CapacityRecord {
    carrier: String,
    capacity_gw: f64,
}

/// Installed capacity per carrier (GW), `None` when the file is absent.
pub fn read_capacities_input(
    filepath: &Path,
) -> Result<Option<CarrierTable>, Error> {
    if !filepath.exists() {
        return Ok(None);
    }
    let mut rdr = csv::Reader::from_path(filepath)?;
    let mut capacities = CarrierTable::new();
    for record in rdr.deserialize() {
        let record: CapacityRecord = record?;
        capacities
            .insert(record.carrier.trim().to_string(), record.capacity_gw);
    }
    info!(
        path = %filepath.display(),
        carriers = capacities.len(),
        "loaded installed capacities"
    );
    Ok(Some(capacities))
}

#[derive(Debug, Deserialize)]
struct DemandRecord {
    demand_mw: f64,
}

/// Hourly demand series (MW). Any failure only disables the real series.
pub fn read_hourly_demand_input(filepath: &Path) -> Option<Vec<f64>> {
    if !filepath.exists() {
        warn!(
            path = %filepath.display(),
            "no hourly demand data, using synthetic profile"
        );
        return None;
    }
    let series: Result<Vec<f64>, csv::Error> = csv::Reader::from_path(filepath)
        .and_then(|mut rdr| {
            rdr.deserialize()
                .map(|r| r.map(|record: DemandRecord| record.demand_mw))
                .collect()
        });
    match series {
        Ok(series) if !series.is_empty() => {
            info!(
                path = %filepath.display(),
                hours = series.len(),
                "loaded hourly demand"
            );
            Some(series)
        }
        Ok(_) => {
            warn!(
                path = %filepath.display(),
                "hourly demand file is empty, using synthetic profile"
            );
            None
        }
        Err(e) => {
            warn!(
                path = %filepath.display(),
                "could not read hourly demand ({e}), using synthetic profile"
            );
            None
        }
    }
}

/// Everything read from an input directory.
#[derive(Debug)]
pub struct Input {
    pub config: Config,
    pub capacities: Option<CarrierTable>,
    pub hourly_demand: Option<Vec<f64>>,
}

impl Input {
    pub fn build(path: &str) -> Result<Self, Error> {
        let root = Path::new(path);
        let config = read_config_input(&root.join(CONFIG_FILE))?;
        config.start_time()?;
        let capacities = read_capacities_input(&root.join(CAPACITIES_FILE))?;
        let hourly_demand =
            read_hourly_demand_input(&root.join(HOURLY_DEMAND_FILE));
        Ok(Self {
            config,
            capacities,
            hourly_demand,
        })
    }

    /// The data source for one run of `config`.
    pub fn data_source(&self, config: &Config) -> DataSource {
        let mut data = ModelData::estimates();
        if let Some(twh) = config.annual_demand_twh {
            data.annual_demand_twh = twh;
        }
        if let Some(capacities) = &self.capacities {
            data.apply_capacities(capacities);
        }
        if self.capacities.is_none() && self.hourly_demand.is_none() {
            return DataSource::PlaceholderData { data };
        }
        DataSource::RealData {
            data,
            hourly_demand_mw: self.hourly_demand.clone(),
        }
    }

    /// The base configuration followed by one entry per scenario.
    pub fn scenarios(&self) -> Vec<(String, Config)> {
        let mut scenarios = vec![("base".to_string(), self.config.clone())];
        for scenario in self.config.scenarios.iter() {
            let config = self.config.with_override(scenario);
            scenarios.push((scenario.name.clone(), config));
        }
        scenarios
    }
}
