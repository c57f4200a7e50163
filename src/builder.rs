//! Assembles the network topology for a run: buses per region, generators
//! sized from the capacity table, sector or regional loads, the optional
//! storage fleet and the import feed.

use crate::data::{self, DataSource, ModelData, Region, MW_PER_GW};
use crate::error::ConfigError;
use crate::profile::{self, Availability};
use crate::system::{
    Bus, BusCarrier, Carrier, Generator, InitialState, Line, Load, Network,
    Snapshots, StorageUnit,
};
use chrono::NaiveDateTime;
use tracing::{debug, info};

pub const NETWORK_NAME: &str = "Guangdong Province Energy System";

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub n_snapshots: usize,
    pub multi_region: bool,
    pub include_storage: bool,
    pub start_time: NaiveDateTime,
    pub storage_initial_state: InitialState,
}

impl NetworkConfig {
    pub fn new(
        n_snapshots: usize,
        multi_region: bool,
        include_storage: bool,
        start_time: NaiveDateTime,
    ) -> Self {
        Self {
            n_snapshots,
            multi_region,
            include_storage,
            start_time,
            storage_initial_state: InitialState::default(),
        }
    }
}

fn elec_bus_name(region: &str) -> String {
    format!("{region}_elec")
}

/// Collects entities, handing out ids in insertion order.
struct NetworkBuilder<'a> {
    data: &'a ModelData,
    n_snapshots: usize,
    buses: Vec<Bus>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    storage_units: Vec<StorageUnit>,
    lines: Vec<Line>,
}

impl<'a> NetworkBuilder<'a> {
    fn new(data: &'a ModelData, n_snapshots: usize) -> Self {
        Self {
            data,
            n_snapshots,
            buses: vec![],
            generators: vec![],
            loads: vec![],
            storage_units: vec![],
            lines: vec![],
        }
    }

    fn add_bus(&mut self, name: &str, carrier: BusCarrier) -> usize {
        let id = self.buses.len();
        let v_nom = match carrier {
            BusCarrier::AC => Some(data::BUS_VOLTAGE_KV),
            BusCarrier::Heat | BusCarrier::Gas => None,
        };
        self.buses.push(Bus::new(id, name, carrier, v_nom));
        id
    }

    fn installed_capacity(&self, carrier: &str) -> Result<f64, ConfigError> {
        self.data
            .installed_capacity_gw
            .get(carrier)
            .map(|gw| gw * MW_PER_GW)
            .ok_or_else(|| ConfigError::MissingCapacity {
                carrier: carrier.to_string(),
            })
    }

    fn marginal_cost(&self, carrier: &str) -> Result<f64, ConfigError> {
        self.data.marginal_costs.get(carrier).copied().ok_or_else(|| {
            ConfigError::MissingMarginalCost {
                carrier: carrier.to_string(),
            }
        })
    }

    /// Adds a generator priced from the marginal cost table.
    fn add_generator(
        &mut self,
        name: &str,
        bus_id: usize,
        carrier: &str,
        p_nom: f64,
    ) -> Result<(), ConfigError> {
        let marginal_cost = self.marginal_cost(carrier)?;
        let p_max_pu = profile::availability(carrier, self.n_snapshots);
        debug!(name, carrier, p_nom, marginal_cost, "adding generator");
        let id = self.generators.len();
        self.generators.push(Generator::new(
            id,
            name,
            bus_id,
            carrier,
            p_nom,
            marginal_cost,
            p_max_pu,
        ));
        Ok(())
    }

    fn add_load(&mut self, name: &str, bus_id: usize, p_set: Vec<f64>) {
        let id = self.loads.len();
        self.loads.push(Load::new(id, name, bus_id, p_set));
    }

    fn add_single_region(&mut self) -> Result<usize, ConfigError> {
        let bus =
            self.add_bus(&elec_bus_name(data::SINGLE_REGION), BusCarrier::AC);
        self.add_bus(
            &format!("{}_heat", data::SINGLE_REGION),
            BusCarrier::Heat,
        );
        self.add_bus(&format!("{}_gas", data::SINGLE_REGION), BusCarrier::Gas);

        let capacities: Vec<(String, f64)> = self
            .data
            .installed_capacity_gw
            .iter()
            .map(|(carrier, gw)| (carrier.clone(), gw * MW_PER_GW))
            .collect();
        for (carrier, p_nom) in capacities.iter() {
            let name = format!("{carrier}_plant");
            self.add_generator(&name, bus, carrier, *p_nom)?;
        }
        Ok(bus)
    }

    fn add_regions(
        &mut self,
        regions: &[Region],
    ) -> Result<usize, ConfigError> {
        for carrier in self.data.installed_capacity_gw.keys() {
            let located = regions.iter().any(|r| {
                r.capacity_shares
                    .iter()
                    .any(|(c, _)| *c == carrier.as_str())
            });
            if !located {
                return Err(ConfigError::MissingRegionalShare {
                    carrier: carrier.clone(),
                });
            }
        }

        let mut region_buses = Vec::with_capacity(regions.len());
        for region in regions.iter() {
            let bus = self.add_bus(&elec_bus_name(region.name), BusCarrier::AC);
            self.add_bus(&format!("{}_heat", region.name), BusCarrier::Heat);
            region_buses.push(bus);
        }

        let hub = region_buses[0];
        for (target, gw) in data::HUB_CONNECTIONS_GW.iter() {
            let Some(index) = regions.iter().position(|r| r.name == *target)
            else {
                continue;
            };
            let target_bus = region_buses[index];
            let id = self.lines.len();
            let name = format!(
                "{}-{}",
                self.buses[hub].name, self.buses[target_bus].name
            );
            self.lines.push(Line::new(
                id,
                &name,
                hub,
                target_bus,
                gw * MW_PER_GW,
                data::LINE_REACTANCE,
                data::LINE_RESISTANCE,
            ));
        }

        for (region, bus) in regions.iter().zip(region_buses.iter()) {
            for (carrier, share) in region.capacity_shares.iter() {
                if *share > 0.0 {
                    let p_nom = self.installed_capacity(carrier)? * share;
                    self.add_generator(
                        &format!("{}_{carrier}", region.name),
                        *bus,
                        carrier,
                        p_nom,
                    )?;
                }
            }
        }
        Ok(hub)
    }

    fn add_sector_loads(&mut self, bus: usize, hourly_demand: &[f64]) {
        let sectors = self.data.sector_demand_twh();
        let total: f64 = sectors.iter().map(|(_, twh)| twh).sum();
        for (sector, twh) in sectors.iter() {
            let share = twh / total;
            let p_set = hourly_demand.iter().map(|d| d * share).collect();
            self.add_load(&format!("{sector}_load"), bus, p_set);
        }
    }

    fn add_regional_loads(
        &mut self,
        regions: &[Region],
        hourly_demand: &[f64],
    ) {
        for region in regions.iter() {
            let bus_name = elec_bus_name(region.name);
            let bus = self.buses.iter().position(|b| b.name == bus_name);
            if let Some(bus) = bus {
                let p_set = hourly_demand
                    .iter()
                    .map(|d| d * region.load_share)
                    .collect();
                self.add_load(&format!("{}_demand", region.name), bus, p_set);
            }
        }
    }

    fn add_storage(&mut self, bus: usize, initial_state: InitialState) {
        for spec in data::STORAGE_UNITS.iter() {
            let id = self.storage_units.len();
            self.storage_units.push(StorageUnit::new(
                id,
                spec.name,
                bus,
                spec.carrier,
                spec.p_nom,
                spec.max_hours,
                spec.efficiency_store,
                spec.efficiency_dispatch,
                spec.marginal_cost,
                initial_state,
            ));
        }
    }

    fn add_import(&mut self, bus: usize) {
        let spec = &data::IMPORT_FEED;
        let id = self.generators.len();
        self.generators.push(Generator::new(
            id,
            spec.name,
            bus,
            spec.carrier,
            spec.p_nom,
            spec.marginal_cost,
            Availability::Constant(spec.availability),
        ));
    }

    fn finish(self, snapshots: Snapshots) -> Network {
        let carriers = self
            .data
            .co2_emissions
            .iter()
            .map(|(name, factor)| Carrier {
                name: name.clone(),
                co2_emissions: *factor,
            })
            .collect();
        Network::new(
            NETWORK_NAME,
            snapshots,
            self.buses,
            self.generators,
            self.loads,
            self.storage_units,
            self.lines,
            carriers,
        )
    }
}

/// Installed capacities must be finite and non-negative.
fn validate_capacities(data: &ModelData) -> Result<(), ConfigError> {
    for (carrier, gw) in data.installed_capacity_gw.iter() {
        if !gw.is_finite() || *gw < 0.0 {
            return Err(ConfigError::InvalidCapacity {
                carrier: carrier.clone(),
                value: *gw,
            });
        }
    }
    Ok(())
}

/// Builds the network for one run. Fails on the first carrier that the
/// tables cannot fully describe.
pub fn build(
    config: &NetworkConfig,
    source: &DataSource,
) -> Result<Network, ConfigError> {
    build_with_regions(config, source, &data::REGIONS)
}

pub(crate) fn build_with_regions(
    config: &NetworkConfig,
    source: &DataSource,
    regions: &[Region],
) -> Result<Network, ConfigError> {
    let n = config.n_snapshots;
    if n == 0 || n > data::HOURS_PER_YEAR {
        return Err(ConfigError::InvalidSnapshots(n));
    }
    info!(
        snapshots = n,
        multi_region = config.multi_region,
        include_storage = config.include_storage,
        real_data = source.is_real(),
        "building network"
    );

    validate_capacities(source.model_data())?;

    let mut builder = NetworkBuilder::new(source.model_data(), n);
    let hourly_demand = source.hourly_demand(n);

    let hub = if config.multi_region {
        let hub = builder.add_regions(regions)?;
        builder.add_regional_loads(regions, &hourly_demand);
        hub
    } else {
        let bus = builder.add_single_region()?;
        builder.add_sector_loads(bus, &hourly_demand);
        bus
    };

    if config.include_storage {
        builder.add_storage(hub, config.storage_initial_state);
    }
    builder.add_import(hub);

    let network = builder.finish(Snapshots::new(config.start_time, n));
    info!(
        buses = network.meta.buses_count,
        generators = network.meta.generators_count,
        loads = network.meta.loads_count,
        storage_units = network.meta.storage_units_count,
        lines = network.meta.lines_count,
        "network built"
    );
    Ok(network)
}
