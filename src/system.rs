use crate::profile::Availability;
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCarrier {
    AC,
    Heat,
    Gas,
}

#[derive(Debug)]
pub struct Bus {
    pub id: usize,
    pub name: String,
    pub carrier: BusCarrier,
    pub v_nom: Option<f64>,
    pub generator_ids: Vec<usize>,
    pub load_ids: Vec<usize>,
    pub storage_ids: Vec<usize>,
    pub source_line_ids: Vec<usize>,
    pub target_line_ids: Vec<usize>,
}

impl Bus {
    pub fn new(
        id: usize,
        name: &str,
        carrier: BusCarrier,
        v_nom: Option<f64>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            carrier,
            v_nom,
            generator_ids: vec![],
            load_ids: vec![],
            storage_ids: vec![],
            source_line_ids: vec![],
            target_line_ids: vec![],
        }
    }

    /// Only electricity buses carry a power balance. Heat and gas buses
    /// are placeholders.
    pub fn is_electric(&self) -> bool {
        self.carrier == BusCarrier::AC
    }
}

#[derive(Debug)]
pub struct Generator {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub carrier: String,
    pub p_nom: f64,
    pub marginal_cost: f64,
    pub p_max_pu: Availability,
}

impl Generator {
    pub fn new(
        id: usize,
        name: &str,
        bus_id: usize,
        carrier: &str,
        p_nom: f64,
        marginal_cost: f64,
        p_max_pu: Availability,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            bus_id,
            carrier: carrier.to_string(),
            p_nom,
            marginal_cost,
            p_max_pu,
        }
    }

    /// Upper bound on dispatch at `snapshot` (MW).
    pub fn max_output(&self, snapshot: usize) -> f64 {
        self.p_nom * self.p_max_pu.at(snapshot)
    }
}

#[derive(Debug)]
pub struct Load {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub p_set: Vec<f64>,
}

impl Load {
    pub fn new(id: usize, name: &str, bus_id: usize, p_set: Vec<f64>) -> Self {
        Self {
            id,
            name: name.to_string(),
            bus_id,
            p_set,
        }
    }
}

/// What the state of charge is before the first snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Chosen by the optimizer within the energy capacity.
    Free,
    /// Empty.
    #[default]
    FixedZero,
    /// Equal to the state of charge at the last snapshot.
    Cyclic,
}

#[derive(Debug)]
pub struct StorageUnit {
    pub id: usize,
    pub name: String,
    pub bus_id: usize,
    pub carrier: String,
    pub p_nom: f64,
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub marginal_cost: f64,
    pub initial_state: InitialState,
}

impl StorageUnit {
    pub fn new(
        id: usize,
        name: &str,
        bus_id: usize,
        carrier: &str,
        p_nom: f64,
        max_hours: f64,
        efficiency_store: f64,
        efficiency_dispatch: f64,
        marginal_cost: f64,
        initial_state: InitialState,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            bus_id,
            carrier: carrier.to_string(),
            p_nom,
            max_hours,
            efficiency_store,
            efficiency_dispatch,
            marginal_cost,
            initial_state,
        }
    }

    /// Usable energy (MWh).
    pub fn energy_capacity(&self) -> f64 {
        self.p_nom * self.max_hours
    }
}

#[derive(Debug)]
pub struct Line {
    pub id: usize,
    pub name: String,
    pub source_bus_id: usize,
    pub target_bus_id: usize,
    pub s_nom: f64,
    pub x: f64,
    pub r: f64,
}

impl Line {
    pub fn new(
        id: usize,
        name: &str,
        source_bus_id: usize,
        target_bus_id: usize,
        s_nom: f64,
        x: f64,
        r: f64,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            source_bus_id,
            target_bus_id,
            s_nom,
            x,
            r,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    pub name: String,
    /// t/MWh
    pub co2_emissions: f64,
}

/// Hourly snapshots starting at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots {
    pub start: NaiveDateTime,
    pub count: usize,
}

impl Snapshots {
    pub fn new(start: NaiveDateTime, count: usize) -> Self {
        Self { start, count }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn timestamp(&self, snapshot: usize) -> NaiveDateTime {
        self.start + Duration::hours(snapshot as i64)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.count).map(|t| self.timestamp(t))
    }
}

/// Solved time series, indexed `[entity id][snapshot]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub generator_p: Vec<Vec<f64>>,
    pub storage_dispatch: Vec<Vec<f64>>,
    pub storage_store: Vec<Vec<f64>>,
    pub state_of_charge: Vec<Vec<f64>>,
    pub line_flow: Vec<Vec<f64>>,
    /// Dual of each electric bus balance; empty for placeholder buses or
    /// when the solver reports no duals.
    pub marginal_price: Vec<Vec<f64>>,
    pub objective: f64,
}

impl Dispatch {
    /// Net storage output (dispatch minus store) at `snapshot`.
    pub fn storage_net(&self, storage_id: usize, snapshot: usize) -> f64 {
        self.storage_dispatch[storage_id][snapshot]
            - self.storage_store[storage_id][snapshot]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveResult {
    NotSolved,
    Solved(Dispatch),
}

#[allow(dead_code)]
#[derive(Debug)]
pub struct NetworkMetadata {
    pub buses_count: usize,
    pub generators_count: usize,
    pub loads_count: usize,
    pub storage_units_count: usize,
    pub lines_count: usize,
}

#[derive(Debug)]
pub struct Network {
    pub name: String,
    pub snapshots: Snapshots,
    pub buses: Vec<Bus>,
    pub generators: Vec<Generator>,
    pub loads: Vec<Load>,
    pub storage_units: Vec<StorageUnit>,
    pub lines: Vec<Line>,
    pub carriers: BTreeMap<String, Carrier>,
    pub meta: NetworkMetadata,
    result: SolveResult,
}

impl Network {
    pub fn new(
        name: &str,
        snapshots: Snapshots,
        mut buses: Vec<Bus>,
        generators: Vec<Generator>,
        loads: Vec<Load>,
        storage_units: Vec<StorageUnit>,
        lines: Vec<Line>,
        carriers: Vec<Carrier>,
    ) -> Self {
        for l in lines.iter() {
            buses[l.source_bus_id].source_line_ids.push(l.id);
            buses[l.target_bus_id].target_line_ids.push(l.id);
        }
        for g in generators.iter() {
            buses[g.bus_id].generator_ids.push(g.id);
        }
        for l in loads.iter() {
            buses[l.bus_id].load_ids.push(l.id);
        }
        for s in storage_units.iter() {
            buses[s.bus_id].storage_ids.push(s.id);
        }

        let meta = NetworkMetadata {
            buses_count: buses.len(),
            generators_count: generators.len(),
            loads_count: loads.len(),
            storage_units_count: storage_units.len(),
            lines_count: lines.len(),
        };
        let carriers = carriers
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        Self {
            name: name.to_string(),
            snapshots,
            buses,
            generators,
            loads,
            storage_units,
            lines,
            carriers,
            meta,
            result: SolveResult::NotSolved,
        }
    }

    pub fn result(&self) -> &SolveResult {
        &self.result
    }

    pub fn dispatch(&self) -> Option<&Dispatch> {
        match &self.result {
            SolveResult::Solved(dispatch) => Some(dispatch),
            SolveResult::NotSolved => None,
        }
    }

    pub(crate) fn set_dispatch(&mut self, dispatch: Dispatch) {
        self.result = SolveResult::Solved(dispatch);
    }

    pub fn bus_id(&self, name: &str) -> Option<usize> {
        self.buses.iter().position(|b| b.name == name)
    }

    /// Total demand over all loads at `snapshot` (MW).
    pub fn total_load_at(&self, snapshot: usize) -> f64 {
        self.loads.iter().map(|l| l.p_set[snapshot]).sum()
    }

    /// Total demand over the horizon (MWh).
    pub fn total_demand(&self) -> f64 {
        (0..self.snapshots.len()).map(|t| self.total_load_at(t)).sum()
    }

    /// Installed generator capacity per carrier (MW).
    pub fn capacity_by_carrier(&self) -> BTreeMap<String, f64> {
        let mut capacity = BTreeMap::new();
        for g in self.generators.iter() {
            *capacity.entry(g.carrier.clone()).or_insert(0.0) += g.p_nom;
        }
        capacity
    }

    pub fn co2_emissions(&self, carrier: &str) -> f64 {
        self.carriers
            .get(carrier)
            .map(|c| c.co2_emissions)
            .unwrap_or(0.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_coal_only_network() {
        let network = fixtures::coal_only(24);
        assert_eq!(network.buses.len(), 1);
        assert_eq!(network.buses[0].generator_ids, vec![0]);
        assert_eq!(network.buses[0].load_ids, vec![0]);
        assert_eq!(network.meta.lines_count, 0);
        assert_eq!(network.result(), &SolveResult::NotSolved);
    }

    #[test]
    fn test_lines_are_wired_to_both_ends() {
        let network = fixtures::two_bus(500.0, 4);
        assert_eq!(network.buses[0].source_line_ids, vec![0]);
        assert_eq!(network.buses[1].target_line_ids, vec![0]);
        assert!(!network.buses[2].is_electric());
    }

    #[test]
    fn test_snapshot_timestamps_are_hourly() {
        let snapshots = Snapshots::new(fixtures::start(), 30);
        let last = snapshots.timestamps().last().unwrap();
        assert_eq!(last.to_string(), "2023-01-02 05:00:00");
    }

    #[test]
    fn test_total_demand_and_capacity() {
        let network = fixtures::coal_only(24);
        assert_eq!(network.total_demand(), 12_000.0);
        assert_eq!(network.capacity_by_carrier()["coal"], 1000.0);
        assert_eq!(network.co2_emissions("coal"), 0.85);
        assert_eq!(network.co2_emissions("solar"), 0.0);
    }
}
