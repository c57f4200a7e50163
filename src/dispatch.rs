//! Formulates the economic dispatch of a [`Network`] as one linear program
//! over all snapshots, hands it to a [`LinearSolver`] and writes the solved
//! time series back into the network.

use crate::error::SolveFailure;
use crate::solver::{LinearProgram, LinearSolver, LpSolution};
use crate::system::{Dispatch, InitialState, Network};
use std::time::Instant;
use tracing::{info, warn};

/// Relative tolerance of the post-solve invariant checks.
pub const TOLERANCE: f64 = 1e-6;

/// Helper accessor for indexing variables and constraints of the problem,
/// `[entity id][snapshot]`
#[derive(Debug)]
pub struct Accessors {
    pub generator_p: Vec<Vec<usize>>,
    pub storage_dispatch: Vec<Vec<usize>>,
    pub storage_store: Vec<Vec<usize>>,
    pub state_of_charge: Vec<Vec<usize>>,
    /// Only for storage units with a free initial state.
    pub initial_soc: Vec<Option<usize>>,
    pub line_flow: Vec<Vec<usize>>,
    /// Empty for buses without a power balance.
    pub power_balance: Vec<Vec<usize>>,
    pub storage_continuity: Vec<Vec<usize>>,
}

/// The dispatch problem of one network
#[derive(Debug)]
pub struct DispatchProblem {
    pub problem: LinearProgram,
    pub accessors: Accessors,
}

impl DispatchProblem {
    pub fn new(network: &Network) -> Self {
        let mut pb = LinearProgram::new();
        let n = network.snapshots.len();

        // VARIABLES
        let generator_p: Vec<Vec<usize>> = network
            .generators
            .iter()
            .map(|g| {
                (0..n)
                    .map(|t| {
                        pb.add_column(g.marginal_cost, 0.0..=g.max_output(t))
                    })
                    .collect()
            })
            .collect();
        let storage_dispatch: Vec<Vec<usize>> = network
            .storage_units
            .iter()
            .map(|s| {
                (0..n)
                    .map(|_| pb.add_column(s.marginal_cost, 0.0..=s.p_nom))
                    .collect()
            })
            .collect();
        let storage_store: Vec<Vec<usize>> = network
            .storage_units
            .iter()
            .map(|s| {
                (0..n)
                    .map(|_| pb.add_column(s.marginal_cost, 0.0..=s.p_nom))
                    .collect()
            })
            .collect();
        let state_of_charge: Vec<Vec<usize>> = network
            .storage_units
            .iter()
            .map(|s| {
                (0..n)
                    .map(|_| pb.add_column(0.0, 0.0..=s.energy_capacity()))
                    .collect()
            })
            .collect();
        let initial_soc: Vec<Option<usize>> = network
            .storage_units
            .iter()
            .map(|s| match s.initial_state {
                InitialState::Free => {
                    Some(pb.add_column(0.0, 0.0..=s.energy_capacity()))
                }
                InitialState::FixedZero | InitialState::Cyclic => None,
            })
            .collect();
        let line_flow: Vec<Vec<usize>> = network
            .lines
            .iter()
            .map(|l| {
                (0..n)
                    .map(|_| pb.add_column(0.0, -l.s_nom..=l.s_nom))
                    .collect()
            })
            .collect();

        // Power balance with the bus load as RHS
        let mut power_balance: Vec<Vec<usize>> =
            vec![vec![]; network.meta.buses_count];
        for bus in network.buses.iter().filter(|b| b.is_electric()) {
            for t in 0..n {
                let mut factors: Vec<(usize, f64)> = vec![];
                for g in bus.generator_ids.iter() {
                    factors.push((generator_p[*g][t], 1.0));
                }
                for s in bus.storage_ids.iter() {
                    factors.push((storage_dispatch[*s][t], 1.0));
                    factors.push((storage_store[*s][t], -1.0));
                }
                for l in bus.source_line_ids.iter() {
                    factors.push((line_flow[*l][t], -1.0));
                }
                for l in bus.target_line_ids.iter() {
                    factors.push((line_flow[*l][t], 1.0));
                }
                let load: f64 = bus
                    .load_ids
                    .iter()
                    .map(|l| network.loads[*l].p_set[t])
                    .sum();
                power_balance[bus.id].push(pb.add_row(load..=load, &factors));
            }
        }

        // soc[t] - soc[t-1] - eff_store * store[t]
        //     + dispatch[t] / eff_dispatch = 0
        let mut storage_continuity: Vec<Vec<usize>> =
            vec![vec![]; network.meta.storage_units_count];
        for s in network.storage_units.iter() {
            for t in 0..n {
                let soc = state_of_charge[s.id][t];
                let previous = match (t, s.initial_state) {
                    (0, InitialState::FixedZero) => None,
                    (0, InitialState::Free) => initial_soc[s.id],
                    (0, InitialState::Cyclic) => {
                        Some(state_of_charge[s.id][n - 1])
                    }
                    _ => Some(state_of_charge[s.id][t - 1]),
                };
                let mut factors = vec![
                    (storage_store[s.id][t], -s.efficiency_store),
                    (storage_dispatch[s.id][t], 1.0 / s.efficiency_dispatch),
                ];
                match previous {
                    // a one-snapshot cyclic unit: the two terms cancel
                    Some(col) if col == soc => {}
                    Some(col) => {
                        factors.push((soc, 1.0));
                        factors.push((col, -1.0));
                    }
                    None => factors.push((soc, 1.0)),
                }
                storage_continuity[s.id].push(pb.add_row(0.0..=0.0, &factors));
            }
        }

        let accessors = Accessors {
            generator_p,
            storage_dispatch,
            storage_store,
            state_of_charge,
            initial_soc,
            line_flow,
            power_balance,
            storage_continuity,
        };

        DispatchProblem {
            problem: pb,
            accessors,
        }
    }

    fn values(solution: &LpSolution, columns: &[Vec<usize>]) -> Vec<Vec<f64>> {
        columns
            .iter()
            .map(|cols| cols.iter().map(|c| solution.col_values[*c]).collect())
            .collect()
    }

    /// Splits the flat solution vector into per-entity time series.
    pub fn translate(&self, solution: &LpSolution) -> Dispatch {
        let marginal_price = if solution.row_duals.is_empty() {
            vec![vec![]; self.accessors.power_balance.len()]
        } else {
            self.accessors
                .power_balance
                .iter()
                .map(|rows| {
                    rows.iter().map(|r| solution.row_duals[*r]).collect()
                })
                .collect()
        };
        let accessors = &self.accessors;
        Dispatch {
            generator_p: Self::values(solution, &accessors.generator_p),
            storage_dispatch: Self::values(
                solution,
                &accessors.storage_dispatch,
            ),
            storage_store: Self::values(solution, &accessors.storage_store),
            state_of_charge: Self::values(
                solution,
                &accessors.state_of_charge,
            ),
            line_flow: Self::values(solution, &accessors.line_flow),
            marginal_price,
            objective: solution.objective,
        }
    }
}

fn violation(what: String) -> SolveFailure {
    SolveFailure::Numerical {
        reason: format!("solution violates {what}"),
    }
}

fn within(
    value: f64,
    lower: f64,
    upper: f64,
    scale: f64,
    tolerance: f64,
) -> bool {
    let slack = tolerance * scale.abs().max(1.0);
    value >= lower - slack && value <= upper + slack
}

/// Checks power balance, dispatch bounds, storage bounds and continuity,
/// and line limits on a solved dispatch.
pub fn check_postconditions(
    network: &Network,
    dispatch: &Dispatch,
    tolerance: f64,
) -> Result<(), SolveFailure> {
    let n = network.snapshots.len();

    for g in network.generators.iter() {
        for t in 0..n {
            let p = dispatch.generator_p[g.id][t];
            if !within(p, 0.0, g.max_output(t), g.p_nom, tolerance) {
                return Err(violation(format!(
                    "the output limit of generator `{}` at snapshot {t}",
                    g.name
                )));
            }
        }
    }

    for s in network.storage_units.iter() {
        let capacity = s.energy_capacity();
        for t in 0..n {
            let soc = dispatch.state_of_charge[s.id][t];
            let store = dispatch.storage_store[s.id][t];
            let discharge = dispatch.storage_dispatch[s.id][t];
            if !within(soc, 0.0, capacity, capacity, tolerance)
                || !within(store, 0.0, s.p_nom, s.p_nom, tolerance)
                || !within(discharge, 0.0, s.p_nom, s.p_nom, tolerance)
            {
                return Err(violation(format!(
                    "the bounds of storage unit `{}` at snapshot {t}",
                    s.name
                )));
            }
            let previous = match (t, s.initial_state) {
                (0, InitialState::FixedZero) => Some(0.0),
                (0, InitialState::Free) => None,
                (0, InitialState::Cyclic) => {
                    Some(dispatch.state_of_charge[s.id][n - 1])
                }
                _ => Some(dispatch.state_of_charge[s.id][t - 1]),
            };
            let charged = s.efficiency_store * store;
            let discharged = discharge / s.efficiency_dispatch;
            // the free initial level only has to lie within the capacity
            let expected_previous =
                previous.unwrap_or(soc - charged + discharged);
            let expected = expected_previous + charged - discharged;
            let previous_in_bounds =
                within(expected_previous, 0.0, capacity, capacity, tolerance);
            if (soc - expected).abs() > tolerance * capacity.max(1.0)
                || !previous_in_bounds
            {
                return Err(violation(format!(
                    "the state of charge continuity of `{}` at snapshot {t}",
                    s.name
                )));
            }
        }
    }

    for l in network.lines.iter() {
        for t in 0..n {
            let flow = dispatch.line_flow[l.id][t];
            if !within(flow, -l.s_nom, l.s_nom, l.s_nom, tolerance) {
                return Err(violation(format!(
                    "the thermal limit of line `{}` at snapshot {t}",
                    l.name
                )));
            }
        }
    }

    for bus in network.buses.iter().filter(|b| b.is_electric()) {
        for t in 0..n {
            let mut injection = 0.0;
            let mut withdrawal = 0.0;
            for g in bus.generator_ids.iter() {
                injection += dispatch.generator_p[*g][t];
            }
            for s in bus.storage_ids.iter() {
                injection += dispatch.storage_dispatch[*s][t];
                withdrawal += dispatch.storage_store[*s][t];
            }
            for l in bus.target_line_ids.iter() {
                injection += dispatch.line_flow[*l][t];
            }
            for l in bus.source_line_ids.iter() {
                withdrawal += dispatch.line_flow[*l][t];
            }
            for l in bus.load_ids.iter() {
                withdrawal += network.loads[*l].p_set[t];
            }
            let scale = injection.abs().max(withdrawal.abs()).max(1.0);
            if (injection - withdrawal).abs() > tolerance * scale {
                return Err(violation(format!(
                    "the power balance of bus `{}` at snapshot {t}",
                    bus.name
                )));
            }
        }
    }

    Ok(())
}

/// Solves the dispatch of `network` without modifying it.
pub fn optimise(
    network: &Network,
    solver: &dyn LinearSolver,
) -> Result<Dispatch, SolveFailure> {
    let dispatch_problem = DispatchProblem::new(network);
    let problem = &dispatch_problem.problem;
    info!(
        solver = solver.name(),
        variables = problem.num_col,
        constraints = problem.num_row,
        "solving dispatch"
    );

    let begin = Instant::now();
    let solution = solver.solve(problem).inspect_err(|e| {
        warn!(solver = solver.name(), "dispatch solve failed: {e}");
    })?;
    if solution.col_values.len() != problem.num_col {
        return Err(SolveFailure::Numerical {
            reason: format!(
                "solver returned {} values for {} variables",
                solution.col_values.len(),
                problem.num_col
            ),
        });
    }

    let recomputed = problem.evaluate(&solution.col_values);
    let objective_tolerance = TOLERANCE * recomputed.abs().max(1.0);
    if (recomputed - solution.objective).abs() > objective_tolerance {
        return Err(SolveFailure::Numerical {
            reason: format!(
                "reported objective {} differs from the recomputed {}",
                solution.objective, recomputed
            ),
        });
    }

    let dispatch = dispatch_problem.translate(&solution);
    check_postconditions(network, &dispatch, TOLERANCE)?;
    info!(
        objective = dispatch.objective,
        elapsed_ms = begin.elapsed().as_millis() as u64,
        "dispatch solved"
    );
    Ok(dispatch)
}

/// Solves the dispatch and stores it in the network. On failure the network
/// keeps its previous result.
pub fn solve(
    network: &mut Network,
    solver: &dyn LinearSolver,
) -> Result<(), SolveFailure> {
    let dispatch = optimise(network, solver)?;
    network.set_dispatch(dispatch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highs::HighsSolver;
    use crate::system::{fixtures, SolveResult};
    use approx::assert_relative_eq;

    struct UnavailableSolver;

    impl LinearSolver for UnavailableSolver {
        fn name(&self) -> &str {
            "missing"
        }

        fn solve(
            &self,
            _problem: &LinearProgram,
        ) -> Result<LpSolution, SolveFailure> {
            Err(SolveFailure::SolverUnavailable {
                solver: "missing".to_string(),
                reason: "not installed".to_string(),
            })
        }
    }

    /// Returns all zeros, which never balances a loaded bus.
    struct LazySolver;

    impl LinearSolver for LazySolver {
        fn name(&self) -> &str {
            "lazy"
        }

        fn solve(
            &self,
            problem: &LinearProgram,
        ) -> Result<LpSolution, SolveFailure> {
            Ok(LpSolution {
                col_values: vec![0.0; problem.num_col],
                row_duals: vec![],
                objective: 0.0,
            })
        }
    }

    #[test]
    fn test_create_problem_for_coal_only_network() {
        let network = fixtures::coal_only(24);
        let dp = DispatchProblem::new(&network);
        assert_eq!(dp.accessors.generator_p.len(), 1);
        assert_eq!(dp.accessors.generator_p[0].len(), 24);
        assert!(dp.accessors.storage_dispatch.is_empty());
        assert!(dp.accessors.line_flow.is_empty());
        assert_eq!(dp.accessors.power_balance[0].len(), 24);
        assert_eq!(dp.problem.num_col, 24);
        assert_eq!(dp.problem.num_row, 24);
    }

    #[test]
    fn test_placeholder_buses_have_no_balance() {
        let network = fixtures::two_bus(500.0, 3);
        let dp = DispatchProblem::new(&network);
        assert_eq!(dp.accessors.power_balance[0].len(), 3);
        assert_eq!(dp.accessors.power_balance[1].len(), 3);
        assert!(dp.accessors.power_balance[2].is_empty());
    }

    #[test]
    fn test_free_initial_state_adds_a_variable() {
        let network = fixtures::solar_with_storage(InitialState::Free, 24);
        let dp = DispatchProblem::new(&network);
        assert!(dp.accessors.initial_soc[0].is_some());
        let fixed = fixtures::solar_with_storage(InitialState::FixedZero, 24);
        let dp_fixed = DispatchProblem::new(&fixed);
        assert_eq!(dp.problem.num_col, dp_fixed.problem.num_col + 1);
    }

    #[test]
    fn test_coal_only_dispatch() {
        let mut network = fixtures::coal_only(24);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let dispatch = network.dispatch().unwrap();
        for p in dispatch.generator_p[0].iter() {
            assert_relative_eq!(*p, 500.0, max_relative = 1e-9);
        }
        assert_relative_eq!(
            dispatch.objective,
            4_200_000.0,
            max_relative = 1e-9
        );
        assert_eq!(dispatch.marginal_price[0].len(), 24);
        assert_relative_eq!(
            dispatch.marginal_price[0][0].abs(),
            350.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_cheap_power_flows_up_to_the_line_limit() {
        let mut network = fixtures::two_bus(500.0, 4);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let dispatch = network.dispatch().unwrap();
        for t in 0..4 {
            assert_relative_eq!(
                dispatch.line_flow[0][t],
                300.0,
                max_relative = 1e-9
            );
            assert_relative_eq!(
                dispatch.generator_p[0][t],
                300.0,
                max_relative = 1e-9
            );
            assert_relative_eq!(
                dispatch.generator_p[1][t],
                200.0,
                max_relative = 1e-9
            );
        }
        assert_relative_eq!(
            dispatch.objective,
            4.0 * (300.0 * 50.0 + 200.0 * 550.0)
        );
    }

    #[test]
    fn test_infeasible_network_is_reported() {
        let mut network = fixtures::two_bus(1500.0, 2);
        let err = solve(&mut network, &HighsSolver::default()).unwrap_err();
        assert_eq!(err, SolveFailure::Infeasible);
        assert_eq!(network.result(), &SolveResult::NotSolved);
    }

    #[test]
    fn test_unavailable_solver_is_propagated() {
        let mut network = fixtures::coal_only(2);
        let err = solve(&mut network, &UnavailableSolver).unwrap_err();
        assert!(matches!(err, SolveFailure::SolverUnavailable { .. }));
        assert!(network.dispatch().is_none());
    }

    #[test]
    fn test_unbalanced_solution_is_rejected() {
        let mut network = fixtures::coal_only(2);
        let err = solve(&mut network, &LazySolver).unwrap_err();
        match err {
            SolveFailure::Numerical { reason } => {
                assert!(
                    reason.contains("power balance of bus `elec`"),
                    "{reason}"
                )
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }

    #[test]
    fn test_storage_respects_its_bounds() {
        let policies = [
            InitialState::Free,
            InitialState::FixedZero,
            InitialState::Cyclic,
        ];
        for policy in policies {
            let mut network = fixtures::solar_with_storage(policy, 48);
            solve(&mut network, &HighsSolver::default()).unwrap();
            let dispatch = network.dispatch().unwrap();
            let capacity = network.storage_units[0].energy_capacity();
            for soc in dispatch.state_of_charge[0].iter() {
                assert!(*soc >= -1e-6 && *soc <= capacity + 1e-6);
            }
            let discharged: f64 = dispatch.storage_dispatch[0].iter().sum();
            assert!(discharged > 0.0, "{policy:?}");
        }
    }

    #[test]
    fn test_fixed_zero_starts_empty() {
        let mut network =
            fixtures::solar_with_storage(InitialState::FixedZero, 24);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let dispatch = network.dispatch().unwrap();
        let s = &network.storage_units[0];
        let expected = s.efficiency_store * dispatch.storage_store[0][0]
            - dispatch.storage_dispatch[0][0] / s.efficiency_dispatch;
        assert!((dispatch.state_of_charge[0][0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_initial_state_policy_orders_costs() {
        let objective = |policy| {
            let mut network = fixtures::solar_with_storage(policy, 24);
            solve(&mut network, &HighsSolver::default()).unwrap();
            network.dispatch().unwrap().objective
        };
        let free = objective(InitialState::Free);
        let cyclic = objective(InitialState::Cyclic);
        let fixed = objective(InitialState::FixedZero);
        assert!(free <= cyclic + 1e-6);
        assert!(cyclic <= fixed + 1e-6);
        assert!(free < fixed - 1.0);
    }

    #[test]
    fn test_single_snapshot_cyclic_storage() {
        let mut network = fixtures::solar_with_storage(InitialState::Cyclic, 1);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let dispatch = network.dispatch().unwrap();
        assert!(dispatch.storage_dispatch[0][0] < 1e-6);
    }

    #[test]
    fn test_postconditions_catch_soc_overflow() {
        let mut network = fixtures::solar_with_storage(InitialState::Free, 24);
        solve(&mut network, &HighsSolver::default()).unwrap();
        let mut dispatch = network.dispatch().unwrap().clone();
        dispatch.state_of_charge[0][3] = 1e9;
        assert!(check_postconditions(&network, &dispatch, TOLERANCE).is_err());
    }
}
