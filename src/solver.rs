//! Solver-agnostic description of a linear program and the interface a
//! backend implements to solve it.

use crate::error::SolveFailure;
use crate::highs::HighsSolver;
use std::borrow::Borrow;
use std::ops::{Bound, RangeBounds};

fn bound_value(b: Bound<&f64>) -> Option<f64> {
    match b {
        Bound::Included(v) | Bound::Excluded(v) => Some(*v),
        Bound::Unbounded => None,
    }
}

fn bounds_of<B: RangeBounds<f64>>(bounds: B) -> (f64, f64) {
    let low = bound_value(bounds.start_bound()).unwrap_or(f64::NEG_INFINITY);
    let high = bound_value(bounds.end_bound()).unwrap_or(f64::INFINITY);
    (low, high)
}

/// A minimization problem stored column-wise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearProgram {
    pub num_col: usize,
    pub num_row: usize,
    pub num_nz: usize,
    pub col_cost: Vec<f64>,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
    /// Per column: the rows it appears in and its factor there.
    pub columns: Vec<(Vec<usize>, Vec<f64>)>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable with objective weight `cost`, returning its index.
    pub fn add_column<B: RangeBounds<f64>>(
        &mut self,
        cost: f64,
        bounds: B,
    ) -> usize {
        let (low, high) = bounds_of(bounds);
        self.col_cost.push(cost);
        self.col_lower.push(low);
        self.col_upper.push(high);
        self.columns.push((vec![], vec![]));
        let old_col_count = self.num_col;
        self.num_col += 1;
        old_col_count
    }

    /// Adds the constraint `lower <= sum(factor * col) <= upper`, returning
    /// its index.
    pub fn add_row<B, ITEM, I>(&mut self, bounds: B, row_factors: I) -> usize
    where
        B: RangeBounds<f64>,
        ITEM: Borrow<(usize, f64)>,
        I: IntoIterator<Item = ITEM>,
    {
        let row = self.num_row;
        for r in row_factors {
            let &(col, factor) = r.borrow();
            let c = &mut self.columns[col];
            c.0.push(row);
            c.1.push(factor);
            self.num_nz += 1;
        }
        let (low, high) = bounds_of(bounds);
        self.row_lower.push(low);
        self.row_upper.push(high);
        self.num_row += 1;
        row
    }

    /// Objective value of `values`.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        crate::utils::dot_product(&self.col_cost, values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub col_values: Vec<f64>,
    /// Empty when the backend does not report duals.
    pub row_duals: Vec<f64>,
    pub objective: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub time_limit: f64,
    pub feasibility_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            time_limit: 300.0,
            feasibility_tolerance: 1e-7,
        }
    }
}

/// A backend able to solve a [`LinearProgram`] to optimality.
pub trait LinearSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(
        &self,
        problem: &LinearProgram,
    ) -> Result<LpSolution, SolveFailure>;
}

pub fn factory(
    kind: &str,
    options: SolverOptions,
) -> Result<Box<dyn LinearSolver>, SolveFailure> {
    match kind {
        "highs" => Ok(Box::new(HighsSolver::new(options))),
        "glpk" | "gurobi" | "cplex" => Err(SolveFailure::SolverUnavailable {
            solver: kind.to_string(),
            reason: "no backend is compiled in for this solver".to_string(),
        }),
        _ => Err(SolveFailure::SolverUnavailable {
            solver: kind.to_string(),
            reason: "unknown solver".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_and_row() {
        let mut pb = LinearProgram::new();
        let x = pb.add_column(1.0, 0.0..10.0);
        let y = pb.add_column(2.0, 0.0..);
        let row = pb.add_row(5.0..=5.0, &[(x, 1.0), (y, 1.0)]);
        assert_eq!((x, y, row), (0, 1, 0));
        assert_eq!(pb.num_nz, 2);
        assert_eq!(pb.col_upper, vec![10.0, f64::INFINITY]);
        assert_eq!(pb.row_lower, vec![5.0]);
        assert_eq!(pb.row_upper, vec![5.0]);
        assert_eq!(pb.columns[1], (vec![0], vec![1.0]));
    }

    #[test]
    fn test_evaluate_objective() {
        let mut pb = LinearProgram::new();
        pb.add_column(3.0, 0.0..);
        pb.add_column(0.5, 0.0..);
        assert_eq!(pb.evaluate(&[2.0, 4.0]), 8.0);
    }

    #[test]
    fn test_factory_highs() {
        let solver = factory("highs", SolverOptions::default()).unwrap();
        assert_eq!(solver.name(), "highs");
    }

    #[test]
    fn test_factory_unavailable_solvers() {
        for kind in ["gurobi", "simplex-2000"] {
            let err = factory(kind, SolverOptions::default()).err().unwrap();
            assert!(matches!(err, SolveFailure::SolverUnavailable { .. }));
        }
    }
}
