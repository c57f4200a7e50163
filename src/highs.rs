//! HiGHS backend for [`LinearSolver`], talking to the C API through
//! `highs-sys`. Only the calls needed to load, configure and solve a
//! column-wise problem are wrapped.

use crate::error::SolveFailure;
use crate::solver::{LinearProgram, LinearSolver, LpSolution, SolverOptions};
use std::ffi::{c_void, CString};
use std::fmt::{Debug, Formatter};
use std::os::raw::{c_char, c_int};
use tracing::{debug, warn};

use highs_sys::*;

/// The kinds of results of an optimization
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsModelStatus {
    /// not initialized
    NotSet = MODEL_STATUS_NOTSET as isize,
    /// Unable to load model
    LoadError = MODEL_STATUS_LOAD_ERROR as isize,
    /// invalid model
    ModelError = MODEL_STATUS_MODEL_ERROR as isize,
    /// Unable to run the pre-solve phase
    PresolveError = MODEL_STATUS_PRESOLVE_ERROR as isize,
    /// Unable to solve
    SolveError = MODEL_STATUS_SOLVE_ERROR as isize,
    /// Unable to clean after solve
    PostsolveError = MODEL_STATUS_POSTSOLVE_ERROR as isize,
    /// No variables in the model: nothing to optimize
    ModelEmpty = MODEL_STATUS_MODEL_EMPTY as isize,
    /// There is no solution to the problem
    Infeasible = MODEL_STATUS_INFEASIBLE as isize,
    /// The problem is unbounded or infeasible
    UnboundedOrInfeasible = MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE as isize,
    /// The problem is unbounded: there is no single optimal value
    Unbounded = MODEL_STATUS_UNBOUNDED as isize,
    /// An optimal solution was found
    Optimal = MODEL_STATUS_OPTIMAL as isize,
    /// objective bound
    ObjectiveBound = MODEL_STATUS_OBJECTIVE_BOUND as isize,
    /// objective target
    ObjectiveTarget = MODEL_STATUS_OBJECTIVE_TARGET as isize,
    /// reached limit
    ReachedTimeLimit = MODEL_STATUS_REACHED_TIME_LIMIT as isize,
    /// reached limit
    ReachedIterationLimit = MODEL_STATUS_REACHED_ITERATION_LIMIT as isize,
    /// Unknown model status
    Unknown = MODEL_STATUS_UNKNOWN as isize,
}

/// An unexpected status value was returned by HiGHS
#[derive(PartialEq, Clone, Copy)]
pub struct InvalidStatus(pub c_int);

impl Debug for InvalidStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid HiGHS status", self.0)
    }
}

impl TryFrom<c_int> for HighsModelStatus {
    type Error = InvalidStatus;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            MODEL_STATUS_NOTSET => Ok(Self::NotSet),
            MODEL_STATUS_LOAD_ERROR => Ok(Self::LoadError),
            MODEL_STATUS_MODEL_ERROR => Ok(Self::ModelError),
            MODEL_STATUS_PRESOLVE_ERROR => Ok(Self::PresolveError),
            MODEL_STATUS_SOLVE_ERROR => Ok(Self::SolveError),
            MODEL_STATUS_POSTSOLVE_ERROR => Ok(Self::PostsolveError),
            MODEL_STATUS_MODEL_EMPTY => Ok(Self::ModelEmpty),
            MODEL_STATUS_INFEASIBLE => Ok(Self::Infeasible),
            MODEL_STATUS_UNBOUNDED => Ok(Self::Unbounded),
            MODEL_STATUS_UNBOUNDED_OR_INFEASIBLE => {
                Ok(Self::UnboundedOrInfeasible)
            }
            MODEL_STATUS_OPTIMAL => Ok(Self::Optimal),
            MODEL_STATUS_OBJECTIVE_BOUND => Ok(Self::ObjectiveBound),
            MODEL_STATUS_OBJECTIVE_TARGET => Ok(Self::ObjectiveTarget),
            MODEL_STATUS_REACHED_TIME_LIMIT => Ok(Self::ReachedTimeLimit),
            MODEL_STATUS_REACHED_ITERATION_LIMIT => {
                Ok(Self::ReachedIterationLimit)
            }
            MODEL_STATUS_UNKNOWN => Ok(Self::Unknown),
            n => Err(InvalidStatus(n)),
        }
    }
}

/// The status of a highs operation
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq, Ord, Eq)]
pub enum HighsStatus {
    /// Success
    OK = 0,
    /// Done, with warning
    Warning = 1,
    /// An error occurred
    Error = 2,
}

impl TryFrom<c_int> for HighsStatus {
    type Error = InvalidStatus;

    fn try_from(value: c_int) -> Result<Self, InvalidStatus> {
        match value {
            STATUS_OK => Ok(Self::OK),
            STATUS_WARNING => Ok(Self::Warning),
            STATUS_ERROR => Ok(Self::Error),
            n => Err(InvalidStatus(n)),
        }
    }
}

/// Maps a finished solve to the outcome the dispatch layer understands.
/// `Ok` only for an optimal solution.
pub fn classify(
    status: HighsModelStatus,
    time_limit: f64,
) -> Result<(), SolveFailure> {
    match status {
        HighsModelStatus::Optimal => Ok(()),
        HighsModelStatus::Infeasible
        | HighsModelStatus::UnboundedOrInfeasible => {
            Err(SolveFailure::Infeasible)
        }
        HighsModelStatus::ReachedTimeLimit
        | HighsModelStatus::ReachedIterationLimit => {
            Err(SolveFailure::TimedOut {
                seconds: time_limit,
            })
        }
        other => Err(SolveFailure::Numerical {
            reason: format!("HiGHS finished with status {other:?}"),
        }),
    }
}

trait HighsOptionValue {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> c_int;
}

impl HighsOptionValue for bool {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> c_int {
        Highs_setBoolOptionValue(highs, option, if self { 1 } else { 0 })
    }
}

impl HighsOptionValue for i32 {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> c_int {
        Highs_setIntOptionValue(highs, option, self)
    }
}

impl HighsOptionValue for f64 {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> c_int {
        Highs_setDoubleOptionValue(highs, option, self)
    }
}

impl<'a> HighsOptionValue for &'a str {
    unsafe fn apply_to_highs(
        self,
        highs: *mut c_void,
        option: *const c_char,
    ) -> c_int {
        match CString::new(self) {
            Ok(value) => {
                Highs_setStringOptionValue(highs, option, value.as_ptr())
            }
            Err(_) => STATUS_ERROR,
        }
    }
}

fn numerical(msg: impl Into<String>) -> SolveFailure {
    SolveFailure::Numerical { reason: msg.into() }
}

fn c(n: usize) -> Result<HighsInt, SolveFailure> {
    n.try_into()
        .map_err(|_| numerical(format!("{n} is too large for HiGHS")))
}

fn try_handle_status(
    status: c_int,
    msg: &str,
) -> Result<HighsStatus, SolveFailure> {
    let status_enum = HighsStatus::try_from(status)
        .map_err(|e| numerical(format!("{msg}: {e:?}")))?;
    match status_enum {
        status @ HighsStatus::OK => Ok(status),
        status @ HighsStatus::Warning => {
            warn!("HiGHS emitted a warning: {}", msg);
            Ok(status)
        }
        HighsStatus::Error => Err(numerical(format!("{msg} failed"))),
    }
}

macro_rules! highs_call {
    ($function_name:ident ($($param:expr),+)) => {
        try_handle_status(
            $function_name($($param),+),
            stringify!($function_name)
        )
    }
}

#[derive(Debug)]
struct HighsPtr(*mut c_void);

impl Drop for HighsPtr {
    fn drop(&mut self) {
        unsafe { Highs_destroy(self.0) }
    }
}

impl HighsPtr {
    fn try_new() -> Result<Self, SolveFailure> {
        let ptr = unsafe { Highs_create() };
        if ptr.is_null() {
            return Err(SolveFailure::SolverUnavailable {
                solver: "highs".to_string(),
                reason: "could not create a HiGHS instance".to_string(),
            });
        }
        Ok(Self(ptr))
    }

    fn mut_ptr(&mut self) -> *mut c_void {
        self.0
    }

    /// Prevents writing anything to the standard output when solving the model
    fn make_quiet(&mut self) -> Result<(), SolveFailure> {
        // setting log_file seems to cause a double free in Highs.
        // See https://github.com/rust-or/highs/issues/3
        self.set_option("output_flag", false)?;
        self.set_option("log_to_console", false)
    }

    fn set_option<V: HighsOptionValue>(
        &mut self,
        option: &str,
        value: V,
    ) -> Result<(), SolveFailure> {
        let c_str = CString::new(option)
            .map_err(|_| numerical(format!("invalid option name {option}")))?;
        let status =
            unsafe { value.apply_to_highs(self.mut_ptr(), c_str.as_ptr()) };
        try_handle_status(status, "Highs_setOptionValue")?;
        Ok(())
    }

    fn num_cols(&self) -> usize {
        let n = unsafe { Highs_getNumCols(self.0) };
        n.try_into().unwrap_or(0)
    }

    fn num_rows(&self) -> usize {
        let n = unsafe { Highs_getNumRows(self.0) };
        n.try_into().unwrap_or(0)
    }
}

/// Compressed sparse column form of the constraint matrix.
fn to_compressed_matrix_form(
    problem: &LinearProgram,
) -> Result<(Vec<HighsInt>, Vec<HighsInt>, Vec<f64>), SolveFailure> {
    let mut astart = Vec::with_capacity(problem.num_col + 1);
    astart.push(0);
    let mut aindex = Vec::with_capacity(problem.num_nz);
    let mut avalue = Vec::with_capacity(problem.num_nz);
    for (row_indices, factors) in problem.columns.iter() {
        for row in row_indices.iter() {
            aindex.push(c(*row)?);
        }
        avalue.extend_from_slice(factors);
        astart.push(c(aindex.len())?);
    }
    Ok((astart, aindex, avalue))
}

/// A loaded model, ready to be solved.
#[derive(Debug)]
struct Model {
    highs: HighsPtr,
}

impl Model {
    fn try_new(problem: &LinearProgram) -> Result<Self, SolveFailure> {
        let mut highs = HighsPtr::try_new()?;
        highs.make_quiet()?;
        let offset = 0.0;
        let (astart, aindex, avalue) = to_compressed_matrix_form(problem)?;
        unsafe {
            highs_call!(Highs_passLp(
                highs.mut_ptr(),
                c(problem.num_col)?,
                c(problem.num_row)?,
                c(problem.num_nz)?,
                MATRIX_FORMAT_COLUMN_WISE,
                OBJECTIVE_SENSE_MINIMIZE,
                offset,
                problem.col_cost.as_ptr(),
                problem.col_lower.as_ptr(),
                problem.col_upper.as_ptr(),
                problem.row_lower.as_ptr(),
                problem.row_upper.as_ptr(),
                astart.as_ptr(),
                aindex.as_ptr(),
                avalue.as_ptr()
            ))?;
        }
        Ok(Self { highs })
    }

    fn set_options(
        &mut self,
        options: &SolverOptions,
    ) -> Result<(), SolveFailure> {
        let tolerance = options.feasibility_tolerance;
        self.highs.set_option("solver", "simplex")?;
        self.highs.set_option("parallel", "off")?;
        self.highs.set_option("threads", 1)?;
        self.highs.set_option("primal_feasibility_tolerance", tolerance)?;
        self.highs.set_option("dual_feasibility_tolerance", tolerance)?;
        self.highs.set_option("time_limit", options.time_limit)
    }

    fn try_solve(&mut self) -> Result<(), SolveFailure> {
        unsafe { highs_call!(Highs_run(self.highs.mut_ptr())) }?;
        Ok(())
    }

    fn status(&mut self) -> Result<HighsModelStatus, SolveFailure> {
        let model_status =
            unsafe { Highs_getModelStatus(self.highs.mut_ptr()) };
        HighsModelStatus::try_from(model_status)
            .map_err(|e| numerical(format!("{e:?}")))
    }

    fn get_solution(&mut self) -> LpSolution {
        let cols = self.highs.num_cols();
        let rows = self.highs.num_rows();
        let mut colvalue: Vec<f64> = vec![0.; cols];
        let mut coldual: Vec<f64> = vec![0.; cols];
        let mut rowvalue: Vec<f64> = vec![0.; rows];
        let mut rowdual: Vec<f64> = vec![0.; rows];

        unsafe {
            Highs_getSolution(
                self.highs.mut_ptr(),
                colvalue.as_mut_ptr(),
                coldual.as_mut_ptr(),
                rowvalue.as_mut_ptr(),
                rowdual.as_mut_ptr(),
            );
        }
        let objective =
            unsafe { Highs_getObjectiveValue(self.highs.mut_ptr()) };

        LpSolution {
            col_values: colvalue,
            row_duals: rowdual,
            objective,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HighsSolver {
    options: SolverOptions,
}

impl HighsSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl LinearSolver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(
        &self,
        problem: &LinearProgram,
    ) -> Result<LpSolution, SolveFailure> {
        let mut model = Model::try_new(problem)?;
        model.set_options(&self.options)?;
        debug!(
            columns = problem.num_col,
            rows = problem.num_row,
            nonzeros = problem.num_nz,
            "running HiGHS"
        );
        model.try_solve()?;
        classify(model.status()?, self.options.time_limit)?;
        Ok(model.get_solution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_small_problem() {
        let mut pb = LinearProgram::new();
        let x = pb.add_column(1.0, 0.0..10.0);
        let y = pb.add_column(2.0, 0.0..10.0);
        pb.add_row(12.0..=12.0, &[(x, 1.0), (y, 1.0)]);
        let solution = HighsSolver::default().solve(&pb).unwrap();
        assert!((solution.col_values[x] - 10.0).abs() < 1e-9);
        assert!((solution.col_values[y] - 2.0).abs() < 1e-9);
        assert!((solution.objective - 14.0).abs() < 1e-9);
        assert_eq!(solution.row_duals.len(), 1);
    }

    #[test]
    fn test_infeasible_problem_is_reported() {
        let mut pb = LinearProgram::new();
        let x = pb.add_column(1.0, 0.0..1.0);
        pb.add_row(5.0..=5.0, &[(x, 1.0)]);
        assert_eq!(
            HighsSolver::default().solve(&pb).unwrap_err(),
            SolveFailure::Infeasible
        );
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(classify(HighsModelStatus::Optimal, 10.0), Ok(()));
        assert_eq!(
            classify(HighsModelStatus::UnboundedOrInfeasible, 10.0),
            Err(SolveFailure::Infeasible)
        );
        assert_eq!(
            classify(HighsModelStatus::ReachedTimeLimit, 10.0),
            Err(SolveFailure::TimedOut { seconds: 10.0 })
        );
        assert!(matches!(
            classify(HighsModelStatus::SolveError, 10.0),
            Err(SolveFailure::Numerical { .. })
        ));
    }

    #[test]
    fn test_model_status_from_raw() {
        assert_eq!(
            HighsModelStatus::try_from(MODEL_STATUS_OPTIMAL),
            Ok(HighsModelStatus::Optimal)
        );
        assert!(HighsModelStatus::try_from(-42).is_err());
    }
}
