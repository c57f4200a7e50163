//! Typed failures of the pipeline. Configuration problems are detected while
//! the network is being built, solver problems while it is being solved, and
//! everything else comes from reading inputs or writing outputs.

use thiserror::Error;

/// The input tables or run options cannot describe a valid network.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no installed capacity for carrier `{carrier}`")]
    MissingCapacity { carrier: String },

    #[error("no marginal cost for carrier `{carrier}`")]
    MissingMarginalCost { carrier: String },

    #[error("invalid installed capacity {value} GW for carrier `{carrier}`")]
    InvalidCapacity { carrier: String, value: f64 },

    #[error("no regional capacity share for carrier `{carrier}`")]
    MissingRegionalShare { carrier: String },

    #[error("snapshot count {0} is outside 1..=8760")]
    InvalidSnapshots(usize),

    #[error("invalid start date `{value}` (expected YYYY-MM-DD)")]
    InvalidStartDate { value: String },
}

/// Why the dispatch problem could not be solved. Never retried internally.
#[derive(Debug, Error, PartialEq)]
pub enum SolveFailure {
    #[error("the dispatch problem is infeasible")]
    Infeasible,

    #[error("solver `{solver}` is unavailable: {reason}")]
    SolverUnavailable { solver: String, reason: String },

    #[error("numerical failure: {reason}")]
    Numerical { reason: String },

    #[error("solver stopped after reaching its limit of {seconds} s")]
    TimedOut { seconds: f64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solve(#[from] SolveFailure),

    #[error("could not read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse `{path}`: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_the_carrier() {
        let err = ConfigError::MissingMarginalCost {
            carrier: "geothermal".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no marginal cost for carrier `geothermal`"
        );
    }

    #[test]
    fn test_solve_failure_converts_into_error() {
        let err: Error = SolveFailure::Infeasible.into();
        assert!(matches!(err, Error::Solve(SolveFailure::Infeasible)));
        assert_eq!(err.to_string(), "the dispatch problem is infeasible");
    }
}
