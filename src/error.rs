use crate::engine::BacktestState;
use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BacktestError>;

//every failure the engine can surface
//none of these are retried, they all mean the input is structurally wrong
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("symbol {symbol} not found in dataset")]
    DataNotFound { symbol: String },

    #[error("no rows for {symbol} between {start} and {end}")]
    EmptyRange {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("window of {window} needs more data than the {available} rows available")]
    InsufficientWindow { window: usize, available: usize },

    #[error("regression design matrix with {lags} lag(s) is rank-deficient")]
    SingularFit { lags: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("cannot {operation} while backtest is {state:?}")]
    NotReady {
        operation: &'static str,
        state: BacktestState,
    },

    #[error("optimization failed at grid point {point:?}: {source}")]
    OptimizationFailed {
        point: Vec<usize>,
        #[source]
        source: Box<BacktestError>,
    },

    #[error("invalid data at row {row}: {reason}")]
    InvalidData { row: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        BacktestError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_failure_names_the_point() {
        let err = BacktestError::OptimizationFailed {
            point: vec![3, 7],
            source: Box::new(BacktestError::SingularFit { lags: 3 }),
        };
        let msg = err.to_string();
        assert!(msg.contains("[3, 7]"));
        assert!(msg.contains("rank-deficient"));
    }

    #[test]
    fn invalid_helper_builds_parameter_error() {
        let err = BacktestError::invalid("lags", "must be positive");
        assert!(matches!(
            err,
            BacktestError::InvalidParameter { name: "lags", .. }
        ));
    }
}
