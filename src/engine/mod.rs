pub mod backtest;
pub mod optimizer;

pub use backtest::{
    run_backtest, BacktestConfig, BacktestRun, BacktestState, Backtester, OptimizationResult,
};
pub use optimizer::{grid_points, optimize, GridOptimum, ParamRange};
