//a vectorized backtesting engine for directional strategies on a single price series

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfiguration, LinearRegressionParams, LoaderConfig, MeanReversionParams,
        MomentumParams, SmaParams, StrategyParams, StrategyType,
    };
    pub use crate::data::{DateRange, MarketData, PriceSeries, ReturnSeries, SeriesLoader};
    pub use crate::engine::{
        run_backtest, BacktestConfig, BacktestRun, BacktestState, Backtester, OptimizationResult,
        ParamRange,
    };
    pub use crate::error::{BacktestError, Result};
    pub use crate::logging::init_logging;
    pub use crate::metrics::{BacktestSummary, CumulativeSeries, PerformanceResult};
    pub use crate::model::{RegressionFitter, RegressionModel};
    pub use crate::strategy::{Indicators, Position, SignalFrame, SignalGenerator};
}
