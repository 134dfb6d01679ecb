pub mod backtest_config;

pub use backtest_config::{
    BacktestConfiguration, LinearRegressionParams, LoaderConfig, MeanReversionParams,
    MomentumParams, SmaParams, StrategyParams, StrategyType,
};
