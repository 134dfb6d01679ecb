use crate::data::DateRange;
use crate::engine::BacktestConfig;
use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SmaCrossover,
    Momentum,
    MeanReversion,
    LinearRegression,
}

impl StrategyType {
    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            "mom" | "momentum" => Some(StrategyType::Momentum),
            "mr" | "meanrev" | "mean_reversion" => Some(StrategyType::MeanReversion),
            "lr" | "linreg" | "linear_regression" => Some(StrategyType::LinearRegression),
            _ => None,
        }
    }
}

//sma crossover strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmaParams {
    #[serde(alias = "sma1", alias = "SMA1")]
    pub fast_window: usize,
    #[serde(alias = "sma2", alias = "SMA2")]
    pub slow_window: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            fast_window: 42,
            slow_window: 252,
        }
    }
}

//momentum strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumParams {
    #[serde(alias = "momentum")]
    pub window: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        MomentumParams { window: 1 }
    }
}

//mean reversion strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanReversionParams {
    #[serde(alias = "sma", alias = "SMA")]
    pub window: usize,
    pub threshold: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        MeanReversionParams {
            window: 25,
            threshold: 5.0,
        }
    }
}

//linear regression strategy parameters
//the model is fitted on fit_range and traded on predict_range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionParams {
    pub lags: usize,
    pub fit_range: DateRange,
    pub predict_range: DateRange,
}

//strategy-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    SmaCrossover(SmaParams),
    Momentum(MomentumParams),
    MeanReversion(MeanReversionParams),
    LinearRegression(LinearRegressionParams),
}

impl StrategyParams {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::SmaCrossover(_) => StrategyType::SmaCrossover,
            StrategyParams::Momentum(_) => StrategyType::Momentum,
            StrategyParams::MeanReversion(_) => StrategyType::MeanReversion,
            StrategyParams::LinearRegression(_) => StrategyType::LinearRegression,
        }
    }

    //parameter names and values in declaration order
    pub fn named(&self) -> IndexMap<&'static str, String> {
        let mut named = IndexMap::new();
        match self {
            StrategyParams::SmaCrossover(p) => {
                named.insert("SMA1", p.fast_window.to_string());
                named.insert("SMA2", p.slow_window.to_string());
            }
            StrategyParams::Momentum(p) => {
                named.insert("momentum", p.window.to_string());
            }
            StrategyParams::MeanReversion(p) => {
                named.insert("SMA", p.window.to_string());
                named.insert("threshold", p.threshold.to_string());
            }
            StrategyParams::LinearRegression(p) => {
                named.insert("lags", p.lags.to_string());
                named.insert(
                    "fit_range",
                    format!("{}..={}", p.fit_range.start, p.fit_range.end),
                );
                named.insert(
                    "predict_range",
                    format!("{}..={}", p.predict_range.start, p.predict_range.end),
                );
            }
        }
        named
    }

    //number of integer parameters a grid search may vary
    pub fn grid_dimensions(&self) -> usize {
        match self {
            StrategyParams::SmaCrossover(_) | StrategyParams::MeanReversion(_) => 2,
            StrategyParams::Momentum(_) | StrategyParams::LinearRegression(_) => 1,
        }
    }

    //replaces the leading integer parameters with the grid point's coordinates
    //coordinates not covered by the point keep their current value
    pub fn with_grid_point(&self, point: &[usize]) -> Result<Self> {
        if point.is_empty() || point.len() > self.grid_dimensions() {
            return Err(BacktestError::invalid(
                "ranges",
                format!(
                    "{} range(s) given, strategy accepts 1 to {}",
                    point.len(),
                    self.grid_dimensions()
                ),
            ));
        }

        let mut params = self.clone();
        match &mut params {
            StrategyParams::SmaCrossover(p) => {
                p.fast_window = point[0];
                if let Some(&slow) = point.get(1) {
                    p.slow_window = slow;
                }
            }
            StrategyParams::Momentum(p) => p.window = point[0],
            StrategyParams::MeanReversion(p) => {
                p.window = point[0];
                if let Some(&threshold) = point.get(1) {
                    p.threshold = threshold as f64;
                }
            }
            StrategyParams::LinearRegression(p) => p.lags = point[0],
        }
        Ok(params)
    }
}

//explicit dataset location handed to the series loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub data_path: PathBuf,

    //drop rows with a missing value in any column, not just the requested symbol
    #[serde(default = "default_drop_incomplete_rows")]
    pub drop_incomplete_rows: bool,
}

fn default_drop_incomplete_rows() -> bool {
    true
}

impl LoaderConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        LoaderConfig {
            data_path: data_path.into(),
            drop_incomplete_rows: true,
        }
    }
}

//complete backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfiguration {
    //data
    pub data: LoaderConfig,
    pub symbol: String,
    pub range: DateRange,

    //cost model
    pub amount: f64,
    pub transaction_cost: f64,

    //evaluate grid points on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    //strategy
    pub strategy: StrategyParams,
}

fn default_parallel() -> bool {
    true
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            data: LoaderConfig::new("data/eod_data.csv"),
            symbol: "EUR=".to_string(),
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default(),
                NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
            ),
            amount: 10000.0,
            transaction_cost: 0.0,
            parallel: true,
            strategy: StrategyParams::SmaCrossover(SmaParams::default()),
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    //the engine-facing part of the configuration
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            amount: self.amount,
            transaction_cost: self.transaction_cost,
            parallel: self.parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strategy_aliases() {
        assert_eq!(StrategyType::parse("SMA"), Some(StrategyType::SmaCrossover));
        assert_eq!(StrategyType::parse("momentum"), Some(StrategyType::Momentum));
        assert_eq!(
            StrategyType::parse("mean_reversion"),
            Some(StrategyType::MeanReversion)
        );
        assert_eq!(
            StrategyType::parse("linreg"),
            Some(StrategyType::LinearRegression)
        );
        assert_eq!(StrategyType::parse("rsi"), None);
    }

    #[test]
    fn grid_point_overrides_leading_parameters() {
        let params = StrategyParams::SmaCrossover(SmaParams {
            fast_window: 10,
            slow_window: 50,
        });

        let one = params.with_grid_point(&[20]).unwrap();
        assert_eq!(
            one,
            StrategyParams::SmaCrossover(SmaParams {
                fast_window: 20,
                slow_window: 50
            })
        );

        let two = params.with_grid_point(&[20, 80]).unwrap();
        assert_eq!(
            two,
            StrategyParams::SmaCrossover(SmaParams {
                fast_window: 20,
                slow_window: 80
            })
        );

        assert!(params.with_grid_point(&[1, 2, 3]).is_err());
        let momentum = StrategyParams::Momentum(MomentumParams { window: 3 });
        assert!(momentum.with_grid_point(&[1, 2]).is_err());
    }

    #[test]
    fn named_parameters_keep_order() {
        let params = StrategyParams::MeanReversion(MeanReversionParams {
            window: 25,
            threshold: 7.5,
        });
        let named = params.named();
        let keys: Vec<_> = named.keys().copied().collect();
        assert_eq!(keys, vec!["SMA", "threshold"]);
        assert_eq!(named["threshold"], "7.5");
    }

    #[test]
    fn configuration_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = BacktestConfiguration {
            strategy: StrategyParams::Momentum(MomentumParams { window: 3 }),
            transaction_cost: 0.001,
            ..BacktestConfiguration::default()
        };
        config.to_json_file(&path).unwrap();

        let loaded = BacktestConfiguration::from_json_file(&path).unwrap();
        assert_eq!(loaded.strategy, config.strategy);
        assert_eq!(loaded.symbol, "EUR=");
        assert!((loaded.transaction_cost - 0.001).abs() < f64::EPSILON);
    }

    #[test]
    fn strategy_params_accept_upper_case_aliases() {
        let json = r#"{"type": "sma_crossover", "SMA1": 20, "SMA2": 100}"#;
        let params: StrategyParams = serde_json::from_str(json).unwrap();
        assert_eq!(
            params,
            StrategyParams::SmaCrossover(SmaParams {
                fast_window: 20,
                slow_window: 100
            })
        );
    }
}
