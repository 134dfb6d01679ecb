use crate::config::StrategyParams;
use crate::data::{DateRange, MarketData, SeriesLoader};
use crate::engine::optimizer::{optimize, ParamRange};
use crate::error::{BacktestError, Result};
use crate::metrics::{evaluate, BacktestSummary, CumulativeSeries, PerformanceResult};
use crate::strategy::{Indicators, SignalFrame};
use std::sync::Arc;
use tracing::{debug, info};

//configuration for a backtest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestConfig {
    pub amount: f64,
    pub transaction_cost: f64,
    pub parallel: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            amount: 10000.0,
            transaction_cost: 0.0,
            parallel: true,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(BacktestError::invalid(
                "amount",
                format!("{} is not a positive amount", self.amount),
            ));
        }
        if !self.transaction_cost.is_finite() || self.transaction_cost < 0.0 {
            return Err(BacktestError::invalid(
                "transaction_cost",
                format!("{} is not a non-negative cost", self.transaction_cost),
            ));
        }
        Ok(())
    }
}

//lifecycle of a backtester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestState {
    Uninitialized,
    Loaded,
    Parameterized,
    Evaluated,
}

//result of a backtest
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub params: StrategyParams,
    pub frame: SignalFrame,
    pub cumulative: CumulativeSeries,
    pub result: PerformanceResult,
}

impl BacktestRun {
    pub fn summary(&self, amount: f64) -> BacktestSummary {
        BacktestSummary::from_backtest(&self.cumulative, &self.result, amount)
    }
}

//best parameters found by a grid search, already applied to the backtester
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub params: StrategyParams,
    pub point: Vec<usize>,
    //performance of the best point, the negated objective
    pub performance: f64,
}

//runs one backtest without touching any backtester state
pub fn run_backtest(
    data: &MarketData,
    params: &StrategyParams,
    config: &BacktestConfig,
) -> Result<BacktestRun> {
    config.validate()?;
    let frame = params.compute_position(data)?;
    let (cumulative, result) = evaluate(&frame, config.transaction_cost, config.amount)?;

    Ok(BacktestRun {
        params: params.clone(),
        frame,
        cumulative,
        result,
    })
}

#[derive(Debug, Clone)]
struct Prepared {
    params: StrategyParams,
    indicators: Indicators,
}

//stateful backtester holding the loaded series and the latest run
pub struct Backtester {
    config: BacktestConfig,
    data: Option<Arc<MarketData>>,
    prepared: Option<Prepared>,
    latest: Option<BacktestRun>,
}

impl Backtester {
    //creates a new backtester without data
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Backtester {
            config,
            data: None,
            prepared: None,
            latest: None,
        })
    }

    pub fn with_data(config: BacktestConfig, data: MarketData) -> Result<Self> {
        let mut backtester = Backtester::new(config)?;
        backtester.set_data(data);
        Ok(backtester)
    }

    //loads one symbol over the range, dropping any parameters and results
    pub fn load(&mut self, loader: &SeriesLoader, symbol: &str, range: &DateRange) -> Result<()> {
        let data = loader.load(symbol, range)?;
        self.set_data(data);
        Ok(())
    }

    pub fn set_data(&mut self, data: MarketData) {
        info!(
            symbol = data.symbol(),
            rows = data.prices().len(),
            "market data loaded"
        );
        self.data = Some(Arc::new(data));
        self.prepared = None;
        self.latest = None;
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn state(&self) -> BacktestState {
        match (&self.data, &self.prepared, &self.latest) {
            (None, _, _) => BacktestState::Uninitialized,
            (Some(_), None, _) => BacktestState::Loaded,
            (Some(_), Some(_), None) => BacktestState::Parameterized,
            (Some(_), Some(_), Some(_)) => BacktestState::Evaluated,
        }
    }

    pub fn data(&self) -> Option<&MarketData> {
        self.data.as_deref()
    }

    pub fn parameters(&self) -> Option<&StrategyParams> {
        self.prepared.as_ref().map(|p| &p.params)
    }

    //validates the parameters and recomputes the indicators that depend on them
    //on error the previous parameters, indicators and results stay in place
    pub fn set_parameters(&mut self, params: StrategyParams) -> Result<()> {
        let data = self.require_data("set parameters")?;
        let previous = self
            .prepared
            .as_ref()
            .map(|p| (&p.params, &p.indicators));
        let indicators = params.refresh_indicators(&data, previous)?;

        debug!(strategy = params.name(), params = ?params.named(), "parameters set");
        self.prepared = Some(Prepared { params, indicators });
        self.latest = None;
        Ok(())
    }

    //runs the strategy with the current parameters
    pub fn run_strategy(&mut self) -> Result<&BacktestRun> {
        let data = self.require_data("run strategy")?;
        let prepared = self.prepared.as_ref().ok_or(BacktestError::NotReady {
            operation: "run strategy",
            state: self.state(),
        })?;

        let frame = prepared.params.compute_positions(&data, &prepared.indicators)?;
        let (cumulative, result) =
            evaluate(&frame, self.config.transaction_cost, self.config.amount)?;

        info!(
            strategy = prepared.params.name(),
            performance = result.performance,
            outperformance = result.outperformance,
            "backtest finished"
        );

        let run = BacktestRun {
            params: prepared.params.clone(),
            frame,
            cumulative,
            result,
        };
        let run: &BacktestRun = self.latest.insert(run);
        Ok(run)
    }

    //sets the parameters and runs them
    pub fn run_with(&mut self, params: StrategyParams) -> Result<&BacktestRun> {
        self.set_parameters(params)?;
        self.run_strategy()
    }

    //latest evaluated run, None until the strategy has been run
    pub fn results(&self) -> Option<&BacktestRun> {
        self.latest.as_ref()
    }

    //grid searches the current strategy's integer parameters for the best performance
    //the winning parameters are set and run before returning
    pub fn optimize_parameters(&mut self, ranges: &[ParamRange]) -> Result<OptimizationResult> {
        let data = self.require_data("optimize parameters")?;
        let base = self
            .parameters()
            .cloned()
            .ok_or(BacktestError::NotReady {
                operation: "optimize parameters",
                state: self.state(),
            })?;
        if ranges.len() > base.grid_dimensions() {
            return Err(BacktestError::invalid(
                "ranges",
                format!(
                    "{} accepts at most {} range(s), got {}",
                    base.name(),
                    base.grid_dimensions(),
                    ranges.len()
                ),
            ));
        }

        let config = self.config;
        info!(strategy = base.name(), ranges = ?ranges, "optimization started");

        let optimum = optimize(ranges, config.parallel, |point| {
            let params = base.with_grid_point(point)?;
            let run = run_backtest(&data, &params, &config)?;
            Ok(-run.result.performance)
        })?;

        let params = base.with_grid_point(&optimum.point)?;
        self.run_with(params.clone())?;

        info!(
            point = ?optimum.point,
            performance = -optimum.score,
            "optimization finished"
        );

        Ok(OptimizationResult {
            params,
            point: optimum.point,
            performance: -optimum.score,
        })
    }

    fn require_data(&self, operation: &'static str) -> Result<Arc<MarketData>> {
        self.data.clone().ok_or(BacktestError::NotReady {
            operation,
            state: self.state(),
        })
    }
}
