pub mod linear_regression;
pub mod mean_reversion;
pub mod momentum;
pub mod sma_crossover;

use crate::config::StrategyParams;
use crate::data::MarketData;
use crate::error::{BacktestError, Result};
use crate::model::RegressionModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use mean_reversion::MeanReversionIndicators;
pub use sma_crossover::SmaIndicators;

//indicator values aligned to the return series, None while a window fills up
pub type IndicatorSeries = Vec<Option<f64>>;

//directional stance held over the next period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Short,
    Flat,
    Long,
}

impl Position {
    //sign of value, zero maps to flat
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Position::Long
        } else if value < 0.0 {
            Position::Short
        } else {
            Position::Flat
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Position::Short => -1.0,
            Position::Flat => 0.0,
            Position::Long => 1.0,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Position::Flat
    }
}

//returns and the positions decided at the same timestamps
//positions[t] only uses information up to t and is applied to returns[t + 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    timestamps: Vec<DateTime<Utc>>,
    returns: Vec<f64>,
    positions: Vec<Position>,
    //buy-and-hold compounds returns[0] as well, not just the shifted rows
    first_return_in_baseline: bool,
}

impl SignalFrame {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        returns: Vec<f64>,
        positions: Vec<Position>,
    ) -> Result<Self> {
        if timestamps.len() != returns.len() || returns.len() != positions.len() {
            return Err(BacktestError::invalid(
                "positions",
                format!(
                    "{} timestamps, {} returns and {} positions are not aligned",
                    timestamps.len(),
                    returns.len(),
                    positions.len()
                ),
            ));
        }

        Ok(SignalFrame {
            timestamps,
            returns,
            positions,
            first_return_in_baseline: false,
        })
    }

    pub fn with_first_return_in_baseline(mut self) -> Self {
        self.first_return_in_baseline = true;
        self
    }

    pub fn first_return_in_baseline(&self) -> bool {
        self.first_return_in_baseline
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

//a rule that turns market data into positions
//indicators are split from positions so parameter changes can reuse them
pub trait SignalGenerator {
    type Indicators: Clone + Debug + PartialEq;

    //returns the strategy name
    fn name(&self) -> &'static str;

    //rejects parameters no backtest can run with
    fn validate(&self) -> Result<()>;

    fn compute_indicators(&self, data: &MarketData) -> Result<Self::Indicators>;

    fn compute_positions(
        &self,
        data: &MarketData,
        indicators: &Self::Indicators,
    ) -> Result<SignalFrame>;

    //indicators and positions in one go
    fn compute_position(&self, data: &MarketData) -> Result<SignalFrame> {
        self.validate()?;
        let indicators = self.compute_indicators(data)?;
        self.compute_positions(data, &indicators)
    }
}

//indicators of whichever strategy produced them
#[derive(Debug, Clone, PartialEq)]
pub enum Indicators {
    SmaCrossover(SmaIndicators),
    Momentum(IndicatorSeries),
    MeanReversion(MeanReversionIndicators),
    LinearRegression(RegressionModel),
}

impl StrategyParams {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyParams::SmaCrossover(p) => p.name(),
            StrategyParams::Momentum(p) => p.name(),
            StrategyParams::MeanReversion(p) => p.name(),
            StrategyParams::LinearRegression(p) => p.name(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyParams::SmaCrossover(p) => p.validate(),
            StrategyParams::Momentum(p) => p.validate(),
            StrategyParams::MeanReversion(p) => p.validate(),
            StrategyParams::LinearRegression(p) => p.validate(),
        }
    }

    pub fn compute_indicators(&self, data: &MarketData) -> Result<Indicators> {
        self.validate()?;
        Ok(match self {
            StrategyParams::SmaCrossover(p) => Indicators::SmaCrossover(p.compute_indicators(data)?),
            StrategyParams::Momentum(p) => Indicators::Momentum(p.compute_indicators(data)?),
            StrategyParams::MeanReversion(p) => {
                Indicators::MeanReversion(p.compute_indicators(data)?)
            }
            StrategyParams::LinearRegression(p) => {
                Indicators::LinearRegression(p.compute_indicators(data)?)
            }
        })
    }

    //recomputes indicators after a parameter change
    //series whose window did not change are taken over from the previous set
    pub fn refresh_indicators(
        &self,
        data: &MarketData,
        previous: Option<(&StrategyParams, &Indicators)>,
    ) -> Result<Indicators> {
        self.validate()?;
        match (self, previous) {
            (
                StrategyParams::SmaCrossover(p),
                Some((StrategyParams::SmaCrossover(old), Indicators::SmaCrossover(ind))),
            ) => Ok(Indicators::SmaCrossover(p.refresh(data, old, ind)?)),
            (
                StrategyParams::MeanReversion(p),
                Some((StrategyParams::MeanReversion(old), Indicators::MeanReversion(ind))),
            ) if p.window == old.window => Ok(Indicators::MeanReversion(ind.clone())),
            _ => self.compute_indicators(data),
        }
    }

    pub fn compute_positions(
        &self,
        data: &MarketData,
        indicators: &Indicators,
    ) -> Result<SignalFrame> {
        match (self, indicators) {
            (StrategyParams::SmaCrossover(p), Indicators::SmaCrossover(i)) => {
                p.compute_positions(data, i)
            }
            (StrategyParams::Momentum(p), Indicators::Momentum(i)) => p.compute_positions(data, i),
            (StrategyParams::MeanReversion(p), Indicators::MeanReversion(i)) => {
                p.compute_positions(data, i)
            }
            (StrategyParams::LinearRegression(p), Indicators::LinearRegression(i)) => {
                p.compute_positions(data, i)
            }
            _ => Err(BacktestError::invalid(
                "indicators",
                format!("indicators were not computed for {}", self.name()),
            )),
        }
    }

    pub fn compute_position(&self, data: &MarketData) -> Result<SignalFrame> {
        let indicators = self.compute_indicators(data)?;
        self.compute_positions(data, &indicators)
    }
}

//rolling mean ending at each index, None until the window is full
//every window is summed on its own so equal inputs give bit-equal means
pub fn rolling_mean(values: &[f64], window: usize) -> IndicatorSeries {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &values[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

//rolling mean over prices, re-aligned to the return series
pub(crate) fn price_rolling_mean(data: &MarketData, window: usize) -> Result<IndicatorSeries> {
    let prices = data.prices().prices();
    if window > prices.len() {
        return Err(BacktestError::InsufficientWindow {
            window,
            available: prices.len(),
        });
    }

    let mut mean = rolling_mean(&prices, window);
    mean.remove(0);
    Ok(mean)
}

pub(crate) fn require_positive(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(BacktestError::invalid(name, "must be positive"));
    }
    Ok(())
}

//frame over the return rows from start onwards
//at least two rows are needed to apply one shifted position
pub(crate) fn frame_from(
    data: &MarketData,
    start: usize,
    positions: Vec<Position>,
    window: usize,
) -> Result<SignalFrame> {
    let rows = &data.returns().points()[start.min(data.returns().len())..];
    if rows.len() < 2 {
        return Err(BacktestError::InsufficientWindow {
            window,
            available: data.prices().len(),
        });
    }

    SignalFrame::new(
        rows.iter().map(|r| r.timestamp).collect(),
        rows.iter().map(|r| r.log_return).collect(),
        positions,
    )
}
