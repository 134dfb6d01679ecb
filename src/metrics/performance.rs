use crate::error::{BacktestError, Result};
use crate::strategy::{Position, SignalFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//final strategy value and its edge over buy-and-hold, both rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub performance: f64,
    pub outperformance: f64,
}

//one evaluated period of the cumulative curves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub timestamp: DateTime<Utc>,
    pub log_return: f64,
    //position decided at this timestamp, earning the next period's return
    pub position: Position,
    //position decided one period earlier, earning this period's return
    pub held: Position,
    //held * log_return net of transaction cost
    pub strategy_return: f64,
    pub trade: bool,
    pub cum_returns: f64,
    pub cum_strategy: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CumulativeSeries {
    points: Vec<CumulativePoint>,
}

impl CumulativeSeries {
    pub fn points(&self) -> &[CumulativePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&CumulativePoint> {
        self.points.last()
    }

    pub fn strategy_returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.strategy_return).collect()
    }

    pub fn num_trades(&self) -> usize {
        self.points.iter().filter(|p| p.trade).count()
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//compounds the shifted positions against the returns of the frame
//
//strategy[t] = position[t-1] * return[t], minus transaction_cost whenever
//position[t] != position[t-1]; the first row has no predecessor so it only
//seeds the first held position and is neither traded nor compounded.
//both curves start from amount and compound log returns via exp(cumsum).
//frames marked with first_return_in_baseline also compound returns[0] into
//buy-and-hold.
pub fn evaluate(
    frame: &SignalFrame,
    transaction_cost: f64,
    amount: f64,
) -> Result<(CumulativeSeries, PerformanceResult)> {
    if frame.len() < 2 {
        return Err(BacktestError::InsufficientWindow {
            window: 2,
            available: frame.len(),
        });
    }

    let timestamps = frame.timestamps();
    let returns = frame.returns();
    let positions = frame.positions();

    let mut points = Vec::with_capacity(frame.len() - 1);
    let mut sum_returns = if frame.first_return_in_baseline() {
        returns[0]
    } else {
        0.0
    };
    let mut sum_strategy = 0.0;

    for t in 1..frame.len() {
        let held = positions[t - 1];
        let trade = positions[t] != held;

        let mut strategy_return = held.as_f64() * returns[t];
        if trade {
            strategy_return -= transaction_cost;
        }

        sum_returns += returns[t];
        sum_strategy += strategy_return;

        points.push(CumulativePoint {
            timestamp: timestamps[t],
            log_return: returns[t],
            position: positions[t],
            held,
            strategy_return,
            trade,
            cum_returns: amount * sum_returns.exp(),
            cum_strategy: amount * sum_strategy.exp(),
        });
    }

    let final_strategy = amount * sum_strategy.exp();
    let final_returns = amount * sum_returns.exp();
    let result = PerformanceResult {
        performance: round_cents(final_strategy),
        outperformance: round_cents(final_strategy - final_returns),
    };

    Ok((CumulativeSeries { points }, result))
}
