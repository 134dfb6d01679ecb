use crate::config::StrategyParams;
use crate::metrics::performance::{CumulativeSeries, PerformanceResult};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

const PERIODS_PER_YEAR: f64 = 252.0;

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub amount: f64,
    pub baseline_final: f64,
    pub strategy_final: f64,
    pub performance: f64,
    pub outperformance: f64,
    pub periods: usize,
    pub num_trades: usize,
    pub exposure: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub annualized_volatility: f64,
}

impl BacktestSummary {
    //calculate summary metrics from the cumulative curves
    pub fn from_backtest(
        series: &CumulativeSeries,
        result: &PerformanceResult,
        amount: f64,
    ) -> Self {
        let (baseline_final, strategy_final) = series
            .last()
            .map(|p| (p.cum_returns, p.cum_strategy))
            .unwrap_or((amount, amount));

        let returns = series.strategy_returns();
        let equity: Vec<f64> = series.points().iter().map(|p| p.cum_strategy).collect();

        //share of periods with a position on
        let exposure = if series.is_empty() {
            0.0
        } else {
            let held = series.points().iter().filter(|p| !p.held.is_flat()).count();
            held as f64 / series.len() as f64
        };

        BacktestSummary {
            amount,
            baseline_final,
            strategy_final,
            performance: result.performance,
            outperformance: result.outperformance,
            periods: series.len(),
            num_trades: series.num_trades(),
            exposure,
            max_drawdown: max_drawdown(amount, &equity),
            sharpe_ratio: sharpe_ratio(&returns),
            annualized_volatility: annualized_volatility(&returns),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self, params: &StrategyParams) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        table.add_row(Row::new(vec![
            Cell::new("Strategy"),
            Cell::new(params.name()),
        ]));

        for (name, value) in params.named() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(&value)]));
        }

        table.add_row(Row::new(vec![
            Cell::new("Amount"),
            Cell::new(&format!("{:.2}", self.amount)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Buy and Hold"),
            Cell::new(&format!("{:.2}", self.baseline_final)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Performance"),
            Cell::new(&format!("{:.2}", self.performance)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Outperformance"),
            Cell::new(&format!("{:.2}", self.outperformance)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Periods"),
            Cell::new(&format!("{}", self.periods)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Number of Trades"),
            Cell::new(&format!("{}", self.num_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Exposure"),
            Cell::new(&format!("{:.2}%", self.exposure * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Max Drawdown"),
            Cell::new(&format!("{:.2}%", self.max_drawdown * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&format!("{:.3}", self.sharpe_ratio)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Annualized Volatility"),
            Cell::new(&format!("{:.2}%", self.annualized_volatility * 100.0)),
        ]));

        table.printstd();
    }
}

//largest peak to trough fall of the equity curve as a fraction of the peak
//the starting amount counts as the first peak
pub fn max_drawdown(amount: f64, equity: &[f64]) -> f64 {
    let mut peak = amount;
    let mut max_dd = 0.0_f64;

    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }

    max_dd
}

fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }

    //annualize assuming daily returns
    (mean / std_dev) * PERIODS_PER_YEAR.sqrt()
}

fn annualized_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    returns.std_dev() * PERIODS_PER_YEAR.sqrt()
}
