pub mod performance;
pub mod summary;

pub use performance::{evaluate, round_cents, CumulativePoint, CumulativeSeries, PerformanceResult};
pub use summary::{max_drawdown, BacktestSummary};
