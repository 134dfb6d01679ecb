use crate::config::SmaParams;
use crate::data::MarketData;
use crate::error::{BacktestError, Result};
use crate::strategy::{
    frame_from, price_rolling_mean, require_positive, IndicatorSeries, Position, SignalFrame,
    SignalGenerator,
};
use tracing::debug;

//fast and slow price means aligned to the return series
#[derive(Debug, Clone, PartialEq)]
pub struct SmaIndicators {
    pub fast: IndicatorSeries,
    pub slow: IndicatorSeries,
}

impl SmaParams {
    //reuses whichever mean was already computed for an unchanged window
    pub fn refresh(
        &self,
        data: &MarketData,
        previous: &SmaParams,
        indicators: &SmaIndicators,
    ) -> Result<SmaIndicators> {
        let reuse = |window: usize| -> Result<IndicatorSeries> {
            if window == previous.fast_window {
                Ok(indicators.fast.clone())
            } else if window == previous.slow_window {
                Ok(indicators.slow.clone())
            } else {
                debug!(window, "recomputing moving average");
                price_rolling_mean(data, window)
            }
        };

        Ok(SmaIndicators {
            fast: reuse(self.fast_window)?,
            slow: reuse(self.slow_window)?,
        })
    }
}

//long while the fast mean is strictly above the slow mean, short otherwise
//there is no flat state, equal means are short
impl SignalGenerator for SmaParams {
    type Indicators = SmaIndicators;

    fn name(&self) -> &'static str {
        "SMA Crossover"
    }

    fn validate(&self) -> Result<()> {
        require_positive("SMA1", self.fast_window)?;
        require_positive("SMA2", self.slow_window)
    }

    fn compute_indicators(&self, data: &MarketData) -> Result<SmaIndicators> {
        Ok(SmaIndicators {
            fast: price_rolling_mean(data, self.fast_window)?,
            slow: price_rolling_mean(data, self.slow_window)?,
        })
    }

    fn compute_positions(
        &self,
        data: &MarketData,
        indicators: &SmaIndicators,
    ) -> Result<SignalFrame> {
        let window = self.fast_window.max(self.slow_window);
        let start = indicators
            .fast
            .iter()
            .zip(&indicators.slow)
            .position(|(f, s)| f.is_some() && s.is_some())
            .ok_or(BacktestError::InsufficientWindow {
                window,
                available: data.prices().len(),
            })?;

        let positions = indicators.fast[start..]
            .iter()
            .zip(&indicators.slow[start..])
            .map(|(fast, slow)| match (fast, slow) {
                (Some(fast), Some(slow)) if fast > slow => Position::Long,
                _ => Position::Short,
            })
            .collect();

        frame_from(data, start, positions, window)
    }
}
