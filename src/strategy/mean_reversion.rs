use crate::config::MeanReversionParams;
use crate::data::MarketData;
use crate::error::{BacktestError, Result};
use crate::strategy::{
    frame_from, require_positive, rolling_mean, IndicatorSeries, Position, SignalFrame,
    SignalGenerator,
};

//price mean and the distance of the price from it, aligned to the return series
//the mean only covers prices that close a return period, the first price is left out
#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionIndicators {
    pub mean: IndicatorSeries,
    pub distance: IndicatorSeries,
}

//bets on the price returning to its moving average
//short above mean + threshold, long below mean - threshold,
//flat on the row where the distance changes sign, otherwise hold
//buy-and-hold also earns the return of the first row, which only seeds a position
impl SignalGenerator for MeanReversionParams {
    type Indicators = MeanReversionIndicators;

    fn name(&self) -> &'static str {
        "Mean Reversion"
    }

    fn validate(&self) -> Result<()> {
        require_positive("SMA", self.window)?;
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(BacktestError::invalid(
                "threshold",
                format!("{} is not a non-negative number", self.threshold),
            ));
        }
        Ok(())
    }

    fn compute_indicators(&self, data: &MarketData) -> Result<MeanReversionIndicators> {
        let prices = data.closing_prices();
        if self.window > prices.len() {
            return Err(BacktestError::InsufficientWindow {
                window: self.window,
                available: prices.len(),
            });
        }

        let mean = rolling_mean(&prices, self.window);
        let distance = prices
            .iter()
            .zip(&mean)
            .map(|(price, mean)| mean.map(|m| price - m))
            .collect();

        Ok(MeanReversionIndicators { mean, distance })
    }

    fn compute_positions(
        &self,
        data: &MarketData,
        indicators: &MeanReversionIndicators,
    ) -> Result<SignalFrame> {
        let start = indicators
            .distance
            .iter()
            .position(Option::is_some)
            .ok_or(BacktestError::InsufficientWindow {
                window: self.window,
                available: data.prices().len(),
            })?;

        let distance: Vec<f64> = indicators.distance[start..]
            .iter()
            .map(|d| d.unwrap_or(0.0))
            .collect();

        let mut positions = Vec::with_capacity(distance.len());
        let mut held = Position::Flat;

        for (i, &d) in distance.iter().enumerate() {
            let mut signal = None;
            if d > self.threshold {
                signal = Some(Position::Short);
            }
            if d < -self.threshold {
                signal = Some(Position::Long);
            }
            //crossing the mean wins over both thresholds
            if i > 0 && d * distance[i - 1] < 0.0 {
                signal = Some(Position::Flat);
            }

            if let Some(signal) = signal {
                held = signal;
            }
            positions.push(held);
        }

        Ok(frame_from(data, start, positions, self.window)?.with_first_return_in_baseline())
    }
}
