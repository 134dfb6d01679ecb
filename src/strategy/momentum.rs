use crate::config::MomentumParams;
use crate::data::MarketData;
use crate::error::{BacktestError, Result};
use crate::strategy::{
    frame_from, require_positive, rolling_mean, IndicatorSeries, Position, SignalFrame,
    SignalGenerator,
};

//follows the sign of the average return over the window
//a zero average means no conviction and stays flat
impl SignalGenerator for MomentumParams {
    type Indicators = IndicatorSeries;

    fn name(&self) -> &'static str {
        "Momentum"
    }

    fn validate(&self) -> Result<()> {
        require_positive("momentum", self.window)
    }

    fn compute_indicators(&self, data: &MarketData) -> Result<IndicatorSeries> {
        let returns = data.returns().values();
        if self.window > returns.len() {
            return Err(BacktestError::InsufficientWindow {
                window: self.window,
                available: returns.len(),
            });
        }
        Ok(rolling_mean(&returns, self.window))
    }

    fn compute_positions(
        &self,
        data: &MarketData,
        indicators: &IndicatorSeries,
    ) -> Result<SignalFrame> {
        let start = indicators
            .iter()
            .position(Option::is_some)
            .ok_or(BacktestError::InsufficientWindow {
                window: self.window,
                available: data.returns().len(),
            })?;

        let positions = indicators[start..]
            .iter()
            .map(|mean| Position::from_sign(mean.unwrap_or(0.0)))
            .collect();

        frame_from(data, start, positions, self.window)
    }
}
