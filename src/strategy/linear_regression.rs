use crate::config::LinearRegressionParams;
use crate::data::{DateRange, MarketData, ReturnSeries};
use crate::error::{BacktestError, Result};
use crate::model::{RegressionFitter, RegressionModel};
use crate::strategy::{require_positive, Position, SignalFrame, SignalGenerator};
use tracing::debug;

impl LinearRegressionParams {
    fn select(&self, data: &MarketData, range: &DateRange) -> Result<ReturnSeries> {
        let selected = data.returns().select(range);
        if selected.is_empty() {
            return Err(BacktestError::EmptyRange {
                symbol: data.symbol().to_string(),
                start: range.start,
                end: range.end,
            });
        }
        Ok(selected)
    }
}

//predicts the direction of the next return from the last `lags` returns
//the model is fitted once on fit_range and then traded on predict_range
impl SignalGenerator for LinearRegressionParams {
    type Indicators = RegressionModel;

    fn name(&self) -> &'static str {
        "Linear Regression"
    }

    fn validate(&self) -> Result<()> {
        require_positive("lags", self.lags)
    }

    fn compute_indicators(&self, data: &MarketData) -> Result<RegressionModel> {
        let returns = self.select(data, &self.fit_range)?.values();
        let model = RegressionFitter::fit(&returns, self.lags)?;
        debug!(
            lags = self.lags,
            rows = returns.len() - self.lags,
            coefficients = ?model.coefficients(),
            "regression fitted"
        );
        Ok(model)
    }

    fn compute_positions(
        &self,
        data: &MarketData,
        model: &RegressionModel,
    ) -> Result<SignalFrame> {
        if model.lags() != self.lags {
            return Err(BacktestError::invalid(
                "lags",
                format!("model was fitted with {} lag(s)", model.lags()),
            ));
        }

        let selected = self.select(data, &self.predict_range)?;
        let returns = selected.values();
        if returns.len() <= self.lags {
            return Err(BacktestError::InsufficientWindow {
                window: self.lags + 1,
                available: returns.len(),
            });
        }

        //the position at s trades return s + 1, so its features are r[s], r[s-1], ...
        let start = self.lags - 1;
        let positions = (start..returns.len())
            .map(|s| {
                let features: Vec<f64> = (0..self.lags).map(|k| returns[s - k]).collect();
                Position::from_sign(model.predict(&features))
            })
            .collect();

        SignalFrame::new(
            selected.timestamps()[start..].to_vec(),
            returns[start..].to_vec(),
            positions,
        )
    }
}
