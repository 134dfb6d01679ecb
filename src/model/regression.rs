//! Least-squares direction model on lagged log returns.
//!
//! The target is the sign of the current return (-1, 0 or 1) and the features
//! are the `lags` preceding returns, most recent first. No intercept and no
//! regularization. The fit solves the design through an SVD, so a
//! rank-deficient design gets the minimum-norm least-squares solution; only a
//! design without any usable direction fails.

use crate::error::{BacktestError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

//singular values below this share of the largest one count as zero
const RANK_TOLERANCE: f64 = 1e-10;

//fitted coefficients, one per lag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    lags: usize,
    coefficients: Vec<f64>,
}

impl RegressionModel {
    pub fn lags(&self) -> usize {
        self.lags
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Dot product of the features with the coefficients.
    ///
    /// `features[k]` must be the return `k + 1` periods before the predicted one.
    pub fn predict(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(&self.coefficients)
            .map(|(x, b)| x * b)
            .sum()
    }
}

/// Builds the lagged design: one row per return that has `lags` predecessors.
///
/// Returns the design matrix and the sign target of each row.
pub fn lagged_design(returns: &[f64], lags: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = returns.len().saturating_sub(lags);
    let mut x_data = Vec::with_capacity(rows * lags);
    let mut y_data = Vec::with_capacity(rows);

    for t in lags..returns.len() {
        for k in 1..=lags {
            x_data.push(returns[t - k]);
        }
        y_data.push(sign(returns[t]));
    }

    (
        DMatrix::from_row_slice(rows, lags, &x_data),
        DVector::from_vec(y_data),
    )
}

//sign of the value, zero stays zero
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub struct RegressionFitter;

impl RegressionFitter {
    /// Fits the coefficients on the given returns.
    ///
    /// Fails with `InsufficientWindow` when no row has a full set of lags and
    /// with `SingularFit` when the design has no nonzero singular value.
    pub fn fit(returns: &[f64], lags: usize) -> Result<RegressionModel> {
        if lags == 0 {
            return Err(BacktestError::invalid("lags", "must be positive"));
        }
        if returns.len() <= lags {
            return Err(BacktestError::InsufficientWindow {
                window: lags + 1,
                available: returns.len(),
            });
        }

        let (x, y) = lagged_design(returns, lags);

        let svd = x.svd(true, true);
        let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
        if !largest.is_finite() || largest <= 0.0 {
            return Err(BacktestError::SingularFit { lags });
        }

        let beta = svd
            .solve(&y, largest * RANK_TOLERANCE)
            .map_err(|_| BacktestError::SingularFit { lags })?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(BacktestError::SingularFit { lags });
        }

        Ok(RegressionModel {
            lags,
            coefficients: beta.iter().copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_rows_hold_preceding_returns() {
        let (x, y) = lagged_design(&[0.1, -0.2, 0.3, 0.0], 2);
        assert_eq!(x, DMatrix::from_row_slice(2, 2, &[-0.2, 0.1, 0.3, -0.2]));
        assert_eq!(y, DVector::from_vec(vec![1.0, 0.0]));
    }

    #[test]
    fn single_lag_is_slope_through_origin() {
        let returns = [0.5, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
        let model = RegressionFitter::fit(&returns, 1).unwrap();
        assert_eq!(model.lags(), 1);
        //least squares slope through the origin: sum(x*y) / sum(x*x)
        let expected = (0.5 * 1.0 + 1.0 + 1.0 * -1.0 + 1.0 + 1.0 * -1.0 + 1.0 + 1.0 * -1.0)
            / (0.25 + 1.0 + 1.0 + 1.0 + 1.0 + 1.0 + 1.0);
        assert!((model.coefficients()[0] - expected).abs() < 1e-10);
    }

    #[test]
    fn collinear_lags_get_the_minimum_norm_fit() {
        //constant magnitude alternation makes lag 2 the negative of lag 1
        let returns: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let model = RegressionFitter::fit(&returns, 2).unwrap();

        let b = model.coefficients();
        assert!((b[0] - -50.0).abs() < 1e-6);
        assert!((b[1] - 50.0).abs() < 1e-6);
        //still bets against the last move
        assert!(model.predict(&[0.01, -0.01]) < 0.0);
        assert!(model.predict(&[-0.01, 0.01]) > 0.0);
    }

    #[test]
    fn zero_returns_are_singular() {
        let err = RegressionFitter::fit(&[0.0; 10], 3).unwrap_err();
        assert!(matches!(err, BacktestError::SingularFit { lags: 3 }));
    }

    #[test]
    fn too_few_returns_for_lags() {
        let err = RegressionFitter::fit(&[0.1, 0.2], 2).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InsufficientWindow {
                window: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn predict_is_a_dot_product() {
        let model = RegressionModel {
            lags: 2,
            coefficients: vec![0.5, -2.0],
        };
        assert!((model.predict(&[2.0, 1.0]) - -1.0).abs() < 1e-12);
    }
}
