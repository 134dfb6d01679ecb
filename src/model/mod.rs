pub mod regression;

pub use regression::{lagged_design, RegressionFitter, RegressionModel};
