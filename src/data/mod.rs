pub mod loader;
pub mod series;

pub use loader::SeriesLoader;
pub use series::{DateRange, MarketData, PricePoint, PriceSeries, ReturnPoint, ReturnSeries};
