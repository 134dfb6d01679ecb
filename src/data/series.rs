use crate::error::{BacktestError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

//inclusive calendar date range, both bounds belong to the range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    //true when the timestamp's calendar date lies within [start, end]
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        date >= self.start && date <= self.end
    }
}

//a single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

//ordered prices for one symbol, timestamps strictly increasing
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    //creates a price series, rejecting unordered timestamps and non-positive prices
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        for (row, point) in points.iter().enumerate() {
            if !point.price.is_finite() || point.price <= 0.0 {
                return Err(BacktestError::InvalidData {
                    row,
                    reason: format!("price {} is not a positive number", point.price),
                });
            }
        }

        for (row, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(BacktestError::InvalidData {
                    row: row + 1,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        pair[1].timestamp, pair[0].timestamp
                    ),
                });
            }
        }

        Ok(PriceSeries {
            symbol: symbol.into(),
            points,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    //derives log returns, the first price has no predecessor and yields nothing
    pub fn log_returns(&self) -> ReturnSeries {
        let points = self
            .points
            .windows(2)
            .map(|pair| ReturnPoint {
                timestamp: pair[1].timestamp,
                log_return: (pair[1].price / pair[0].price).ln(),
            })
            .collect();

        ReturnSeries { points }
    }
}

//a single log return, stamped with the later of its two prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub log_return: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.log_return).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    //returns the sub-series whose timestamps fall inside the range
    pub fn select(&self, range: &DateRange) -> ReturnSeries {
        ReturnSeries {
            points: self
                .points
                .iter()
                .filter(|p| range.contains(&p.timestamp))
                .copied()
                .collect(),
        }
    }
}

//the immutable base data of a backtest session
//returns[j] is realized between prices[j] and prices[j + 1]
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    prices: PriceSeries,
    returns: ReturnSeries,
}

impl MarketData {
    pub fn new(prices: PriceSeries) -> Result<Self> {
        if prices.len() < 2 {
            return Err(BacktestError::InsufficientWindow {
                window: 2,
                available: prices.len(),
            });
        }

        let returns = prices.log_returns();
        Ok(MarketData { prices, returns })
    }

    //builds market data straight from (timestamp, price) pairs
    pub fn from_prices(
        symbol: impl Into<String>,
        prices: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
    ) -> Result<Self> {
        let points = prices
            .into_iter()
            .map(|(timestamp, price)| PricePoint { timestamp, price })
            .collect();
        Self::new(PriceSeries::new(symbol, points)?)
    }

    pub fn symbol(&self) -> &str {
        self.prices.symbol()
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn returns(&self) -> &ReturnSeries {
        &self.returns
    }

    //prices at the end of each return period, one per return
    pub fn closing_prices(&self) -> Vec<f64> {
        self.prices.points()[1..].iter().map(|p| p.price).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn log_returns_drop_first_price() {
        let data =
            MarketData::from_prices("X", vec![(day(1), 100.0), (day(2), 110.0), (day(3), 99.0)])
                .unwrap();

        let returns = data.returns();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns.points()[0].timestamp, day(2));
        assert!((returns.points()[0].log_return - (1.1f64).ln()).abs() < 1e-12);
        assert!((returns.points()[1].log_return - (0.9f64).ln()).abs() < 1e-12);
        assert_eq!(data.closing_prices(), vec![110.0, 99.0]);
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = MarketData::from_prices("X", vec![(day(1), 1.0), (day(1), 2.0)]).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidData { row: 1, .. }));
    }

    #[test]
    fn rejects_non_positive_prices() {
        let err = MarketData::from_prices("X", vec![(day(1), 1.0), (day(2), 0.0)]).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidData { row: 1, .. }));
    }

    #[test]
    fn single_price_is_not_enough() {
        let err = MarketData::from_prices("X", vec![(day(1), 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InsufficientWindow {
                window: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        );
        assert!(!range.contains(&day(1)));
        assert!(range.contains(&day(2)));
        assert!(range.contains(&Utc.with_ymd_and_hms(2024, 1, 3, 23, 59, 0).unwrap()));
        assert!(!range.contains(&day(4)));
    }
}
