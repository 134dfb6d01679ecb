use crate::config::LoaderConfig;
use crate::data::series::{DateRange, MarketData, PricePoint, PriceSeries};
use crate::error::{BacktestError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use tracing::{debug, warn};

//loads one symbol column out of a wide csv file
//first column holds the timestamp, every other column is a symbol's price
#[derive(Debug, Clone)]
pub struct SeriesLoader {
    config: LoaderConfig,
}

impl SeriesLoader {
    pub fn new(config: LoaderConfig) -> Self {
        SeriesLoader { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    //loads prices for symbol inside the inclusive range and derives log returns
    pub fn load(&self, symbol: &str, range: &DateRange) -> Result<MarketData> {
        let file = File::open(&self.config.data_path)?;
        debug!(path = ?self.config.data_path, symbol, "loading price series");
        self.load_from_reader(file, symbol, range)
    }

    pub fn load_from_reader<R: Read>(
        &self,
        reader: R,
        symbol: &str,
        range: &DateRange,
    ) -> Result<MarketData> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let column = headers
            .iter()
            .skip(1)
            .position(|name| name == symbol)
            .map(|index| index + 1)
            .ok_or_else(|| BacktestError::DataNotFound {
                symbol: symbol.to_string(),
            })?;

        let mut points = Vec::new();
        let mut dropped = 0usize;

        for (index, result) in reader.records().enumerate() {
            let record = result?;
            //header is line 1
            let line = index + 2;

            let raw_timestamp = record.get(0).unwrap_or_default();
            let timestamp =
                parse_timestamp(raw_timestamp).ok_or_else(|| BacktestError::InvalidData {
                    row: line,
                    reason: format!("unparseable timestamp '{}'", raw_timestamp),
                })?;

            let price = parse_price(record.get(column), line)?;
            let complete = if self.config.drop_incomplete_rows {
                row_is_complete(&record, line)?
            } else {
                price.is_some()
            };

            match price {
                Some(price) if complete => {
                    if range.contains(&timestamp) {
                        points.push(PricePoint { timestamp, price });
                    }
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(symbol, dropped, "dropped rows with missing prices");
        }

        if points.is_empty() {
            return Err(BacktestError::EmptyRange {
                symbol: symbol.to_string(),
                start: range.start,
                end: range.end,
            });
        }

        //sort by timestamp to ensure chronological order
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let series = PriceSeries::new(symbol, points)?;
        debug!(symbol, rows = series.len(), "price series loaded");
        MarketData::new(series)
    }
}

fn row_is_complete(record: &StringRecord, line: usize) -> Result<bool> {
    for field in record.iter().skip(1) {
        if parse_price(Some(field), line)?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

//empty cells and NaN are missing values, anything else must be a number
fn parse_price(field: Option<&str>, line: usize) -> Result<Option<f64>> {
    let field = match field {
        Some(f) if !f.is_empty() => f,
        _ => return Ok(None),
    };

    let value: f64 = field.parse().map_err(|_| BacktestError::InvalidData {
        row: line,
        reason: format!("unparseable price '{}'", field),
    })?;

    if value.is_nan() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

//accepts rfc3339, "yyyy-mm-dd hh:mm:ss" and plain dates (midnight utc)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ts));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| Utc.from_utc_datetime(&ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Date,AAA,BBB
2020-01-02,100.0,10.0
2020-01-03,101.0,
2020-01-06,102.0,10.2
2020-01-07,103.0,10.3
2020-01-08,104.0,NaN
";

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
    }

    fn loader(drop_incomplete_rows: bool) -> SeriesLoader {
        SeriesLoader::new(LoaderConfig {
            data_path: "unused.csv".into(),
            drop_incomplete_rows,
        })
    }

    #[test]
    fn drops_rows_missing_any_column() {
        let data = loader(true)
            .load_from_reader(CSV.as_bytes(), "AAA", &range((2020, 1, 1), (2020, 12, 31)))
            .unwrap();
        assert_eq!(data.prices().prices(), vec![100.0, 102.0, 103.0]);
        assert_eq!(data.returns().len(), 2);
    }

    #[test]
    fn keeps_rows_complete_for_symbol() {
        let data = loader(false)
            .load_from_reader(CSV.as_bytes(), "AAA", &range((2020, 1, 1), (2020, 12, 31)))
            .unwrap();
        assert_eq!(data.prices().len(), 5);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let data = loader(false)
            .load_from_reader(CSV.as_bytes(), "AAA", &range((2020, 1, 3), (2020, 1, 7)))
            .unwrap();
        assert_eq!(data.prices().prices(), vec![101.0, 102.0, 103.0]);
    }

    #[test]
    fn unknown_symbol_is_data_not_found() {
        let err = loader(true)
            .load_from_reader(CSV.as_bytes(), "ZZZ", &range((2020, 1, 1), (2020, 12, 31)))
            .unwrap_err();
        assert!(matches!(err, BacktestError::DataNotFound { symbol } if symbol == "ZZZ"));
    }

    #[test]
    fn date_column_is_not_a_symbol() {
        let err = loader(true)
            .load_from_reader(CSV.as_bytes(), "Date", &range((2020, 1, 1), (2020, 12, 31)))
            .unwrap_err();
        assert!(matches!(err, BacktestError::DataNotFound { .. }));
    }

    #[test]
    fn empty_range_is_reported() {
        let err = loader(true)
            .load_from_reader(CSV.as_bytes(), "AAA", &range((2021, 1, 1), (2021, 12, 31)))
            .unwrap_err();
        assert!(matches!(err, BacktestError::EmptyRange { .. }));
    }

    #[test]
    fn garbage_price_is_invalid_data() {
        let csv = "Date,AAA\n2020-01-02,abc\n";
        let err = loader(true)
            .load_from_reader(csv.as_bytes(), "AAA", &range((2020, 1, 1), (2020, 12, 31)))
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidData { row: 2, .. }));
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        assert!(parse_timestamp("2020-01-02").is_some());
        assert!(parse_timestamp("2020-01-02 15:30:00").is_some());
        assert!(parse_timestamp("2020-01-02T15:30:00+00:00").is_some());
        assert!(parse_timestamp("02/01/2020").is_none());
    }
}
