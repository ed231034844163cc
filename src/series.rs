use crate::yahoo::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Window of the trailing moving average attached to every row.
pub const MOVING_AVERAGE_WINDOW: usize = 7;

/// One trading day with its derived columns. Field names on the wire keep
/// the dashboard-facing spelling (`Date`, `Daily Return`, `7d MA`); derived
/// values that are undefined serialize as explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
    #[serde(rename = "Daily Return")]
    pub daily_return: Option<f64>,
    #[serde(rename = "7d MA")]
    pub seven_day_ma: Option<f64>,
}

/// Chronological OHLCV series for one symbol, derived columns included.
/// Built fresh per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub rows: Vec<PriceRow>,
}

impl PriceSeries {
    /// Build a series from provider bars: rows with any missing OHLCV value
    /// are dropped, the rest get a daily return and a trailing 7-sample
    /// moving average of close (undefined for the first 6 rows).
    pub fn from_bars(symbol: &str, bars: Vec<DailyBar>) -> Self {
        let mut rows: Vec<PriceRow> = bars
            .into_iter()
            .filter_map(|bar| {
                let (open, high, low, close, volume) = (
                    bar.open?,
                    bar.high?,
                    bar.low?,
                    bar.close?,
                    bar.volume?,
                );
                let daily_return = if open != 0.0 {
                    Some((close - open) / open)
                } else {
                    None
                };
                Some(PriceRow {
                    date: bar.date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    daily_return,
                    seven_day_ma: None,
                })
            })
            .collect();

        rows.sort_by_key(|row| row.date);
        rows.dedup_by_key(|row| row.date);

        for i in (MOVING_AVERAGE_WINDOW - 1)..rows.len() {
            let window = &rows[i + 1 - MOVING_AVERAGE_WINDOW..=i];
            let mean = window.iter().map(|row| row.close).sum::<f64>()
                / MOVING_AVERAGE_WINDOW as f64;
            rows[i].seven_day_ma = Some(mean);
        }

        PriceSeries {
            symbol: symbol.to_string(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The last `n` rows in chronological order, or the whole series when it
    /// is shorter than `n`.
    pub fn tail(&self, n: usize) -> &[PriceRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.close).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, open: f64, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2023, 3, day).unwrap(),
            open: Some(open),
            high: Some(close + 1.0),
            low: Some(open - 1.0),
            close: Some(close),
            volume: Some(1_000),
        }
    }

    fn long_series(n: i64) -> PriceSeries {
        let first = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| DailyBar {
                date: first + chrono::Duration::days(i),
                open: Some(100.0),
                high: Some(102.0 + i as f64),
                low: Some(99.0),
                close: Some(101.0 + i as f64),
                volume: Some(1_000),
            })
            .collect();
        PriceSeries::from_bars("TEST", bars)
    }

    fn series_of(n: u32) -> PriceSeries {
        let bars = (1..=n).map(|day| bar(day, 100.0, 100.0 + day as f64)).collect();
        PriceSeries::from_bars("TEST", bars)
    }

    #[test]
    fn test_daily_return_identity() {
        let series = series_of(10);
        for row in &series.rows {
            let ret = row.daily_return.unwrap();
            assert!((row.close - row.open * (1.0 + ret)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_moving_average_window() {
        let series = series_of(10);
        for (i, row) in series.rows.iter().enumerate() {
            if i < MOVING_AVERAGE_WINDOW - 1 {
                assert_eq!(row.seven_day_ma, None);
            } else {
                let expected: f64 = series.rows[i + 1 - MOVING_AVERAGE_WINDOW..=i]
                    .iter()
                    .map(|r| r.close)
                    .sum::<f64>()
                    / MOVING_AVERAGE_WINDOW as f64;
                assert!((row.seven_day_ma.unwrap() - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_incomplete_bars_are_dropped() {
        let mut bars = vec![bar(1, 100.0, 101.0), bar(2, 100.0, 102.0)];
        bars[1].close = None;
        let series = PriceSeries::from_bars("TEST", bars);
        assert_eq!(series.len(), 1);
        assert_eq!(series.rows[0].close, 101.0);
    }

    #[test]
    fn test_zero_open_leaves_return_undefined() {
        let mut b = bar(1, 0.0, 5.0);
        b.low = Some(0.0);
        let series = PriceSeries::from_bars("TEST", vec![b]);
        assert_eq!(series.rows[0].daily_return, None);
    }

    #[test]
    fn test_construction_is_deterministic() {
        let bars: Vec<DailyBar> = (1..=20).map(|d| bar(d, 50.0, 50.0 + d as f64)).collect();
        let a = PriceSeries::from_bars("TEST", bars.clone());
        let b = PriceSeries::from_bars("TEST", bars);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tail_returns_last_rows() {
        let series = long_series(100);
        let tail = series.tail(30);
        assert_eq!(tail.len(), 30);
        assert_eq!(tail[0].date, series.rows[70].date);
        assert_eq!(tail.last().unwrap().date, series.last_date().unwrap());

        let all = series.tail(500);
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_json_row_shape() {
        let series = series_of(3);
        let value = serde_json::to_value(&series.rows[0]).unwrap();
        assert_eq!(value["Date"], "2023-03-01");
        assert_eq!(value["Close"], 101.0);
        // undefined moving average is an explicit null, not a dropped field
        assert!(value.get("7d MA").unwrap().is_null());
    }
}
