use crate::series::PriceSeries;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of calendar days the forecast extends past the last known bar.
pub const FORECAST_HORIZON: usize = 7;

#[derive(Debug, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Fewer points than the computation is defined over.
    NotEnoughData,
    /// The two series share no dates to join on.
    NoOverlap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub high: f64,
    pub low: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Predicted_Close")]
    pub predicted_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub mean_a: f64,
    pub mean_b: f64,
    pub diff: f64,
}

/// Max, min and arithmetic mean of close. None on an empty series.
pub fn summarize(series: &PriceSeries) -> Option<SummaryStats> {
    if series.is_empty() {
        return None;
    }
    let closes = series.closes();
    let high = closes.iter().cloned().fold(f64::MIN, f64::max);
    let low = closes.iter().cloned().fold(f64::MAX, f64::min);
    let mean = closes.iter().sum::<f64>() / closes.len() as f64;
    Some(SummaryStats { high, low, mean })
}

/// Sample standard deviation of close. Undefined below 2 points.
pub fn volatility(series: &PriceSeries) -> Option<f64> {
    let closes = series.closes();
    if closes.len() < 2 {
        return None;
    }
    let n = closes.len() as f64;
    let mean = closes.iter().sum::<f64>() / n;
    let variance = closes
        .iter()
        .map(|close| {
            let d = close - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1.0);
    Some(variance.sqrt())
}

/// Ordinary least squares of close against the 0-based row index,
/// extrapolated over the next `FORECAST_HORIZON` positions. Forecast dates
/// advance by raw calendar days past the last bar, so they can land on
/// non-trading days.
pub fn forecast(series: &PriceSeries) -> Result<Vec<ForecastPoint>, AnalyticsError> {
    let closes = series.closes();
    let n = closes.len();
    if n < 2 {
        return Err(AnalyticsError::NotEnoughData);
    }

    let count = n as f64;
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = closes.iter().sum::<f64>() / count;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (i, close) in closes.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (close - mean_y);
        var_x += dx * dx;
    }
    let slope = cov / var_x;
    let intercept = mean_y - slope * mean_x;

    // last_date is always present here since n >= 2
    let last_date = series.last_date().ok_or(AnalyticsError::NotEnoughData)?;

    let points = (0..FORECAST_HORIZON)
        .map(|step| ForecastPoint {
            date: last_date + ChronoDuration::days(step as i64 + 1),
            predicted_close: intercept + slope * (n + step) as f64,
        })
        .collect();
    Ok(points)
}

/// Pearson correlation of close over the dates both series share
/// (inner join on date, in chronological order).
pub fn correlate(a: &PriceSeries, b: &PriceSeries) -> Result<f64, AnalyticsError> {
    let b_by_date: HashMap<NaiveDate, f64> =
        b.rows.iter().map(|row| (row.date, row.close)).collect();

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for row in &a.rows {
        if let Some(&close_b) = b_by_date.get(&row.date) {
            xs.push(row.close);
            ys.push(close_b);
        }
    }

    if xs.is_empty() {
        return Err(AnalyticsError::NoOverlap);
    }
    pearson(&xs, &ys).ok_or(AnalyticsError::NotEnoughData)
}

/// Pearson coefficient over two aligned sequences. None when either side
/// has no variance or fewer than 2 points.
fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Whole-series mean of close for each side plus their difference. Unlike
/// `correlate` this intentionally performs no date alignment, so mismatched
/// windows still compare.
pub fn compare(a: &PriceSeries, b: &PriceSeries) -> Option<Comparison> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mean_a = a.closes().iter().sum::<f64>() / a.len() as f64;
    let mean_b = b.closes().iter().sum::<f64>() / b.len() as f64;
    Some(Comparison {
        mean_a,
        mean_b,
        diff: mean_a - mean_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yahoo::DailyBar;

    fn series_from_closes(symbol: &str, start_day: i64, closes: &[f64]) -> PriceSeries {
        let first = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + ChronoDuration::days(start_day);
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                date: first + ChronoDuration::days(i as i64),
                open: Some(close),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(500),
            })
            .collect();
        PriceSeries::from_bars(symbol, bars)
    }

    fn empty_series() -> PriceSeries {
        PriceSeries::from_bars("EMPTY", Vec::new())
    }

    #[test]
    fn test_empty_series_signals_no_data_everywhere() {
        let empty = empty_series();
        assert_eq!(summarize(&empty), None);
        assert_eq!(volatility(&empty), None);
        assert_eq!(forecast(&empty), Err(AnalyticsError::NotEnoughData));
        assert_eq!(compare(&empty, &empty), None);
        assert_eq!(
            correlate(&empty, &empty),
            Err(AnalyticsError::NoOverlap)
        );
    }

    #[test]
    fn test_summarize() {
        let series = series_from_closes("A", 0, &[10.0, 30.0, 20.0]);
        let stats = summarize(&series).unwrap();
        assert_eq!(stats.high, 30.0);
        assert_eq!(stats.low, 10.0);
        assert!((stats.mean - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_known_value() {
        // sample std of [2, 4, 4, 4, 5, 5, 7, 9] is sqrt(32/7)
        let series = series_from_closes("A", 0, &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let vol = volatility(&series).unwrap();
        assert!((vol - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_needs_two_points() {
        let series = series_from_closes("A", 0, &[42.0]);
        assert_eq!(volatility(&series), None);
    }

    #[test]
    fn test_forecast_extends_perfect_line() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + 2.0 * i as f64).collect();
        let series = series_from_closes("A", 0, &closes);
        let points = forecast(&series).unwrap();
        assert_eq!(points.len(), FORECAST_HORIZON);

        let last_date = series.last_date().unwrap();
        for (step, point) in points.iter().enumerate() {
            let expected = 10.0 + 2.0 * (20 + step) as f64;
            assert!((point.predicted_close - expected).abs() < 1e-6);
            assert_eq!(
                point.date,
                last_date + ChronoDuration::days(step as i64 + 1)
            );
        }
    }

    #[test]
    fn test_forecast_rejects_single_point() {
        let series = series_from_closes("A", 0, &[100.0]);
        assert_eq!(forecast(&series), Err(AnalyticsError::NotEnoughData));
    }

    #[test]
    fn test_self_correlation_is_one() {
        let series = series_from_closes("A", 0, &[10.0, 12.0, 11.0, 15.0, 14.0]);
        let corr = correlate(&series, &series).unwrap();
        assert!((corr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_correlation_is_negative_one() {
        let a = series_from_closes("A", 0, &[1.0, 2.0, 3.0, 4.0]);
        let b = series_from_closes("B", 0, &[8.0, 6.0, 4.0, 2.0]);
        let corr = correlate(&a, &b).unwrap();
        assert!((corr + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_without_overlap() {
        let a = series_from_closes("A", 0, &[1.0, 2.0, 3.0]);
        let b = series_from_closes("B", 100, &[1.0, 2.0, 3.0]);
        assert_eq!(correlate(&a, &b), Err(AnalyticsError::NoOverlap));
    }

    #[test]
    fn test_correlation_constant_series_is_undefined() {
        let a = series_from_closes("A", 0, &[5.0, 5.0, 5.0]);
        let b = series_from_closes("B", 0, &[1.0, 2.0, 3.0]);
        assert_eq!(correlate(&a, &b), Err(AnalyticsError::NotEnoughData));
    }

    #[test]
    fn test_compare_ignores_date_alignment() {
        let a = series_from_closes("A", 0, &[10.0, 20.0]);
        let b = series_from_closes("B", 300, &[1.0, 2.0, 3.0]);
        let comparison = compare(&a, &b).unwrap();
        assert!((comparison.mean_a - 15.0).abs() < 1e-9);
        assert!((comparison.mean_b - 2.0).abs() < 1e-9);
        assert!((comparison.diff - 13.0).abs() < 1e-9);
    }
}
