use crate::series::PriceSeries;
use chrono::Duration as ChronoDuration;
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 600;

#[derive(Debug)]
pub enum RenderError {
    Csv(csv::Error),
    Io(std::io::Error),
    Utf8(std::string::FromUtf8Error),
    Chart(String),
    Png(image::ImageError),
}

impl From<csv::Error> for RenderError {
    fn from(error: csv::Error) -> Self {
        RenderError::Csv(error)
    }
}

impl From<std::string::FromUtf8Error> for RenderError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        RenderError::Utf8(error)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(error: image::ImageError) -> Self {
        RenderError::Png(error)
    }
}

/// Serialize the full series as CSV, header row included. Undefined derived
/// values come out as empty cells.
pub fn to_csv(series: &PriceSeries) -> Result<String, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &series.rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|error| RenderError::Io(error.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Render the closing-price line chart as PNG bytes. An empty series yields
/// a placeholder image labelled with the symbol instead of an error.
pub fn render_chart(series: &PriceSeries) -> Result<Vec<u8>, RenderError> {
    let mut raw = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        if series.is_empty() {
            draw_placeholder(&root, &series.symbol)?;
        } else {
            draw_close_line(&root, series)?;
        }
        root.present().map_err(chart_err)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &raw,
        CHART_WIDTH,
        CHART_HEIGHT,
        ExtendedColorType::Rgb8,
    )?;
    Ok(png)
}

fn draw_placeholder<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    symbol: &str,
) -> Result<(), RenderError> {
    let style = TextStyle::from(("sans-serif", 28)).color(&BLACK);
    root.draw_text(
        &format!("No data for {symbol}"),
        &style,
        (CHART_WIDTH as i32 / 2 - 120, CHART_HEIGHT as i32 / 2),
    )
    .map_err(chart_err)
}

fn draw_close_line<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    series: &PriceSeries,
) -> Result<(), RenderError> {
    let first_date = series.rows[0].date;
    let mut last_date = series.last_date().unwrap_or(first_date);
    if last_date == first_date {
        // a single bar still needs a non-degenerate axis
        last_date += ChronoDuration::days(1);
    }

    let closes = series.closes();
    let mut low = closes.iter().cloned().fold(f64::MAX, f64::min);
    let mut high = closes.iter().cloned().fold(f64::MIN, f64::max);
    if low == high {
        low -= 1.0;
        high += 1.0;
    }
    let pad = (high - low) * 0.05;

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("Closing Price: {}", series.symbol),
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(first_date..last_date, (low - pad)..(high + pad))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|date| date.format("%Y-%m-%d").to_string())
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(
            series.rows.iter().map(|row| (row.date, row.close)),
            &BLUE,
        ))
        .map_err(chart_err)?;
    Ok(())
}

fn chart_err<E: std::error::Error + Send + Sync>(
    error: DrawingAreaErrorKind<E>,
) -> RenderError {
    RenderError::Chart(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yahoo::DailyBar;
    use chrono::NaiveDate;

    fn small_series() -> PriceSeries {
        let first = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..3)
            .map(|i| DailyBar {
                date: first + ChronoDuration::days(i),
                open: Some(100.0),
                high: Some(105.0),
                low: Some(95.0),
                close: Some(101.0 + i as f64),
                volume: Some(10_000),
            })
            .collect();
        PriceSeries::from_bars("TSLA", bars)
    }

    #[test]
    fn test_csv_header_and_rows() {
        let csv_text = to_csv(&small_series()).unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Open,High,Low,Close,Volume,Daily Return,7d MA"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2023-01-02,100.0,105.0,95.0,101.0,10000,"));
        // moving average is undefined this early: trailing cell stays empty
        assert!(first.ends_with(","));
        assert_eq!(csv_text.lines().count(), 4);
    }

    #[test]
    fn test_csv_of_empty_series_is_header_free() {
        let empty = PriceSeries::from_bars("NONE", Vec::new());
        assert_eq!(to_csv(&empty).unwrap(), "");
    }
}
