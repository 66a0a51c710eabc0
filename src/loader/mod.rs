//! CSV import for realized history and offline forecasts.

use crate::models::{ForecastPoint, RawCsvRow, RawForecastCsvRow, RealizedPoint};
use crate::source::cleaner::{csv_row_to_forecast, csv_row_to_point, normalise_symbol};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Extract symbol from CSV filename: "INFY Historical Data.csv" → "INFY".
pub fn extract_symbol_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let symbol = stem.split(['_', ' ', '.']).next()?;
    let symbol = normalise_symbol(symbol);

    if symbol.is_empty() { None } else { Some(symbol) }
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))
}

/// Parse an investing.com CSV: Date, Price, Open, High, Low, Volume, Change%.
/// Rows come back ascending by date (exports are newest-first). Repeated
/// dates are kept so the overlay builder can reject them.
pub fn load_realized_csv(path: &Path) -> Result<Vec<RealizedPoint>> {
    let symbol = extract_symbol_from_filename(path).unwrap_or_else(|| "?".into());
    debug!("Loading realized history for {} from {:?}", symbol, path);

    let mut points = Vec::new();
    for (i, result) in reader(path)?.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };

        let raw = RawCsvRow {
            date: record.get(0).map(|s| s.to_string()),
            price: record.get(1).map(|s| s.to_string()),
        };

        match csv_row_to_point(&symbol, &raw) {
            Some(p) => points.push(p),
            None => warn!("Row {} in {:?}: unparseable, skipped", i + 1, path),
        }
    }

    points.sort_by_key(|p| p.date);
    info!("{}: {} realized points loaded", symbol, points.len());
    Ok(points)
}

/// Parse an offline forecast CSV: date, estimate[, lower, upper].
/// Order is kept as written; the overlay builder checks it.
pub fn load_forecast_csv(path: &Path) -> Result<Vec<ForecastPoint>> {
    let mut points = Vec::new();
    for (i, result) in reader(path)?.records().enumerate() {
        let record = result.with_context(|| format!("Row {} in {:?}", i + 1, path))?;

        let raw = RawForecastCsvRow {
            date: record.get(0).map(|s| s.to_string()),
            estimate: record.get(1).map(|s| s.to_string()),
            lower: record.get(2).map(|s| s.to_string()),
            upper: record.get(3).map(|s| s.to_string()),
        };

        let point = csv_row_to_forecast(&raw)
            .with_context(|| format!("Row {} in {:?}: bad forecast row", i + 1, path))?;
        points.push(point);
    }

    info!("{} forecast points loaded from {:?}", points.len(), path);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use tokio_test::{assert_err, assert_ok};

    fn write_tmp(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("market-pulse-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_extract_symbol() {
        assert_eq!(
            extract_symbol_from_filename(Path::new("data/infy Historical Data.csv")),
            Some("INFY".into())
        );
        assert_eq!(
            extract_symbol_from_filename(Path::new("TCS_daily.csv")),
            Some("TCS".into())
        );
    }

    #[test]
    fn test_realized_sorted_ascending() {
        let path = write_tmp(
            "RELIANCE Historical Data.csv",
            "Date,Price,Open,High,Low,Vol.,Change %\n\
             \"Jan 03, 2024\",\"2,460.10\",2450,2470,2440,2.5M,0.2%\n\
             \"Jan 02, 2024\",\"2,455.00\",2440,2460,2430,2.1M,0.1%\n\
             garbage,row\n",
        );
        let points = load_realized_csv(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[1].price, 2460.10);
    }

    #[test]
    fn test_forecast_with_optional_bounds() {
        let path = write_tmp(
            "INFY_forecast.csv",
            "date,estimate,lower,upper\n2024-01-08,1441.2,,\n2024-01-09,1444.9,1420,1470\n",
        );
        let points = assert_ok!(load_forecast_csv(&path));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].lower_bound, None);
        assert_eq!(points[1].lower_bound, Some(1420.0));
    }

    #[test]
    fn test_forecast_bad_row_fails() {
        let path = write_tmp("BAD_forecast.csv", "date,estimate\nsoon,12\n");
        assert_err!(load_forecast_csv(&path));
    }

    #[test]
    fn test_missing_file_fails() {
        assert_err!(load_realized_csv(Path::new("/definitely/not/here.csv")));
    }
}
