use crate::error::{Error, Result};
use crate::models::{
    ForecastPoint, Quote, RawCsvRow, RawForecastCsvRow, RawForecastRow, RawQuote, RealizedPoint,
};
use crate::overlay::{check_increasing, validate_forecast_point};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse price: strip everything except digits, dot, minus.
/// "₹1,234.56" → 1234.56 | "610.00" → 610.0
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Parse volume with K/M/B suffixes.
/// "2.5M" → 2,500,000 | "345K" → 345,000 | "12345" → 12345
pub fn parse_volume_shorthand(s: &str) -> Option<i64> {
    let s = s.trim().to_uppercase().replace(',', "");

    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('B') {
        (n, 1_000_000_000.0)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1_000.0)
    } else {
        let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        return cleaned.parse().ok();
    };

    let num: f64 = num_str.trim().parse().ok()?;
    Some((num * multiplier) as i64)
}

/// Parse dates: ISO, ISO with time (prediction service), RFC 3339, or the
/// investing.com export formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%b %d, %Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d %b %Y") {
        return Some(d);
    }

    None
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Comparison key that ignores spacing: "NIFTY 50" == "nifty50".
pub fn symbol_key(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

// ── Quote payload → Quote ─────────────────────────────────────────────────────

/// Shape-check a wire quote. Numbers must be finite and the price
/// non-negative; `change_percent` is kept exactly as served.
pub fn raw_to_quote(raw: RawQuote, fetched_at: DateTime<Utc>) -> Result<Quote> {
    let symbol = normalise_symbol(&raw.symbol);
    if symbol.is_empty() {
        return Err(Error::Decode("quote without symbol".into()));
    }
    if !(raw.price.is_finite() && raw.change.is_finite() && raw.change_percent.is_finite()) {
        return Err(Error::Decode(format!("{}: non-finite quote field", symbol)));
    }
    if raw.price < 0.0 {
        return Err(Error::Decode(format!("{}: negative price {}", symbol, raw.price)));
    }

    Ok(Quote {
        symbol,
        price: raw.price,
        change: raw.change,
        change_percent: raw.change_percent,
        day_high: raw.high.filter(|v| v.is_finite()),
        day_low: raw.low.filter(|v| v.is_finite()),
        observed_at: raw.observed_at.unwrap_or(fetched_at),
    })
}

// ── Forecast rows → ForecastPoint ─────────────────────────────────────────────

/// Convert served forecast rows. Unparseable dates, dates that do not strictly
/// increase, and inconsistent bounds are all rejected.
pub fn clean_forecast_rows(symbol: &str, rows: Vec<RawForecastRow>) -> Result<Vec<ForecastPoint>> {
    let mut points = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let date = parse_date(&row.date).ok_or_else(|| {
            Error::InvalidInput(format!("{}: row {} has unparseable date {:?}", symbol, i, row.date))
        })?;
        let point = ForecastPoint {
            date,
            estimate: row.estimate,
            lower_bound: row.lower,
            upper_bound: row.upper,
        };
        validate_forecast_point(&point)?;
        points.push(point);
    }
    check_increasing(symbol, points.iter().map(|p| &p.date))?;
    Ok(points)
}

// ── CSV rows ──────────────────────────────────────────────────────────────────

pub fn csv_row_to_point(symbol: &str, row: &RawCsvRow) -> Option<RealizedPoint> {
    let date = parse_date(row.date.as_deref()?)?;
    let price = parse_price(row.price.as_deref()?)?;

    if price < 0.0 {
        warn!("Invalid close {} for {} on {}", price, symbol, date);
        return None;
    }

    Some(RealizedPoint { date, price })
}

/// Machine-written number first ("1.5e3"), display formatting second.
fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().or_else(|| parse_price(s))
}

pub fn csv_row_to_forecast(row: &RawForecastCsvRow) -> Option<ForecastPoint> {
    let date = parse_date(row.date.as_deref()?)?;
    let estimate = parse_number(row.estimate.as_deref()?)?;

    Some(ForecastPoint {
        date,
        estimate,
        lower_bound: row.lower.as_deref().and_then(parse_number),
        upper_bound: row.upper.as_deref().and_then(parse_number),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn raw(price: f64) -> RawQuote {
        RawQuote {
            symbol: " nifty 50 ".into(),
            price,
            change: 142.85,
            change_percent: 9.99,
            high: Some(19298.5),
            low: None,
            observed_at: None,
        }
    }

    #[test]
    fn test_parse_volume_shorthand() {
        assert_eq!(parse_volume_shorthand("2.5M"), Some(2_500_000));
        assert_eq!(parse_volume_shorthand("345K"), Some(345_000));
        assert_eq!(parse_volume_shorthand("1.5B"), Some(1_500_000_000));
        assert_eq!(parse_volume_shorthand("12345"), Some(12345));
    }

    #[test]
    fn test_parse_price_strips_currency() {
        assert_eq!(parse_price("₹19,245.30"), Some(19245.30));
        assert_eq!(parse_price("N/A"), None);
    }

    #[test]
    fn test_forecast_csv_reads_exponent_notation() {
        let row = RawForecastCsvRow {
            date: Some("2024-01-08".into()),
            estimate: Some("1.5e3".into()),
            lower: Some("1,420.00".into()),
            upper: Some("".into()),
        };
        let point = csv_row_to_forecast(&row).unwrap();
        assert_eq!(point.estimate, 1500.0);
        assert_eq!(point.lower_bound, Some(1420.0));
        assert_eq!(point.upper_bound, None);
    }

    #[test]
    fn test_parse_date_formats() {
        let want = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_date("2024-03-05"), want);
        assert_eq!(parse_date("2024-03-05T00:00:00"), want);
        assert_eq!(parse_date("2024-03-05T09:15:00+05:30"), want);
        assert_eq!(parse_date("Mar 05, 2024"), want);
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn test_symbol_key_ignores_spacing() {
        assert_eq!(symbol_key("Nifty 50"), symbol_key("NIFTY50"));
    }

    #[test]
    fn test_quote_passes_change_percent_through() {
        let now = Utc::now();
        let q = raw_to_quote(raw(19245.30), now).unwrap();
        assert_eq!(q.symbol, "NIFTY 50");
        assert_eq!(q.change_percent, 9.99);
        assert_eq!(q.observed_at, now);
        assert_eq!(q.day_high, Some(19298.5));
    }

    #[test]
    fn test_negative_price_is_decode_error() {
        let err = raw_to_quote(raw(-1.0), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_forecast_rows_reject_bad_dates() {
        let rows = vec![RawForecastRow {
            date: "soon".into(),
            estimate: 1.0,
            lower: None,
            upper: None,
        }];
        let err = clean_forecast_rows("INFY", rows).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_forecast_rows_reject_non_monotonic() {
        let row = |date: &str| RawForecastRow {
            date: date.into(),
            estimate: 1.0,
            lower: None,
            upper: None,
        };
        let rows = vec![row("2024-01-02"), row("2024-01-01")];
        assert!(matches!(
            clean_forecast_rows("INFY", rows),
            Err(Error::InvalidInput(_))
        ));
    }
}
