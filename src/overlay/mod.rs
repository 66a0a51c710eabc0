//! Forecast overlay: merges realized history and a model forecast onto one
//! date axis for charting.
//!
//! The builder is a pure function over its two inputs. Dates present in both
//! inputs (a backtest window) produce a single row carrying both `actual` and
//! `predicted`. No interpolation is done: missing values stay `None`.

use crate::error::{Error, Result};
use crate::models::{ForecastPoint, OverlayRow, OverlaySeries, RealizedPoint};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Build the merged series. Fails with `InvalidInput` on duplicate or
/// out-of-order dates, non-finite values, a negative realized price, or
/// bounds that do not enclose the estimate.
pub fn build(realized: &[RealizedPoint], forecast: &[ForecastPoint]) -> Result<OverlaySeries> {
    validate_realized(realized)?;
    validate_forecast(forecast)?;

    let mut rows = Vec::with_capacity(realized.len() + forecast.len());
    let mut boundary_index = None;
    let (mut i, mut j) = (0, 0);

    while i < realized.len() || j < forecast.len() {
        let row = match (realized.get(i), forecast.get(j)) {
            (Some(a), Some(p)) => match a.date.cmp(&p.date) {
                Ordering::Less => {
                    i += 1;
                    actual_row(a)
                }
                Ordering::Greater => {
                    j += 1;
                    predicted_row(p)
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                    OverlayRow {
                        actual: Some(a.price),
                        ..predicted_row(p)
                    }
                }
            },
            (Some(a), None) => {
                i += 1;
                actual_row(a)
            }
            (None, Some(p)) => {
                j += 1;
                predicted_row(p)
            }
            (None, None) => break,
        };

        if row.actual.is_some() {
            boundary_index = Some(rows.len());
        }
        rows.push(row);
    }

    Ok(OverlaySeries { rows, boundary_index })
}

fn actual_row(p: &RealizedPoint) -> OverlayRow {
    OverlayRow {
        date: p.date,
        actual: Some(p.price),
        predicted: None,
        lower: None,
        upper: None,
    }
}

fn predicted_row(p: &ForecastPoint) -> OverlayRow {
    OverlayRow {
        date: p.date,
        actual: None,
        predicted: Some(p.estimate),
        lower: p.lower_bound,
        upper: p.upper_bound,
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Dates must be strictly increasing: equal neighbours are duplicates,
/// a decrease means the input was not sorted.
pub fn check_increasing<'a>(
    label: &str,
    dates: impl IntoIterator<Item = &'a NaiveDate>,
) -> Result<()> {
    let mut prev: Option<&NaiveDate> = None;
    for (i, date) in dates.into_iter().enumerate() {
        if let Some(p) = prev {
            match date.cmp(p) {
                Ordering::Equal => {
                    return Err(Error::InvalidInput(format!(
                        "{label}: duplicate date {date} at index {i}"
                    )));
                }
                Ordering::Less => {
                    return Err(Error::InvalidInput(format!(
                        "{label}: date {date} at index {i} precedes {p}"
                    )));
                }
                Ordering::Greater => {}
            }
        }
        prev = Some(date);
    }
    Ok(())
}

fn validate_realized(points: &[RealizedPoint]) -> Result<()> {
    check_increasing("realized", points.iter().map(|p| &p.date))?;
    if let Some(p) = points.iter().find(|p| !p.price.is_finite() || p.price < 0.0) {
        return Err(Error::InvalidInput(format!(
            "realized: bad price {} on {}",
            p.price, p.date
        )));
    }
    Ok(())
}

fn validate_forecast(points: &[ForecastPoint]) -> Result<()> {
    check_increasing("forecast", points.iter().map(|p| &p.date))?;
    for p in points {
        validate_forecast_point(p)?;
    }
    Ok(())
}

pub fn validate_forecast_point(p: &ForecastPoint) -> Result<()> {
    let finite = |v: Option<f64>| v.is_none_or(f64::is_finite);
    if !p.estimate.is_finite() || !finite(p.lower_bound) || !finite(p.upper_bound) {
        return Err(Error::InvalidInput(format!(
            "forecast: non-finite value on {}",
            p.date
        )));
    }
    if let (Some(lo), Some(hi)) = (p.lower_bound, p.upper_bound)
        && !(lo <= p.estimate && p.estimate <= hi)
    {
        return Err(Error::InvalidInput(format!(
            "forecast: bounds [{lo}, {hi}] do not enclose {} on {}",
            p.estimate, p.date
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
