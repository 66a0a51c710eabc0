use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Quote ─────────────────────────────────────────────────────────────────────

/// A point-in-time market reading. `change_percent` is passed through as the
/// source reported it and never re-derived from `price`/`change`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

// ── Series points ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RealizedPoint {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub estimate: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
}

impl ForecastPoint {
    pub fn new(date: NaiveDate, estimate: f64) -> Self {
        Self {
            date,
            estimate,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }
}

// ── Overlay output ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct OverlayRow {
    pub date: NaiveDate,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Realized and forecast values merged on one date axis.
/// `boundary_index` is the last row carrying an `actual` value.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OverlaySeries {
    pub rows: Vec<OverlayRow>,
    pub boundary_index: Option<usize>,
}

impl OverlaySeries {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows strictly after the boundary: pure projection.
    pub fn projected(&self) -> &[OverlayRow] {
        match self.boundary_index {
            Some(i) => &self.rows[i + 1..],
            None => &self.rows,
        }
    }
}

// ── Stock listing (search table) ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Listing {
    pub symbol: String,
    pub name: String,
    pub exchange: Option<String>,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<i64>,
}

// ── Raw wire rows ─────────────────────────────────────────────────────────────

/// Quote object as served by the quote endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    #[serde(rename = "changePercent", alias = "change_percent", alias = "change_pct")]
    pub change_percent: f64,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default, rename = "observedAt", alias = "observed_at", alias = "timestamp")]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Quote endpoint answers with either one object or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawQuotePayload {
    Many(Vec<RawQuote>),
    One(RawQuote),
}

/// One forecast row; accepts both the plain names and the `ds`/`yhat`
/// column names used by the prediction service.
#[derive(Debug, Clone, Deserialize)]
pub struct RawForecastRow {
    #[serde(alias = "ds")]
    pub date: String,
    #[serde(alias = "yhat")]
    pub estimate: f64,
    #[serde(default, alias = "yhat_lower", alias = "lowerBound")]
    pub lower: Option<f64>,
    #[serde(default, alias = "yhat_upper", alias = "upperBound")]
    pub upper: Option<f64>,
}

/// The prediction service answers with rows, or `{ "error": "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawForecastPayload {
    Rows(Vec<RawForecastRow>),
    Failure { error: String },
}

/// investing.com history CSV: Date, Price, Open, High, Low, Volume, Change%
#[derive(Debug, Clone, Default)]
pub struct RawCsvRow {
    pub date: Option<String>,
    pub price: Option<String>,
}

/// Offline forecast CSV: date, estimate, lower, upper
#[derive(Debug, Clone, Default)]
pub struct RawForecastCsvRow {
    pub date: Option<String>,
    pub estimate: Option<String>,
    pub lower: Option<String>,
    pub upper: Option<String>,
}
