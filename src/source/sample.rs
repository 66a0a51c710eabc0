//! Built-in sample market data for offline runs and tests.

use crate::error::{Error, Result};
use crate::models::{Listing, Quote};
use crate::source::QuoteSource;
use crate::source::cleaner::{parse_volume_shorthand, symbol_key};
use async_trait::async_trait;
use chrono::Utc;

/// symbol, value, change, change %, day high, day low
const INDICES: &[(&str, f64, f64, f64, f64, f64)] = &[
    ("NIFTY 50", 19245.30, 142.85, 0.75, 19298.50, 19156.20),
    ("SENSEX", 64718.56, 459.83, 0.71, 64852.10, 64301.25),
    ("BANK NIFTY", 43158.70, -298.45, -0.69, 43456.80, 43089.15),
];

/// symbol, name, price, change, change %, volume
const STOCKS: &[(&str, &str, f64, f64, f64, &str)] = &[
    ("RELIANCE", "Reliance Industries Ltd", 2456.80, 4.23, 0.17, "2.5M"),
    ("TCS", "Tata Consultancy Services", 3567.90, 45.60, 1.29, "1.8M"),
    ("HDFCBANK", "HDFC Bank Ltd", 1678.45, 23.15, 1.40, "3.2M"),
    ("INFY", "Infosys Ltd", 1432.80, -18.90, -1.30, "2.1M"),
    ("ICICIBANK", "ICICI Bank Ltd", 945.60, -12.30, -1.28, "4.1M"),
];

/// Static quote table. Unknown symbols fail with `Decode`, the same way a
/// live payload missing the symbol would.
#[derive(Debug, Clone, Default)]
pub struct SampleSource;

impl SampleSource {
    pub fn new() -> Self {
        Self
    }

    /// The searchable stock table.
    pub fn listings(&self) -> Vec<Listing> {
        STOCKS
            .iter()
            .map(|&(symbol, name, price, change, change_percent, volume)| Listing {
                symbol: symbol.to_string(),
                name: name.to_string(),
                exchange: Some("NSE".to_string()),
                price,
                change,
                change_percent,
                volume: parse_volume_shorthand(volume),
            })
            .collect()
    }

    fn lookup(&self, symbol: &str) -> Option<Quote> {
        let key = symbol_key(symbol);
        let now = Utc::now();

        let index = INDICES
            .iter()
            .find(|row| symbol_key(row.0) == key)
            .map(|&(sym, price, change, pct, high, low)| Quote {
                symbol: sym.to_string(),
                price,
                change,
                change_percent: pct,
                day_high: Some(high),
                day_low: Some(low),
                observed_at: now,
            });

        index.or_else(|| {
            STOCKS
                .iter()
                .find(|row| symbol_key(row.0) == key)
                .map(|&(sym, _, price, change, pct, _)| Quote {
                    symbol: sym.to_string(),
                    price,
                    change,
                    change_percent: pct,
                    day_high: None,
                    day_low: None,
                    observed_at: now,
                })
        })
    }
}

#[async_trait]
impl QuoteSource for SampleSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        self.lookup(symbol)
            .ok_or_else(|| Error::Decode(format!("{}: no sample quote", symbol)))
    }
}
