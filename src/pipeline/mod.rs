//! Wiring between the refresh scheduler, the data sources and the overlay
//! builder.
//!
//! ## Flow
//!
//! `QuoteBoard::start` runs one scheduler per symbol; nothing is shared
//! between symbols. `follow` watches one subscription, logs every transition
//! and folds each `Ready` quote into a `RealizedTrail`, which is the realized
//! input of `assemble_overlay`.

use crate::error::{Error, Result};
use crate::models::{OverlaySeries, Quote, RealizedPoint};
use crate::overlay;
use crate::scheduler::{self, RefreshPolicy, RefreshState, RefreshStatus, SubscriptionHandle};
use crate::source::{ForecastSource, QuoteSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ── Realized trail ────────────────────────────────────────────────────────────

/// One realized point per observation date, built from successive quotes.
/// A later quote on the same date replaces that day's price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealizedTrail {
    points: Vec<RealizedPoint>,
}

impl RealizedTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the quote is older than the trail's last day.
    pub fn record(&mut self, quote: &Quote) -> bool {
        let date = quote.observed_at.date_naive();
        match self.points.last_mut() {
            Some(last) if last.date == date => last.price = quote.price,
            Some(last) if last.date > date => {
                warn!("{}: ignoring quote from {} (trail already at {})", quote.symbol, date, last.date);
                return false;
            }
            _ => self.points.push(RealizedPoint { date, price: quote.price }),
        }
        true
    }

    pub fn points(&self) -> &[RealizedPoint] {
        &self.points
    }
}

// ── Quote board ───────────────────────────────────────────────────────────────

/// One independent refresh subscription per symbol.
pub struct QuoteBoard {
    handles: Vec<SubscriptionHandle<Quote>>,
}

impl QuoteBoard {
    pub fn start(
        source: Arc<dyn QuoteSource>,
        symbols: &[String],
        policy: RefreshPolicy,
    ) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::InvalidInput("no symbols to watch".into()));
        }

        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let source = Arc::clone(&source);
            let sym = symbol.clone();
            let fetch = move || {
                let source = Arc::clone(&source);
                let sym = sym.clone();
                async move { source.fetch_quote(&sym).await }
            };
            handles.push(scheduler::start(symbol.clone(), fetch, policy)?);
        }

        info!("Watching {} symbols", handles.len());
        Ok(Self { handles })
    }

    pub fn handles(&self) -> &[SubscriptionHandle<Quote>] {
        &self.handles
    }

    pub fn snapshots(&self) -> Vec<(String, RefreshState<Quote>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.snapshot()))
            .collect()
    }

    pub fn stop_all(&self) {
        for h in &self.handles {
            h.stop();
        }
    }
}

// ── Following a subscription ──────────────────────────────────────────────────

fn log_transition(name: &str, state: &RefreshState<Quote>) {
    match state.status {
        RefreshStatus::Loading if state.is_refreshing() => debug!("{}: refreshing…", name),
        RefreshStatus::Loading => debug!("{}: loading…", name),
        RefreshStatus::Ready => {
            if let Some(q) = &state.latest {
                info!(
                    "{}: {:.2} ({:+.2}, {:+.2}%)",
                    q.symbol, q.price, q.change, q.change_percent
                );
            }
        }
        RefreshStatus::Failed => match (&state.latest, state.last_updated_at) {
            (Some(q), Some(at)) => warn!(
                "{}: refresh failed, showing stale {:.2} from {}",
                name,
                q.price,
                at.format("%H:%M:%S")
            ),
            _ => warn!("{}: no data yet", name),
        },
        RefreshStatus::Idle | RefreshStatus::Stopped => {}
    }
}

/// Log every transition of one subscription and collect each successful
/// refresh. The watch channel only keeps the newest state, so a refresh is
/// detected by `last_updated_at` moving forward rather than by catching the
/// `Ready` status itself. Returns when the subscription stops, or after
/// `max_updates` refreshes when a limit is given.
pub async fn follow(
    name: String,
    mut rx: watch::Receiver<RefreshState<Quote>>,
    max_updates: Option<usize>,
) -> RealizedTrail {
    let mut trail = RealizedTrail::new();
    let mut updates = 0usize;
    let mut seen: Option<DateTime<Utc>> = None;

    loop {
        let state = rx.borrow_and_update().clone();
        log_transition(&name, &state);

        if let (Some(q), Some(at)) = (&state.latest, state.last_updated_at)
            && seen.is_none_or(|prev| at > prev)
        {
            seen = Some(at);
            trail.record(q);
            updates += 1;
            if max_updates.is_some_and(|max| updates >= max) {
                break;
            }
        }
        if state.status == RefreshStatus::Stopped {
            break;
        }

        if rx.changed().await.is_err() {
            break;
        }
    }

    trail
}

// ── Forecast overlay ──────────────────────────────────────────────────────────

/// Fetch the forecast for `symbol` and merge it with `realized`. Any failure
/// is returned to the caller; a partial series is never produced.
pub async fn assemble_overlay(
    symbol: &str,
    realized: &[RealizedPoint],
    source: &dyn ForecastSource,
) -> Result<OverlaySeries> {
    let forecast = source.fetch_forecast(symbol).await?;
    let series = overlay::build(realized, &forecast)?;
    info!(
        "{}: overlay of {} rows ({} realized, {} forecast, boundary {:?})",
        symbol,
        series.len(),
        realized.len(),
        forecast.len(),
        series.boundary_index
    );
    Ok(series)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
