pub mod cleaner;
pub mod http_client;
pub mod sample;

use crate::config::{ForecastSourceConfig, QuoteSourceConfig};
use crate::error::{Error, Result};
use crate::models::{ForecastPoint, Quote, RawForecastPayload, RawQuotePayload};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use self::cleaner::{clean_forecast_rows, raw_to_quote, symbol_key};
use self::http_client::HttpClient;

// ── Source traits ─────────────────────────────────────────────────────────────

/// Current price reading for one symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

/// Dated point estimates for one symbol, ascending by date.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_forecast(&self, symbol: &str) -> Result<Vec<ForecastPoint>>;
}

fn parse_base(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| Error::InvalidInput(format!("bad base url {:?}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidInput(format!("{:?} cannot be a base url", base_url)));
    }
    Ok(url)
}

fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

// ── HTTP quote source ─────────────────────────────────────────────────────────

/// `GET {base}/quotes?symbols=<SYMBOL>`; the body is one quote object or an
/// array of them.
pub struct HttpQuoteSource {
    client: HttpClient,
    base_url: Url,
}

impl HttpQuoteSource {
    pub fn new(config: &QuoteSourceConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(&config.user_agent, config.timeout_secs)?,
            base_url: parse_base(&config.base_url)?,
        })
    }

    fn quote_url(&self, symbol: &str) -> Url {
        let mut url = with_segments(&self.base_url, &["quotes"]);
        url.query_pairs_mut().append_pair("symbols", symbol);
        url
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let url = self.quote_url(symbol);
        let payload: RawQuotePayload = self.client.get_json(url.as_str()).await?;
        let fetched_at = Utc::now();

        let wanted = symbol_key(symbol);
        let raw = match payload {
            RawQuotePayload::One(q) => Some(q),
            RawQuotePayload::Many(list) => list.into_iter().find(|q| symbol_key(&q.symbol) == wanted),
        }
        .filter(|q| symbol_key(&q.symbol) == wanted)
        .ok_or_else(|| Error::Decode(format!("{}: not present in quote payload", symbol)))?;

        let quote = raw_to_quote(raw, fetched_at)?;
        debug!("{}: {} ({:+.2}%)", quote.symbol, quote.price, quote.change_percent);
        Ok(quote)
    }
}

// ── HTTP forecast source ──────────────────────────────────────────────────────

/// `GET {base}/predict/<SYMBOL>` on the prediction service.
pub struct HttpForecastSource {
    client: HttpClient,
    base_url: Url,
}

impl HttpForecastSource {
    pub fn new(config: &ForecastSourceConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(&config.user_agent, config.timeout_secs)?,
            base_url: parse_base(&config.base_url)?,
        })
    }

    fn predict_url(&self, symbol: &str) -> Url {
        with_segments(&self.base_url, &["predict", symbol])
    }
}

#[async_trait]
impl ForecastSource for HttpForecastSource {
    async fn fetch_forecast(&self, symbol: &str) -> Result<Vec<ForecastPoint>> {
        let url = self.predict_url(symbol);
        info!("Fetching forecast for {} ({})", symbol, url);

        match self.client.get_json(url.as_str()).await? {
            RawForecastPayload::Rows(rows) => {
                let points = clean_forecast_rows(symbol, rows)?;
                info!("{}: {} forecast points", symbol, points.len());
                Ok(points)
            }
            RawForecastPayload::Failure { error } => Err(Error::Transport(format!(
                "prediction service failed for {}: {}",
                symbol, error
            ))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quote_source(server: &MockServer) -> HttpQuoteSource {
        HttpQuoteSource::new(&QuoteSourceConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..QuoteSourceConfig::default()
        })
        .unwrap()
    }

    fn forecast_source(server: &MockServer) -> HttpForecastSource {
        HttpForecastSource::new(&ForecastSourceConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
            ..ForecastSourceConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_quote_picks_matching_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quotes"))
            .and(query_param("symbols", "SENSEX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "symbol": "NIFTY 50", "price": 19245.30, "change": 142.85, "changePercent": 0.75 },
                { "symbol": "sensex", "price": 64718.56, "change": 459.83, "changePercent": 0.71,
                  "high": 64852.10, "low": 64301.25 }
            ])))
            .mount(&server)
            .await;

        let quote = quote_source(&server).fetch_quote("SENSEX").await.unwrap();
        assert_eq!(quote.symbol, "SENSEX");
        assert_eq!(quote.price, 64718.56);
        assert_eq!(quote.change_percent, 0.71);
        assert_eq!(quote.day_low, Some(64301.25));
    }

    #[tokio::test]
    async fn test_quote_single_object_with_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quotes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "BANK NIFTY", "price": 43158.70, "change": -298.45,
                "change_pct": -0.69, "observedAt": "2024-01-05T10:00:00Z"
            })))
            .mount(&server)
            .await;

        let quote = quote_source(&server).fetch_quote("bank nifty").await.unwrap();
        assert_eq!(quote.change, -298.45);
        assert_eq!(quote.observed_at.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[tokio::test]
    async fn test_quote_shape_mismatch_is_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "symbol": "TCS" })))
            .mount(&server)
            .await;

        let err = quote_source(&server).fetch_quote("TCS").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_quote_missing_symbol_is_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "symbol": "TCS", "price": 1.0, "change": 0.0, "changePercent": 0.0 }
            ])))
            .mount(&server)
            .await;

        let err = quote_source(&server).fetch_quote("INFY").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_http_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = quote_source(&server).fetch_quote("TCS").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_forecast_accepts_prediction_service_columns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predict/INFY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "ds": "2024-01-08T00:00:00", "yhat": 1441.2 },
                { "ds": "2024-01-09T00:00:00", "yhat": 1444.9, "yhat_lower": 1420.0, "yhat_upper": 1470.0 }
            ])))
            .mount(&server)
            .await;

        let points = forecast_source(&server).fetch_forecast("INFY").await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(points[0].lower_bound, None);
        assert_eq!(points[1].upper_bound, Some(1470.0));
    }

    #[tokio::test]
    async fn test_forecast_error_envelope_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predict/XYZ"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "No data found" })),
            )
            .mount(&server)
            .await;

        let err = forecast_source(&server).fetch_forecast("XYZ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_forecast_non_monotonic_is_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "date": "2024-01-09", "estimate": 10.0 },
                { "date": "2024-01-08", "estimate": 11.0 }
            ])))
            .mount(&server)
            .await;

        let err = forecast_source(&server).fetch_forecast("TCS").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let cfg = QuoteSourceConfig {
            base_url: "not a url".into(),
            ..QuoteSourceConfig::default()
        };
        assert!(matches!(HttpQuoteSource::new(&cfg), Err(Error::InvalidInput(_))));
    }
}
