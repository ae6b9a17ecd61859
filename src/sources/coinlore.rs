use super::{PriceProvider, ProviderError, ProviderTicker};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const COINLORE_API_URL: &str = "https://api.coinlore.net/api";

/// Raw ticker as returned by Coinlore. Numeric fields are usually strings.
#[derive(Debug, Deserialize)]
struct CoinloreTicker {
    id: Value,
    name: String,
    symbol: String,
    price_usd: Option<Value>,
    market_cap_usd: Option<Value>,
    volume24: Option<Value>,
    percent_change_24h: Option<Value>,
    percent_change_7d: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CoinloreListing {
    data: Vec<Value>,
}

/// Coinlore REST client.
#[derive(Clone)]
pub struct CoinloreClient {
    client: Client,
    base_url: String,
}

impl CoinloreClient {
    /// Create a new Coinlore client. `timeout` bounds every request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent("cryptogame/0.1 (Price Resolver)")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            warn!("Coinlore rate limited request to {} ({})", url, status);
            return Err(ProviderError::RateLimited(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PriceProvider for CoinloreClient {
    async fn fetch_ticker(&self, provider_id: &str) -> Result<ProviderTicker, ProviderError> {
        let url = format!("{}/ticker/", self.base_url);
        debug!("Fetching Coinlore ticker {}", provider_id);
        let body = self.get_text(&url, &[("id", provider_id.to_string())]).await?;
        parse_ticker(&body, provider_id)
    }

    async fn list_tickers(&self, start: u32, limit: u32) -> Result<Vec<ProviderTicker>, ProviderError> {
        let url = format!("{}/tickers/", self.base_url);
        debug!("Fetching Coinlore listing start={} limit={}", start, limit);
        let body = self
            .get_text(&url, &[("start", start.to_string()), ("limit", limit.to_string())])
            .await?;
        parse_listing(&body)
    }
}

/// Parse a `/ticker/` payload: an array of records or a single record.
pub fn parse_ticker(body: &str, provider_id: &str) -> Result<ProviderTicker, ProviderError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let record = match payload {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(ProviderError::NotFound(provider_id.to_string()));
            }
            items.swap_remove(0)
        }
        Value::Object(_) => payload,
        _ => {
            return Err(ProviderError::Malformed(
                "expected an array or object".to_string(),
            ))
        }
    };

    convert(record)
}

/// Parse a `/tickers/` payload. Records without a usable price are skipped.
pub fn parse_listing(body: &str) -> Result<Vec<ProviderTicker>, ProviderError> {
    let listing: CoinloreListing =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let tickers = listing
        .data
        .into_iter()
        .filter_map(|record| match convert(record) {
            Ok(ticker) => Some(ticker),
            Err(e) => {
                debug!("Skipping listing record: {}", e);
                None
            }
        })
        .collect();

    Ok(tickers)
}

fn convert(record: Value) -> Result<ProviderTicker, ProviderError> {
    let raw: CoinloreTicker =
        serde_json::from_value(record).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let price = raw
        .price_usd
        .as_ref()
        .and_then(decimal_from_value)
        .filter(|p| *p >= Decimal::ZERO)
        .ok_or_else(|| ProviderError::Malformed(format!("invalid price for {}", raw.name)))?;

    let id = match raw.id {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(ProviderError::Malformed(format!("invalid id {}", other))),
    };

    Ok(ProviderTicker {
        id,
        name: raw.name,
        symbol: raw.symbol.to_uppercase(),
        price,
        market_cap: or_zero(raw.market_cap_usd.as_ref()),
        volume_24h: or_zero(raw.volume24.as_ref()),
        percent_change_24h: or_zero(raw.percent_change_24h.as_ref()),
        percent_change_7d: or_zero(raw.percent_change_7d.as_ref()),
    })
}

fn or_zero(value: Option<&Value>) -> Decimal {
    value.and_then(decimal_from_value).unwrap_or(Decimal::ZERO)
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BTC_TICKER: &str = r#"[{"id":"90","symbol":"btc","name":"Bitcoin","nameid":"bitcoin","rank":1,
        "price_usd":"43210.55","percent_change_24h":"1.20","percent_change_7d":"-3.05",
        "market_cap_usd":"846000000000.00","volume24":25000000000.5,"csupply":"19600000.00"}]"#;

    #[test]
    fn test_parse_ticker_array() {
        let ticker = parse_ticker(BTC_TICKER, "90").unwrap();
        assert_eq!(ticker.id, "90");
        assert_eq!(ticker.name, "Bitcoin");
        assert_eq!(ticker.symbol, "BTC");
        assert_eq!(ticker.price, dec!(43210.55));
        assert_eq!(ticker.percent_change_7d, dec!(-3.05));
        assert_eq!(ticker.volume_24h, dec!(25000000000.5));
    }

    #[test]
    fn test_parse_ticker_single_object() {
        let body = r#"{"id":80,"symbol":"eth","name":"Ethereum","price_usd":"2250.10"}"#;
        let ticker = parse_ticker(body, "80").unwrap();
        assert_eq!(ticker.id, "80");
        assert_eq!(ticker.price, dec!(2250.10));
        assert_eq!(ticker.market_cap, Decimal::ZERO);
    }

    #[test]
    fn test_parse_ticker_scientific_price() {
        let body = r#"[{"id":"1","symbol":"shib","name":"Shiba","price_usd":"1.2e-5"}]"#;
        let ticker = parse_ticker(body, "1").unwrap();
        assert_eq!(ticker.price, dec!(0.000012));
    }

    #[test]
    fn test_parse_ticker_empty_array_is_not_found() {
        assert_eq!(
            parse_ticker("[]", "999"),
            Err(ProviderError::NotFound("999".to_string()))
        );
    }

    #[test]
    fn test_parse_ticker_malformed_payloads() {
        assert!(matches!(parse_ticker("", "90"), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_ticker("\"oops\"", "90"), Err(ProviderError::Malformed(_))));
        assert!(matches!(
            parse_ticker(r#"[{"id":"90","name":"Bitcoin"}]"#, "90"),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            parse_ticker(r#"[{"id":"90","symbol":"btc","name":"Bitcoin","price_usd":"n/a"}]"#, "90"),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            parse_ticker(r#"[{"id":"90","symbol":"btc","name":"Bitcoin","price_usd":"-1"}]"#, "90"),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_listing_skips_bad_records() {
        let body = r#"{"data":[
            {"id":"90","symbol":"BTC","name":"Bitcoin","price_usd":"43000"},
            {"id":"0","symbol":"BAD","name":"Broken","price_usd":""},
            {"id":"80","symbol":"ETH","name":"Ethereum","price_usd":"2200"}
        ],"info":{"coins_num":3}}"#;

        let tickers = parse_listing(body).unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[1].symbol, "ETH");
    }

    #[test]
    fn test_parse_listing_missing_data() {
        assert!(matches!(
            parse_listing(r#"{"info":{}}"#),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = CoinloreClient::new("https://example.com/api/", Duration::from_secs(1));
        assert_eq!(client.base_url, "https://example.com/api");
    }
}
