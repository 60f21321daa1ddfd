use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::debug;

use crate::ExchangeError;

mod orderbook;
mod spot;

pub const BASE_URL: &str = "https://api.binance.com";

/// 업스트림 호출 한 번에 허용하는 기본 시간
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// base url 과 요청 타임아웃을 지정해서 생성
    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET 후 2xx 가 아니면 `ExchangeError::Status` 로 변환
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let response_text = response.text().await?;
            debug!("Binance API HTTP error: {} {} -> {}", path, status, response_text);
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect::<String>(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(format!("{}: {}", path, e)))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Binance 는 가격/수량을 문자열로 내려준다
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(raw)
        .map_err(|e| ExchangeError::Decode(format!("Failed to parse {} {:?}: {}", field, raw, e)))
}

/// 빈 문자열이나 0 은 호가가 없는 것으로 본다
pub(crate) fn parse_price_side(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<Decimal>, ExchangeError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => {
            let v = parse_decimal(field, s)?;
            Ok(if v.is_zero() { None } else { Some(v) })
        }
    }
}
