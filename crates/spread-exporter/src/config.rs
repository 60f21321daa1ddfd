use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use interface::Symbol;

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq)]
pub struct ExporterConfig {
    /// 샘플링 주기 (`SAMPLING_INTERVAL`, 초)
    pub sampling_interval: Duration,
    /// 응답 캐시 사용 여부 (`CACHE`)
    pub cache_enabled: bool,
    /// 캐시 항목 수명 (`CACHE_TTL`, 초)
    pub cache_ttl: Duration,
    /// `/metrics` 를 여는 포트 (`PORT`)
    pub port: u16,
    /// 업스트림 호출 한 번의 타임아웃 (`FETCH_TIMEOUT`, 초).
    /// 샘플링 주기와는 별개다.
    pub fetch_timeout: Duration,
    /// 고정 심볼 목록 (`SYMBOLS`, 콤마 구분). 비어 있으면 거래량 순위로 고른다
    pub symbols: Vec<Symbol>,
    pub quote_asset: String,
    pub top_symbols: usize,
    pub base_api_url: String,
    /// 설정되면 일별 로그 파일도 남긴다
    pub log_dir: Option<PathBuf>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(10),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(60),
            port: 8080,
            fetch_timeout: Duration::from_secs(5),
            symbols: Vec::new(),
            quote_asset: "USDT".to_string(),
            top_symbols: 5,
            base_api_url: "https://api.binance.com".to_string(),
            log_dir: None,
        }
    }
}

impl ExporterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` 으로 값을 읽어 설정을 만든다. 없는 키는 기본값
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sampling_interval = match get("SAMPLING_INTERVAL") {
            Some(v) => positive_secs("SAMPLING_INTERVAL", &v)?,
            None => defaults.sampling_interval,
        };
        let cache_enabled = match get("CACHE") {
            Some(v) => parse_bool("CACHE", &v)?,
            None => defaults.cache_enabled,
        };
        let cache_ttl = match get("CACHE_TTL") {
            Some(v) => positive_secs("CACHE_TTL", &v)?,
            None => defaults.cache_ttl,
        };
        let port = match get("PORT") {
            Some(v) => parse_num::<u16>("PORT", &v)?,
            None => defaults.port,
        };
        let fetch_timeout = match get("FETCH_TIMEOUT") {
            Some(v) => positive_secs("FETCH_TIMEOUT", &v)?,
            None => defaults.fetch_timeout,
        };
        let symbols = match get("SYMBOLS") {
            Some(v) => parse_symbols(&v)?,
            None => defaults.symbols,
        };
        let quote_asset = get("QUOTE_ASSET")
            .map(|v| v.trim().to_uppercase())
            .unwrap_or(defaults.quote_asset);
        let top_symbols = match get("TOP_SYMBOLS") {
            Some(v) => {
                let n = parse_num::<usize>("TOP_SYMBOLS", &v)?;
                if n == 0 {
                    return Err(invalid("TOP_SYMBOLS", &v, "must be greater than zero"));
                }
                n
            }
            None => defaults.top_symbols,
        };
        let base_api_url = get("BASE_API_URL")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.base_api_url);
        let log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(Self {
            sampling_interval,
            cache_enabled,
            cache_ttl,
            port,
            fetch_timeout,
            symbols,
            quote_asset,
            top_symbols,
            base_api_url,
            log_dir,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_num<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| invalid(key, value, e.to_string()))
}

/// 초 단위. 소수도 허용 (예: "0.5")
fn positive_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs = parse_num::<f64>(key, value)?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid(key, value, "must be a positive number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true/false")),
    }
}

fn parse_symbols(value: &str) -> Result<Vec<Symbol>, ConfigError> {
    let mut out: Vec<Symbol> = Vec::new();
    for raw in value.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("SYMBOLS", value, format!("bad symbol {:?}", raw)));
        }
        let symbol = Symbol::new(raw);
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ExporterConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExporterConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg, ExporterConfig::default());
        assert_eq!(cfg.sampling_interval, Duration::from_secs(10));
        assert!(cfg.cache_enabled);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_overrides() {
        let cfg = from_pairs(&[
            ("SAMPLING_INTERVAL", "2.5"),
            ("CACHE", "off"),
            ("CACHE_TTL", "10"),
            ("PORT", "9100"),
            ("SYMBOLS", "ethusdt, BTCUSDT,,ETHUSDT"),
            ("QUOTE_ASSET", "btc"),
            ("LOG_DIR", "/var/log/spread"),
        ])
        .unwrap();

        assert_eq!(cfg.sampling_interval, Duration::from_millis(2500));
        assert!(!cfg.cache_enabled);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(10));
        assert_eq!(cfg.port, 9100);
        assert_eq!(
            cfg.symbols,
            vec![Symbol::new("ETHUSDT"), Symbol::new("BTCUSDT")]
        );
        assert_eq!(cfg.quote_asset, "BTC");
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/var/log/spread")));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let cfg = from_pairs(&[("PORT", "  "), ("CACHE", "")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.cache_enabled);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = from_pairs(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = from_pairs(&[("CACHE", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CACHE", .. }));

        let err = from_pairs(&[("SAMPLING_INTERVAL", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "SAMPLING_INTERVAL",
                ..
            }
        ));

        let err = from_pairs(&[("CACHE_TTL", "-3")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CACHE_TTL", .. }));

        let err = from_pairs(&[("PORT", "70000")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = from_pairs(&[("SYMBOLS", "ETH/USDT")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SYMBOLS", .. }));

        let err = from_pairs(&[("TOP_SYMBOLS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOP_SYMBOLS", .. }));
    }
}
