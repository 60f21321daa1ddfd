use rust_decimal::Decimal;
use thiserror::Error;

use exchanges::ExchangeError;
use interface::Symbol;

/// 환경변수 값이 잘못된 경우. 시작 단계에서 치명적
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidQuoteError {
    #[error("crossed book for {symbol}: ask {ask} < bid {bid}")]
    Crossed {
        symbol: Symbol,
        bid: Decimal,
        ask: Decimal,
    },
    #[error("missing {side} side for {symbol}")]
    MissingSide { symbol: Symbol, side: &'static str },
}

/// 심볼 하나를 샘플링하다 난 오류. 해당 심볼만 이번 틱에서 빠진다
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] ExchangeError),
    #[error(transparent)]
    InvalidQuote(#[from] InvalidQuoteError),
}

impl SampleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SampleError::Upstream(e) => e.is_retryable(),
            SampleError::InvalidQuote(_) => false,
        }
    }
}
