use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeId {
    Binance,
}

/// 거래쌍 식별자 (예: "ETHUSDT").
/// 생성 시 대문자로 정규화되고 이후에는 바뀌지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

/// 최우선 호가. 한쪽 호가가 비어 있으면 `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    /// 높은 가격 순
    pub bids: Vec<OrderBookEntry>,
    /// 낮은 가격 순
    pub asks: Vec<OrderBookEntry>,
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// 상위 `depth` 호가의 명목가 합계 (price * quantity) 를 (bid, ask) 로 반환
    pub fn notional(&self, depth: usize) -> (Decimal, Decimal) {
        let sum = |levels: &[OrderBookEntry]| {
            levels
                .iter()
                .take(depth)
                .map(|l| l.price * l.quantity)
                .sum::<Decimal>()
        };
        (sum(&self.bids), sum(&self.asks))
    }
}

/// 24시간 티커 통계 중 심볼 선정에 쓰는 값만
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStat {
    pub symbol: Symbol,
    pub quote_asset: String,
    /// base asset 기준 거래량
    pub volume: Decimal,
}
