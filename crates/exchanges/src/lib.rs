use async_trait::async_trait;

use interface::{ExchangeId, OrderBook, Quote, Symbol, TickerStat};

pub use interface::ExchangeError;

pub mod binance;

/// 심볼 하나의 최우선 호가를 가져오는 Market Data Client
#[async_trait]
pub trait QuoteExchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ExchangeError>;
}

#[async_trait]
pub trait OrderBookExchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// 상위 `depth` 레벨까지의 오더북 조회
    async fn fetch_orderbook(
        &self,
        symbol: &Symbol,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError>;
}

/// 모니터링할 심볼 목록을 정하기 위한 24h 통계 조회
#[async_trait]
pub trait SymbolRanking: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// quote asset 이 일치하는 심볼의 24h 통계
    async fn fetch_ticker_stats(
        &self,
        quote_asset: &str,
    ) -> Result<Vec<TickerStat>, ExchangeError>;

    /// 24h 거래량 내림차순 상위 `top` 개 심볼
    async fn fetch_top_symbols(
        &self,
        quote_asset: &str,
        top: usize,
    ) -> Result<Vec<Symbol>, ExchangeError> {
        let mut stats = self.fetch_ticker_stats(quote_asset).await?;
        stats.sort_by(|a, b| b.volume.cmp(&a.volume));
        Ok(stats.into_iter().take(top).map(|s| s.symbol).collect())
    }
}

// Convenience re-exports
pub use binance::BinanceClient;
