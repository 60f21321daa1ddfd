use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use interface::{ExchangeId, Quote, Symbol, TickerStat};

use super::{parse_decimal, parse_price_side, BinanceClient};
use crate::{ExchangeError, QuoteExchange, SymbolRanking};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBookTicker {
    symbol: String,
    #[serde(default)]
    bid_price: Option<String>,
    #[serde(default)]
    ask_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    volume: String,
}

fn to_quote(ticker: BinanceBookTicker) -> Result<Quote, ExchangeError> {
    Ok(Quote {
        exchange: ExchangeId::Binance,
        symbol: Symbol::new(&ticker.symbol),
        best_bid: parse_price_side("bidPrice", ticker.bid_price.as_deref())?,
        best_ask: parse_price_side("askPrice", ticker.ask_price.as_deref())?,
        updated_at: Utc::now(),
    })
}

/// exchangeInfo 의 quote asset 필터와 24h 티커를 합친다
fn join_ticker_stats(
    info: BinanceExchangeInfo,
    tickers: Vec<BinanceTicker24h>,
    quote_asset: &str,
) -> Result<Vec<TickerStat>, ExchangeError> {
    let wanted: HashSet<String> = info
        .symbols
        .into_iter()
        .filter(|s| s.quote_asset.eq_ignore_ascii_case(quote_asset))
        .map(|s| s.symbol)
        .collect();

    let mut out = Vec::with_capacity(wanted.len());
    for ticker in tickers {
        if !wanted.contains(&ticker.symbol) {
            continue;
        }
        out.push(TickerStat {
            symbol: Symbol::new(&ticker.symbol),
            quote_asset: quote_asset.to_uppercase(),
            volume: parse_decimal("volume", &ticker.volume)?,
        });
    }
    Ok(out)
}

#[async_trait]
impl QuoteExchange for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ExchangeError> {
        let ticker: BinanceBookTicker = self
            .get_json(
                "/api/v3/ticker/bookTicker",
                &[("symbol", symbol.as_str().to_string())],
            )
            .await?;
        to_quote(ticker)
    }
}

#[async_trait]
impl SymbolRanking for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_ticker_stats(
        &self,
        quote_asset: &str,
    ) -> Result<Vec<TickerStat>, ExchangeError> {
        let info: BinanceExchangeInfo = self.get_json("/api/v3/exchangeInfo", &[]).await?;
        let tickers: Vec<BinanceTicker24h> = self.get_json("/api/v3/ticker/24hr", &[]).await?;
        join_ticker_stats(info, tickers, quote_asset)
    }
}
