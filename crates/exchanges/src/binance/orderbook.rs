use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use interface::{ExchangeId, OrderBook, OrderBookEntry, Symbol};

use super::{parse_decimal, BinanceClient};
use crate::{ExchangeError, OrderBookExchange};

/// depth 엔드포인트가 허용하는 limit 값
const DEPTH_LIMITS: [usize; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];

#[derive(Debug, Deserialize)]
struct BinanceOrderBookResponse {
    bids: Vec<[String; 2]>, // [price, quantity]
    asks: Vec<[String; 2]>, // [price, quantity]
}

/// 요청 depth 이상인 가장 작은 limit. 5000 을 넘으면 5000
fn depth_limit(depth: usize) -> usize {
    DEPTH_LIMITS
        .iter()
        .copied()
        .find(|l| *l >= depth)
        .unwrap_or(DEPTH_LIMITS[DEPTH_LIMITS.len() - 1])
}

fn parse_levels(side: &str, raw: Vec<[String; 2]>) -> Result<Vec<OrderBookEntry>, ExchangeError> {
    raw.into_iter()
        .map(|[price, quantity]| -> Result<OrderBookEntry, ExchangeError> {
            Ok(OrderBookEntry {
                price: parse_decimal(&format!("{} price", side), &price)?,
                quantity: parse_decimal(&format!("{} quantity", side), &quantity)?,
            })
        })
        .collect()
}

fn to_orderbook(
    symbol: &Symbol,
    response: BinanceOrderBookResponse,
    depth: usize,
) -> Result<OrderBook, ExchangeError> {
    let mut bids = parse_levels("bid", response.bids)?;
    let mut asks = parse_levels("ask", response.asks)?;

    // Binance는 이미 가격 순서대로 정렬되어 있지만, 확실하게 정렬
    bids.sort_by(|a, b| b.price.cmp(&a.price)); // 높은 가격 순
    asks.sort_by(|a, b| a.price.cmp(&b.price)); // 낮은 가격 순
    bids.truncate(depth);
    asks.truncate(depth);

    Ok(OrderBook {
        exchange: ExchangeId::Binance,
        symbol: symbol.clone(),
        bids,
        asks,
        updated_at: Utc::now(),
    })
}

#[async_trait]
impl OrderBookExchange for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_orderbook(
        &self,
        symbol: &Symbol,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError> {
        let response: BinanceOrderBookResponse = self
            .get_json(
                "/api/v3/depth",
                &[
                    ("symbol", symbol.as_str().to_string()),
                    ("limit", depth_limit(depth).to_string()),
                ],
            )
            .await?;
        to_orderbook(symbol, response, depth)
    }
}
