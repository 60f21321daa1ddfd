use std::net::SocketAddr;
use std::sync::Arc;

use eyre::{eyre, WrapErr};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use exchanges::{BinanceClient, OrderBookExchange, QuoteExchange, SymbolRanking};
use interface::Symbol;

use crate::cache::CachedQuoteSource;
use crate::config::ExporterConfig;
use crate::sampler::{self, start_sample_loop, Sampler};
use crate::server::{self, AppState};
use crate::store::MetricsStore;

/// 모니터링할 심볼 집합을 한 번 정한다.
/// `SYMBOLS` 가 있으면 그대로, 없으면 24h 거래량 상위 N 개
pub async fn resolve_symbols(
    cfg: &ExporterConfig,
    ranking: &dyn SymbolRanking,
) -> eyre::Result<Vec<Symbol>> {
    if !cfg.symbols.is_empty() {
        return Ok(cfg.symbols.clone());
    }

    let symbols = ranking
        .fetch_top_symbols(&cfg.quote_asset, cfg.top_symbols)
        .await
        .wrap_err_with(|| format!("failed to rank {} symbols by volume", cfg.quote_asset))?;

    if symbols.is_empty() {
        return Err(eyre!("no symbols found for quote asset {}", cfg.quote_asset));
    }

    info!(
        "24h 거래량 상위 {} 심볼: {}",
        cfg.quote_asset,
        symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(symbols)
}

/// 시작 시 notional 을 볼 오더북 레벨 수
pub const NOTIONAL_DEPTH: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BookNotional {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
}

/// 심볼별 상위 `depth` 레벨의 bid/ask notional 을 한 번 조회해서 로그로 남긴다.
/// 조회에 실패한 심볼은 경고만 남기고 건너뛴다
pub async fn report_book_notional(
    books: &dyn OrderBookExchange,
    symbols: &[Symbol],
    depth: usize,
) -> Vec<BookNotional> {
    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match books.fetch_orderbook(symbol, depth).await {
            Ok(book) => {
                let (bid, ask) = book.notional(depth);
                info!(
                    "{:<9} notional (top {}) - bid: {} ask: {}",
                    format!("{}:", symbol),
                    depth,
                    bid.normalize(),
                    ask.normalize()
                );
                out.push(BookNotional {
                    symbol: symbol.clone(),
                    bid,
                    ask,
                });
            }
            Err(e) => warn!(symbol = %symbol, "failed to fetch order book: {}", e),
        }
    }
    out
}

/// 샘플링 루프와 HTTP 서버를 띄우고 `shutdown` 이 취소될 때까지 돈다
pub async fn run_with(
    cfg: &ExporterConfig,
    source: Arc<dyn QuoteExchange>,
    symbols: Vec<Symbol>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let store = MetricsStore::with_descriptors(sampler::metric_descriptors());

    let sampler = Sampler::new(source, store.clone(), symbols, cfg.fetch_timeout);
    let sampler_handle = start_sample_loop(sampler, cfg.sampling_interval, shutdown.clone());

    let state = Arc::new(AppState::new(store));
    let served = server::serve_on(listener, state, shutdown.clone()).await;

    // 서버가 먼저 끝났어도 샘플러는 멈춘다
    shutdown.cancel();
    sampler_handle.await.wrap_err("sampler task panicked")?;

    served
}

pub async fn run(cfg: ExporterConfig, shutdown: CancellationToken) -> eyre::Result<()> {
    let client = BinanceClient::with_config(&cfg.base_api_url, cfg.fetch_timeout)?;

    let symbols = resolve_symbols(&cfg, &client).await?;
    report_book_notional(&client, &symbols, NOTIONAL_DEPTH).await;

    let source: Arc<dyn QuoteExchange> = Arc::new(CachedQuoteSource::new(
        Arc::new(client),
        cfg.cache_ttl,
        cfg.cache_enabled,
    ));

    info!(
        "cache: enabled={} ttl={:?}, sampling interval {:?}, fetch timeout {:?}",
        cfg.cache_enabled, cfg.cache_ttl, cfg.sampling_interval, cfg.fetch_timeout
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", addr))?;

    run_with(&cfg, source, symbols, listener, shutdown).await
}

/// SIGINT / SIGTERM 대기
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received CTRL+C shutdown signal"),
                    _ = sigterm.recv() => info!("Received SIGTERM shutdown signal"),
                }
                return;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received CTRL+C shutdown signal");
}
