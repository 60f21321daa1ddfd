use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use exchanges::{ExchangeError, QuoteExchange};
use interface::{ExchangeId, Quote, Symbol};
use spread_exporter::app;
use spread_exporter::cache::CachedQuoteSource;
use spread_exporter::sampler::{metric_descriptors, Sampler, DELTA_METRIC, SPREAD_METRIC};
use spread_exporter::server::{router, AppState};
use spread_exporter::store::MetricsStore;
use spread_exporter::ExporterConfig;

/// 호출될 때마다 ask 를 0.01 씩 올리는 거래소. 심볼별 호출 수를 센다
struct Drifting {
    calls: Mutex<HashMap<Symbol, usize>>,
    total: AtomicUsize,
}

impl Drifting {
    fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    fn calls_for(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&Symbol::new(symbol))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuoteExchange for Drifting {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ExchangeError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(symbol.clone()).or_insert(0);
            *n += 1;
            *n
        };
        let bid = Decimal::from(100);
        let ask = bid + Decimal::from_str("0.01").unwrap() * Decimal::from(n as i64);
        Ok(Quote {
            exchange: ExchangeId::Binance,
            symbol: symbol.clone(),
            best_bid: Some(bid),
            best_ask: Some(ask),
            updated_at: Utc::now(),
        })
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn metrics_on_empty_store_is_ok() {
    let state = Arc::new(AppState::new(MetricsStore::new()));
    let (status, content_type, body) = get(router(state), "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
    assert!(body.is_empty());
}

#[tokio::test]
async fn health_route() {
    let state = Arc::new(AppState::new(MetricsStore::new()));
    let (status, _, body) = get(router(state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let state = Arc::new(AppState::new(MetricsStore::new()));
    let (status, _, _) = get(router(state), "/snapshots").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_after_two_ticks() {
    let store = MetricsStore::with_descriptors(metric_descriptors());
    let mut sampler = Sampler::new(
        Arc::new(Drifting::new()),
        store.clone(),
        vec![Symbol::new("ETHUSDT"), Symbol::new("BTCUSDT")],
        Duration::from_secs(5),
    );

    sampler.run_tick().await;
    sampler.run_tick().await;

    let state = Arc::new(AppState::new(store));
    let (status, _, body) = get(router(state), "/metrics").await;
    let lines: Vec<&str> = body.lines().collect();

    assert_eq!(status, StatusCode::OK);
    assert!(lines.contains(&"# HELP price_spread Price spread for each symbol"));
    assert!(lines.contains(&"# TYPE price_spread gauge"));
    assert!(lines.contains(&"# TYPE spread_delta gauge"));
    assert!(lines.contains(&"price_spread{symbol=\"ETHUSDT\"} 0.02"));
    assert!(lines.contains(&"spread_delta{symbol=\"ETHUSDT\"} 0.01"));
    assert!(lines.contains(&"price_spread{symbol=\"BTCUSDT\"} 0.02"));
    assert!(lines.contains(&"spread_exporter_tick_failures 0"));
}

#[tokio::test(start_paused = true)]
async fn cache_absorbs_lookups_within_ttl() {
    let upstream = Arc::new(Drifting::new());
    let source = Arc::new(CachedQuoteSource::new(
        upstream.clone(),
        Duration::from_secs(60),
        true,
    ));
    let store = MetricsStore::with_descriptors(metric_descriptors());
    let mut sampler = Sampler::new(
        source.clone(),
        store.clone(),
        vec![Symbol::new("ETHUSDT"), Symbol::new("BTCUSDT")],
        Duration::from_secs(5),
    );

    sampler.run_tick().await;
    tokio::time::advance(Duration::from_secs(10)).await;
    let second = sampler.run_tick().await;

    assert_eq!(upstream.calls_for("ETHUSDT"), 1);
    assert_eq!(upstream.calls_for("BTCUSDT"), 1);
    assert_eq!(source.cache().len().await, 2);
    // 같은 호가를 다시 봤으니 delta 는 0
    assert!(second.records.iter().all(|r| r.delta.is_zero()));

    // TTL 이 지나면 다시 가져온다
    tokio::time::advance(Duration::from_secs(50)).await;
    let third = sampler.run_tick().await;
    assert_eq!(upstream.calls_for("ETHUSDT"), 2);
    assert_eq!(upstream.total.load(Ordering::SeqCst), 4);
    assert!(third
        .records
        .iter()
        .all(|r| r.delta == Decimal::from_str("0.01").unwrap()));

    let snap = store.snapshot().await;
    assert_eq!(snap.get(SPREAD_METRIC, &[("symbol", "ETHUSDT")]), Some(0.02));
    assert_eq!(snap.get(DELTA_METRIC, &[("symbol", "ETHUSDT")]), Some(0.01));
}

#[tokio::test(start_paused = true)]
async fn disabled_cache_hits_upstream_every_tick() {
    let upstream = Arc::new(Drifting::new());
    let source = Arc::new(CachedQuoteSource::new(
        upstream.clone(),
        Duration::from_secs(60),
        false,
    ));
    let mut sampler = Sampler::new(
        source,
        MetricsStore::new(),
        vec![Symbol::new("ETHUSDT")],
        Duration::from_secs(5),
    );

    for _ in 0..3 {
        sampler.run_tick().await;
        tokio::time::advance(Duration::from_secs(10)).await;
    }

    assert_eq!(upstream.calls_for("ETHUSDT"), 3);
}

#[tokio::test]
async fn serves_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let cfg = ExporterConfig {
        sampling_interval: Duration::from_millis(50),
        cache_enabled: false,
        ..ExporterConfig::default()
    };
    let source: Arc<dyn QuoteExchange> = Arc::new(Drifting::new());

    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            app::run_with(
                &cfg,
                source,
                vec![Symbol::new("ETHUSDT")],
                listener,
                shutdown,
            )
            .await
        }
    });

    let client = reqwest::Client::new();
    let url = format!("http://{}/metrics", addr);
    let mut found = false;
    for _ in 0..100 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body = response.text().await.unwrap();
        if body.contains("price_spread{symbol=\"ETHUSDT\"}") {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(found, "sampler never published ETHUSDT");
    drop(client);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("exporter did not stop after shutdown")
        .unwrap()
        .unwrap();
}
