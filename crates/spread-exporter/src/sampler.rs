//! 고정 주기로 스프레드를 샘플링해서 직전 값과의 차이(delta)와 함께 저장소에 반영하는 루프.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use exchanges::{ExchangeError, QuoteExchange};
use interface::Symbol;

use crate::error::SampleError;
use crate::spread::spread;
use crate::store::{MetricDesc, MetricSample, MetricsStore};

pub const SPREAD_METRIC: &str = "price_spread";
pub const DELTA_METRIC: &str = "spread_delta";
pub const LAST_TICK_METRIC: &str = "spread_exporter_last_tick_timestamp_seconds";
pub const TICK_FAILURES_METRIC: &str = "spread_exporter_tick_failures";

/// 샘플러가 쓰는 메트릭의 HELP/TYPE
pub fn metric_descriptors() -> Vec<MetricDesc> {
    vec![
        MetricDesc::gauge(SPREAD_METRIC, "Price spread for each symbol"),
        MetricDesc::gauge(DELTA_METRIC, "Absolute spread delta for each symbol"),
        MetricDesc::gauge(LAST_TICK_METRIC, "Unix time of the last completed sampling tick"),
        MetricDesc::gauge(TICK_FAILURES_METRIC, "Symbols that failed in the last sampling tick"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub symbol: Symbol,
    pub spread: Decimal,
    pub delta: Decimal,
    pub sampled_at: DateTime<Utc>,
}

/// 한 틱의 결과
#[derive(Debug)]
pub struct TickReport {
    pub records: Vec<SampleRecord>,
    pub failures: Vec<(Symbol, SampleError)>,
}

pub struct Sampler {
    source: Arc<dyn QuoteExchange>,
    store: MetricsStore,
    symbols: Vec<Symbol>,
    /// 심볼별 직전 스프레드. 다음 delta 계산에만 쓰이고 바로 덮어쓴다
    previous: HashMap<Symbol, Decimal>,
    fetch_timeout: Duration,
    state: watch::Sender<SamplerState>,
}

impl Sampler {
    /// `symbols` 는 실행 내내 고정. 중복은 제거한다
    pub fn new(
        source: Arc<dyn QuoteExchange>,
        store: MetricsStore,
        symbols: Vec<Symbol>,
        fetch_timeout: Duration,
    ) -> Self {
        let mut unique: Vec<Symbol> = Vec::with_capacity(symbols.len());
        for s in symbols {
            if !unique.contains(&s) {
                unique.push(s);
            }
        }
        let (state, _) = watch::channel(SamplerState::Idle);
        Self {
            source,
            store,
            symbols: unique,
            previous: HashMap::new(),
            fetch_timeout,
            state,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SamplerState> {
        self.state.subscribe()
    }

    async fn sample_symbol(&self, symbol: &Symbol) -> Result<Decimal, SampleError> {
        let quote = tokio::time::timeout(self.fetch_timeout, self.source.fetch_quote(symbol))
            .await
            .map_err(|_| ExchangeError::Timeout(self.fetch_timeout))??;
        Ok(spread(&quote)?)
    }

    /// 모든 심볼을 한 번씩 샘플링하고 결과를 한 배치로 저장소에 반영한다.
    /// 실패한 심볼은 저장소에 남아 있는 이전 값을 그대로 둔다.
    pub async fn run_tick(&mut self) -> TickReport {
        self.state.send_replace(SamplerState::Sampling);

        let sampled_at = Utc::now();
        let results = join_all(self.symbols.iter().map(|s| self.sample_symbol(s))).await;
        let completed_at = Utc::now();

        let mut batch = Vec::with_capacity(self.symbols.len() * 2 + 2);
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (symbol, result) in self.symbols.iter().zip(results) {
            match result {
                Ok(spread) => {
                    let delta = match self.previous.insert(symbol.clone(), spread) {
                        Some(prev) => (spread - prev).abs(),
                        None => Decimal::ZERO,
                    };

                    batch.push(
                        MetricSample::new(SPREAD_METRIC, to_f64(spread))
                            .label("symbol", symbol.as_str()),
                    );
                    batch.push(
                        MetricSample::new(DELTA_METRIC, to_f64(delta))
                            .label("symbol", symbol.as_str()),
                    );

                    info!(
                        "{:<9} spread - {} : delta - {}",
                        format!("{}:", symbol),
                        spread.normalize(),
                        delta.normalize()
                    );

                    records.push(SampleRecord {
                        symbol: symbol.clone(),
                        spread,
                        delta,
                        sampled_at,
                    });
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        retryable = e.is_retryable(),
                        "sample failed, keeping last value: {}",
                        e
                    );
                    failures.push((symbol.clone(), e));
                }
            }
        }

        batch.push(MetricSample::new(
            LAST_TICK_METRIC,
            completed_at.timestamp_millis() as f64 / 1000.0,
        ));
        batch.push(MetricSample::new(TICK_FAILURES_METRIC, failures.len() as f64));

        // 틱 전체를 한 번에 반영
        self.store.publish(batch).await;
        self.state.send_replace(SamplerState::Idle);

        debug!(
            "sampling tick done: {} ok, {} failed",
            records.len(),
            failures.len()
        );

        TickReport { records, failures }
    }

    /// `shutdown` 이 취소될 때까지 `interval` 마다 틱을 돈다.
    /// 진행 중인 틱은 버리고 빠져나온다. 저장소 반영은 틱 끝의 한 번뿐이라
    /// 중간에 끊겨도 반쯤 쓰인 상태는 남지 않는다.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) {
        info!(
            "샘플링 루프 시작: {}개 심볼, {:?} 간격",
            self.symbols.len(),
            interval
        );

        let total = self.symbols.len();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown during sampling tick, abandoning it");
                    break;
                }
                report = self.run_tick() => {
                    if !report.failures.is_empty() {
                        warn!(
                            "tick finished with {} failed symbol(s) out of {}",
                            report.failures.len(),
                            total
                        );
                    }
                }
            }
        }

        self.state.send_replace(SamplerState::Idle);
        info!("샘플링 루프 종료");
    }
}

pub fn start_sample_loop(
    sampler: Sampler,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(sampler.run(interval, shutdown))
}

/// 십진 표기를 그대로 파싱해서 가장 가까운 f64 로 변환
fn to_f64(value: Decimal) -> f64 {
    value.to_string().parse().unwrap_or(f64::NAN)
}
