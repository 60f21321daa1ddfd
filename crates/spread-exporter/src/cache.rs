//! 업스트림 응답을 TTL 동안 재사용하는 캐시.
//!
//! 락은 조회/삽입 구간에만 잡고, 실제 업스트림 호출은 락 밖에서 한다.
//! 같은 키가 동시에 만료/미스 상태면 호출이 중복될 수 있다 (single-flight 하지 않음).
//! 실패한 호출은 캐시하지 않는다.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use exchanges::{ExchangeError, QuoteExchange};
use interface::{ExchangeId, Quote, Symbol};

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// 캐시 조회 결과. `Miss` 는 만료된 항목도 포함한다
enum Lookup<V> {
    Hit(V),
    Miss,
}

pub struct ResponseCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    enabled: bool,
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            enabled,
        }
    }

    async fn lookup(&self, key: &K) -> Lookup<V> {
        let guard = self.entries.read().await;
        match guard.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Lookup::Hit(entry.value.clone()),
            _ => Lookup::Miss,
        }
    }

    /// 살아 있는 항목이 있으면 그대로 돌려주고, 아니면 `fetch` 결과를 저장 후 반환.
    /// 캐시가 꺼져 있으면 항상 `fetch` 를 호출한다.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        if let Lookup::Hit(value) = self.lookup(&key).await {
            return Ok(value);
        }

        let value = fetch().await?;

        let entry = CacheEntry {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);

        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// `QuoteExchange` 앞단에 붙는 캐시. 그 자체로 `QuoteExchange` 다
pub struct CachedQuoteSource {
    inner: Arc<dyn QuoteExchange>,
    cache: ResponseCache<Symbol, Quote>,
}

impl CachedQuoteSource {
    pub fn new(inner: Arc<dyn QuoteExchange>, ttl: Duration, enabled: bool) -> Self {
        Self {
            inner,
            cache: ResponseCache::new(ttl, enabled),
        }
    }

    pub fn cache(&self) -> &ResponseCache<Symbol, Quote> {
        &self.cache
    }
}

#[async_trait]
impl QuoteExchange for CachedQuoteSource {
    fn id(&self) -> ExchangeId {
        self.inner.id()
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, ExchangeError> {
        self.cache
            .get_or_fetch(symbol.clone(), || self.inner.fetch_quote(symbol))
            .await
    }
}
