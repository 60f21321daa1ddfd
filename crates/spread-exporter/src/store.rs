//! 최신 메트릭 값 저장소.
//!
//! 상태 전체를 `Arc` 로 감싸 두고 (copy-on-write), 읽는 쪽은 `Arc` 만 복제해서 가져간다.
//! 복제와 수정은 락 밖에서 하고 write 락은 포인터 교체에만 쓴다.
//! 쓰는 쪽은 배치 하나를 새 상태에 모두 반영한 뒤 한 번에 교체하므로
//! 배치 안의 값들은 함께 보이거나 함께 안 보인다.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// 라벨은 이름 순으로 정렬된 상태로 보관한다
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
}

impl MetricDesc {
    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Gauge,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: Labels,
    pub value: f64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            value,
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// 저장 키. (이름, 정렬된 라벨) 조합이 유일하다
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct MetricKey {
    name: String,
    labels: Labels,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    descs: BTreeMap<String, MetricDesc>,
    samples: BTreeMap<MetricKey, f64>,
}

/// 특정 시점의 저장소 내용. 이후 publish 의 영향을 받지 않는다
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Arc<StoreState>,
}

impl Snapshot {
    /// (이름, 라벨) 순으로 정렬된 샘플
    pub fn samples(&self) -> Vec<MetricSample> {
        self.state
            .samples
            .iter()
            .map(|(key, value)| MetricSample {
                name: key.name.clone(),
                labels: key.labels.clone(),
                value: *value,
            })
            .collect()
    }

    pub fn desc(&self, name: &str) -> Option<&MetricDesc> {
        self.state.descs.get(name)
    }

    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let key = MetricKey {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.state.samples.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.state.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.samples.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct MetricsStore {
    state: Arc<RwLock<Arc<StoreState>>>,
    /// 쓰는 쪽끼리만 직렬화. reader 는 이 락을 보지 않는다
    writer: Arc<Mutex<()>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// HELP/TYPE 정보를 미리 등록한 저장소
    pub fn with_descriptors(descs: impl IntoIterator<Item = MetricDesc>) -> Self {
        let state = StoreState {
            descs: descs.into_iter().map(|d| (d.name.clone(), d)).collect(),
            samples: BTreeMap::new(),
        };
        Self {
            state: Arc::new(RwLock::new(Arc::new(state))),
            writer: Arc::default(),
        }
    }

    pub async fn describe(&self, desc: MetricDesc) {
        self.update(|state| {
            state.descs.insert(desc.name.clone(), desc);
        })
        .await;
    }

    /// 배치에 있는 키만 덮어쓰고 나머지는 그대로 둔다.
    /// 배치 전체가 하나의 교체로 반영된다.
    pub async fn publish(&self, batch: Vec<MetricSample>) {
        if batch.is_empty() {
            return;
        }
        self.update(|state| {
            for sample in batch {
                let key = MetricKey {
                    name: sample.name,
                    labels: sample.labels,
                };
                state.samples.insert(key, sample.value);
            }
        })
        .await;
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = Arc::clone(&*self.state.read().await);
        Snapshot { state }
    }

    /// 현재 상태를 락 밖에서 복제해 수정하고, write 락은 `Arc` 교체에만 잡는다
    async fn update(&self, apply: impl FnOnce(&mut StoreState)) {
        let _writer = self.writer.lock().await;

        let current = Arc::clone(&*self.state.read().await);
        let mut next = (*current).clone();
        drop(current);
        apply(&mut next);

        *self.state.write().await = Arc::new(next);
    }
}
