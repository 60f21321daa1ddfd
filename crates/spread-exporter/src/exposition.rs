//! 스냅샷을 Prometheus 텍스트 포맷으로 인코딩.
//!
//! 스크레이프마다 스냅샷으로 새 `Registry` 를 만들어 `TextEncoder` 로 인코딩한다.
//! 값의 원본은 항상 `MetricsStore` 이고 registry 는 인코딩용으로만 쓴다.

use std::collections::HashMap;

use prometheus::{Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::store::{MetricKind, MetricSample, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: String,
    pub body: String,
}

pub fn render(snapshot: &Snapshot) -> prometheus::Result<Rendered> {
    let registry = registry_from(snapshot)?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;

    let body = String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?;
    Ok(Rendered {
        content_type: encoder.format_type().to_string(),
        body,
    })
}

/// 이름별로 묶어서 메트릭 하나씩 등록. HELP/TYPE 은 저장소의 descriptor 를 따르고,
/// 없으면 이름을 HELP 로 쓰는 gauge
fn registry_from(snapshot: &Snapshot) -> prometheus::Result<Registry> {
    let registry = Registry::new();

    let samples = snapshot.samples();
    let mut families: Vec<(&str, Vec<&MetricSample>)> = Vec::new();
    for sample in &samples {
        match families.last_mut() {
            Some((name, family)) if *name == sample.name.as_str() => family.push(sample),
            _ => families.push((sample.name.as_str(), vec![sample])),
        }
    }

    for (name, family) in families {
        let (help, kind) = match snapshot.desc(name) {
            Some(desc) if !desc.help.is_empty() => (desc.help.clone(), desc.kind),
            Some(desc) => (name.to_string(), desc.kind),
            None => (name.to_string(), MetricKind::Gauge),
        };
        register_family(&registry, Opts::new(name, help), kind, &family)?;
    }

    Ok(registry)
}

fn register_family(
    registry: &Registry,
    opts: Opts,
    kind: MetricKind,
    family: &[&MetricSample],
) -> prometheus::Result<()> {
    let Some((first, rest)) = family.split_first() else {
        return Ok(());
    };

    // 라벨 없는 메트릭은 (이름, 라벨) 키가 유일하므로 샘플이 하나뿐이다
    if first.labels.is_empty() {
        for skipped in rest {
            warn!(
                "metric {} mixes labelled and unlabelled samples, skipping {:?}",
                skipped.name, skipped.labels
            );
        }
        return match kind {
            MetricKind::Gauge => {
                let gauge = Gauge::with_opts(opts)?;
                gauge.set(first.value);
                registry.register(Box::new(gauge))
            }
            MetricKind::Counter => {
                let counter = Counter::with_opts(opts)?;
                if counter_value_ok(first) {
                    counter.inc_by(first.value);
                }
                registry.register(Box::new(counter))
            }
        };
    }

    let label_names: Vec<&str> = first.labels.keys().map(String::as_str).collect();
    match kind {
        MetricKind::Gauge => {
            let vec = GaugeVec::new(opts, &label_names)?;
            for sample in family {
                match vec.get_metric_with(&label_map(sample)) {
                    Ok(gauge) => gauge.set(sample.value),
                    Err(e) => warn!("skipping sample of {}: {}", sample.name, e),
                }
            }
            registry.register(Box::new(vec))
        }
        MetricKind::Counter => {
            let vec = CounterVec::new(opts, &label_names)?;
            for sample in family.iter().filter(|s| counter_value_ok(s)) {
                match vec.get_metric_with(&label_map(sample)) {
                    Ok(counter) => counter.inc_by(sample.value),
                    Err(e) => warn!("skipping sample of {}: {}", sample.name, e),
                }
            }
            registry.register(Box::new(vec))
        }
    }
}

fn label_map(sample: &MetricSample) -> HashMap<&str, &str> {
    sample
        .labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// counter 는 음수/NaN 을 가질 수 없다
fn counter_value_ok(sample: &MetricSample) -> bool {
    let ok = sample.value >= 0.0;
    if !ok {
        warn!("counter {} got invalid value {}, skipping", sample.name, sample.value);
    }
    ok
}
