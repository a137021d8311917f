//! Prometheus exposition of derived VMI stats
//!
//! [`VmiStatsCollector`] derives samples from the current snapshot on every
//! scrape, so exported series always reflect the latest loaded state and
//! VMIs that disappear stop being exported without any bookkeeping.

use crate::observability::AgentMetrics;
use crate::snapshot::SnapshotStore;
use crate::stats::{report_vmis_stats, CollectorResult, StatsConfig, ALL_FAMILIES};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

pub struct VmiStatsCollector {
    store: SnapshotStore,
    config: StatsConfig,
    metrics: AgentMetrics,
    descs: Vec<Desc>,
}

impl VmiStatsCollector {
    pub fn new(
        store: SnapshotStore,
        config: StatsConfig,
        metrics: AgentMetrics,
    ) -> prometheus::Result<Self> {
        let descs = ALL_FAMILIES
            .iter()
            .map(|family| {
                Desc::new(
                    family.name.to_string(),
                    family.help.to_string(),
                    family.labels.iter().map(|l| l.to_string()).collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self {
            store,
            config,
            metrics,
            descs,
        })
    }

    /// Register with the process-wide default registry
    pub fn register(self) -> prometheus::Result<()> {
        prometheus::register(Box::new(self))
    }

    pub fn register_in(self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self))
    }
}

impl Collector for VmiStatsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let start = Instant::now();
        let loaded = self.store.current();

        let results = report_vmis_stats(&loaded.snapshot.vmis, &loaded.stores, &self.config);
        let families = to_metric_families(&results);

        self.metrics
            .set_vmis_reported(loaded.snapshot.vmis.len() as i64);
        self.metrics
            .observe_scrape_latency(start.elapsed().as_secs_f64());
        debug!(
            vmis = loaded.snapshot.vmis.len(),
            samples = results.len(),
            "Derived VMI stats for scrape"
        );

        families
    }
}

/// Group samples into one gauge family per stat family. Families without
/// samples are omitted.
///
/// Samples sharing a full label tuple are one series; the later sample's
/// value wins.
pub fn to_metric_families(results: &[CollectorResult]) -> Vec<MetricFamily> {
    let mut families = Vec::new();

    for family in ALL_FAMILIES {
        let samples: Vec<&CollectorResult> = results
            .iter()
            .filter(|r| r.family.name == family.name)
            .collect();
        if samples.is_empty() {
            continue;
        }

        let gauge = match GaugeVec::new(Opts::new(family.name, family.help), family.labels) {
            Ok(gauge) => gauge,
            Err(e) => {
                warn!(family = family.name, error = %e, "Failed to build gauge family");
                continue;
            }
        };

        for sample in samples {
            let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
            match gauge.get_metric_with_label_values(&labels) {
                Ok(metric) => metric.set(sample.value),
                Err(e) => {
                    warn!(family = family.name, error = %e, "Dropping malformed sample");
                }
            }
        }

        families.extend(gauge.collect());
    }

    families
}

/// Render samples in the Prometheus text format
pub fn encode_text(results: &[CollectorResult]) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&to_metric_families(results), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
