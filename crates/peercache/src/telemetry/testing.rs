// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test utilities for metric validation.

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics, ScopeMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

use crate::stats::GroupEvent;
use crate::telemetry::attributes::{GROUP_EVENT, GROUP_NAME};

/// Collects metrics in memory so tests can read them back.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    #[must_use]
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Returns how often `event` was recorded for `group`, as of now.
    #[must_use]
    pub fn event_count(&self, group: &str, event: GroupEvent) -> u64 {
        self.provider.force_flush().unwrap();

        let expected = [
            KeyValue::new(GROUP_NAME, group.to_owned()),
            KeyValue::new(GROUP_EVENT, event.as_str()),
        ];
        let exported = self.exporter.get_finished_metrics().unwrap();

        // Sums are cumulative, so the latest export holds the running totals.
        exported
            .last()
            .into_iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .filter_map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => Some(sum),
                _ => None,
            })
            .flat_map(|sum| sum.data_points())
            .filter(|point| {
                let attributes: Vec<&KeyValue> = point.attributes().collect();
                attributes.len() == expected.len() && expected.iter().all(|kv| attributes.contains(&kv))
            })
            .map(|point| point.value())
            .sum()
    }
}
