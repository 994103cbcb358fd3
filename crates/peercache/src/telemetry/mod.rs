// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenTelemetry reporting of group events.
//!
//! Every event counted in [`GroupStats`](crate::GroupStats), plus cache evictions,
//! is added to one `peercache.group.event.count` counter tagged with the group name
//! and the event.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, MeterProvider};

use crate::stats::GroupEvent;

pub(crate) mod attributes;
mod metrics;
#[cfg(test)]
pub(crate) mod testing;

impl GroupEvent {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "group.get",
            Self::CacheHit => "group.cache_hit",
            Self::PeerLoad => "group.peer_load",
            Self::PeerError => "group.peer_error",
            Self::Load => "group.load",
            Self::LoadDeduped => "group.load_deduped",
            Self::LocalLoad => "group.local_load",
            Self::LocalLoadErr => "group.local_load_err",
            Self::ServerRequest => "group.server_request",
            Self::Eviction => "group.eviction",
        }
    }
}

/// The event counter of one group.
#[derive(Clone, Debug)]
pub(crate) struct GroupMetrics {
    events: Counter<u64>,
    group: KeyValue,
}

impl GroupMetrics {
    pub(crate) fn new(group_name: &str, meter_provider: &dyn MeterProvider) -> Self {
        let meter = metrics::create_meter(meter_provider);
        Self {
            events: metrics::create_event_counter(&meter),
            group: KeyValue::new(attributes::GROUP_NAME, group_name.to_owned()),
        }
    }

    pub(crate) fn record(&self, event: GroupEvent) {
        let attrs = [self.group.clone(), KeyValue::new(attributes::GROUP_EVENT, event.as_str())];
        self.events.add(1, &attrs);
    }
}
