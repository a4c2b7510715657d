use prometheus::{CounterVec, HistogramVec, IntCounterVec, Registry, histogram_opts, opts};

use crate::model::Transport;

/// Prometheus collectors for the resolver, trimmed from the teacher's
/// `DnsMetrics` down to what an iterative-only resolver emits: no
/// HTTP-listener connection counts, no zone-transfer counters.
pub struct ResolverMetrics {
    registry: Registry,

    queries_total: IntCounterVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    validations_total: IntCounterVec,
    exchanges_total: IntCounterVec,
    exchange_latency: HistogramVec,
    conn_mode_promotions_total: CounterVec,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let queries_total = IntCounterVec::new(
            opts!("resolvd_queries_total", "Total top-level queries handled"),
            &["qtype"],
        )
        .expect("metric opts are valid");

        let cache_hits = IntCounterVec::new(
            opts!("resolvd_cache_hits_total", "Cache hits by cache name"),
            &["cache"],
        )
        .expect("metric opts are valid");

        let cache_misses = IntCounterVec::new(
            opts!("resolvd_cache_misses_total", "Cache misses by cache name"),
            &["cache"],
        )
        .expect("metric opts are valid");

        let validations_total = IntCounterVec::new(
            opts!("resolvd_validations_total", "DNSSEC validation outcomes"),
            &["outcome"],
        )
        .expect("metric opts are valid");

        let exchanges_total = IntCounterVec::new(
            opts!("resolvd_exchanges_total", "Upstream exchanges by transport and outcome"),
            &["transport", "outcome"],
        )
        .expect("metric opts are valid");

        let exchange_latency = HistogramVec::new(
            histogram_opts!(
                "resolvd_exchange_latency_seconds",
                "Upstream exchange round-trip latency"
            ),
            &["transport"],
        )
        .expect("metric opts are valid");

        let conn_mode_promotions_total = CounterVec::new(
            opts!(
                "resolvd_conn_mode_promotions_total",
                "Auth-server connection mode promotions"
            ),
            &["to"],
        )
        .expect("metric opts are valid");

        for collector in [
            Box::new(queries_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(cache_hits.clone()),
            Box::new(cache_misses.clone()),
            Box::new(validations_total.clone()),
            Box::new(exchanges_total.clone()),
            Box::new(exchange_latency.clone()),
            Box::new(conn_mode_promotions_total.clone()),
        ] {
            let _ = registry.register(collector);
        }

        Self {
            registry,
            queries_total,
            cache_hits,
            cache_misses,
            validations_total,
            exchanges_total,
            exchange_latency,
            conn_mode_promotions_total,
        }
    }

    pub fn record_query(&self, qtype: &str) {
        self.queries_total.with_label_values(&[qtype]).inc();
    }

    pub fn record_cache_hit(&self, cache: &str) {
        self.cache_hits.with_label_values(&[cache]).inc();
    }

    pub fn record_cache_miss(&self, cache: &str) {
        self.cache_misses.with_label_values(&[cache]).inc();
    }

    pub fn record_validation(&self, outcome: &str) {
        self.validations_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_exchange_attempt(&self, transport: Transport) {
        self.exchanges_total
            .with_label_values(&[transport.as_str(), "attempt"])
            .inc();
    }

    pub fn record_exchange(&self, transport: Transport, success: bool, latency_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.exchanges_total
            .with_label_values(&[transport.as_str(), outcome])
            .inc();
        self.exchange_latency
            .with_label_values(&[transport.as_str()])
            .observe(latency_secs);
    }

    pub fn record_conn_mode_promotion(&self, to: &str) {
        self.conn_mode_promotions_total.with_label_values(&[to]).inc();
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_includes_registered_families() {
        let metrics = ResolverMetrics::new();
        metrics.record_query("A");
        metrics.record_cache_hit("rrset");
        let text = metrics.export().expect("export succeeds");
        assert!(text.contains("resolvd_queries_total"));
        assert!(text.contains("resolvd_cache_hits_total"));
    }
}
