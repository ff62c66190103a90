use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tos_core::{DecisionPath, StoreStats, Version};

// ── Label types ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DecisionLabel {
    pub path: String,
    pub outcome: String,
}

// ── Metrics registry ───────────────────────────────────────────────────────────

pub struct TosMetrics {
    pub registry: Registry,

    // Gate
    pub gate_decisions: Family<DecisionLabel, Counter>,
    pub gate_errors: Counter,
    pub gate_fast_skips: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Acceptance page
    pub acceptances: Counter,
    pub rejections: Counter,

    // Invalidation
    pub version_bumps: Counter,
    pub cache_version: Gauge,

    // Store, set on each scrape
    pub documents: Gauge,
    pub agreements: Gauge,
    pub staff_users: Gauge,

    pub uptime_seconds: Gauge,
}

impl TosMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let gate_decisions: Family<DecisionLabel, Counter> = Family::default();
        registry.register(
            "tos_gate_decisions",
            "Gate decisions by decision path and outcome",
            gate_decisions.clone(),
        );

        let gate_errors: Counter = Counter::default();
        registry.register(
            "tos_gate_errors",
            "Gated requests that failed with an error",
            gate_errors.clone(),
        );

        let gate_fast_skips: Counter = Counter::default();
        registry.register(
            "tos_gate_fast_skips",
            "Gated requests settled without touching the cache or the store",
            gate_fast_skips.clone(),
        );

        let cache_hits: Counter = Counter::default();
        registry.register(
            "tos_cache_hits",
            "Agreement verdicts served from the cache",
            cache_hits.clone(),
        );

        let cache_misses: Counter = Counter::default();
        registry.register(
            "tos_cache_misses",
            "Agreement verdicts that fell back to the store",
            cache_misses.clone(),
        );

        let acceptances: Counter = Counter::default();
        registry.register("tos_acceptances", "Terms accepted", acceptances.clone());

        let rejections: Counter = Counter::default();
        registry.register("tos_rejections", "Terms rejected", rejections.clone());

        let version_bumps: Counter = Counter::default();
        registry.register(
            "tos_version_bumps",
            "Cache generation bumps caused by document saves",
            version_bumps.clone(),
        );

        let cache_version: Gauge = Gauge::default();
        registry.register("tos_cache_version", "Current cache generation", cache_version.clone());

        let documents: Gauge = Gauge::default();
        registry.register("tos_documents", "Stored terms documents", documents.clone());

        let agreements: Gauge = Gauge::default();
        registry.register("tos_agreements", "Stored user agreements", agreements.clone());

        let staff_users: Gauge = Gauge::default();
        registry.register("tos_staff_users", "Staff and superuser accounts", staff_users.clone());

        let uptime_seconds: Gauge = Gauge::default();
        registry.register("tos_uptime_seconds", "Server uptime in seconds", uptime_seconds.clone());

        Self {
            registry,
            gate_decisions,
            gate_errors,
            gate_fast_skips,
            cache_hits,
            cache_misses,
            acceptances,
            rejections,
            version_bumps,
            cache_version,
            documents,
            agreements,
            staff_users,
            uptime_seconds,
        }
    }

    pub fn record_decision(&self, path: DecisionPath, allowed: bool) {
        let outcome = if allowed { "allow" } else { "redirect" };
        self.gate_decisions
            .get_or_create(&DecisionLabel {
                path: path.as_str().to_string(),
                outcome: outcome.to_string(),
            })
            .inc();

        if path.is_fast_skip() {
            self.gate_fast_skips.inc();
        }

        match path {
            DecisionPath::CachedVerdict => {
                self.cache_hits.inc();
            }
            DecisionPath::StoreLookup => {
                self.cache_misses.inc();
            }
            _ => {}
        }
    }

    pub fn record_bump(&self, version: Version) {
        self.version_bumps.inc();
        self.cache_version.set(version);
    }

    /// Refresh scrape-time gauges and encode in text exposition format.
    pub fn render(&self, stats: &StoreStats, version: Version, uptime_secs: u64) -> String {
        self.documents.set(stats.document_count as i64);
        self.agreements.set(stats.agreement_count as i64);
        self.staff_users.set(stats.staff_count as i64);
        self.cache_version.set(version);
        self.uptime_seconds.set(uptime_secs as i64);

        let mut buf = String::new();
        if encode(&mut buf, &self.registry).is_err() {
            buf.clear();
        }
        buf
    }
}

impl Default for TosMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_and_miss_counted() {
        let metrics = TosMetrics::new();
        metrics.record_decision(DecisionPath::CachedVerdict, true);
        metrics.record_decision(DecisionPath::StoreLookup, false);
        metrics.record_decision(DecisionPath::StaffBypass, true);
        metrics.record_decision(DecisionPath::SkipAnonymous, true);
        metrics.record_decision(DecisionPath::SkipAjax, true);

        assert_eq!(metrics.cache_hits.get(), 1);
        assert_eq!(metrics.cache_misses.get(), 1);
        assert_eq!(metrics.gate_fast_skips.get(), 2);

        let text = metrics.render(&StoreStats::default(), 3, 0);
        assert!(text.contains("tos_gate_decisions"));
        assert!(text.contains("path=\"staff_bypass\""));
        assert!(text.contains("tos_cache_version 3"));
    }
}
