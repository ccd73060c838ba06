use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use snfok_console_gate_core::SessionOutcome;
use tokio::time;

#[derive(Clone, Debug)]
pub struct Metrics {
    navigations: Counter,
    validations: Family<OutcomeLabels, Counter>,
    bootstraps: Family<OutcomeLabels, Counter>,
    stale: Family<CallLabels, Counter>,
    durations: Family<CallLabels, Histogram>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct CallLabels {
    call: &'static str,
}

pub(crate) const SESSION: &str = "session";
pub(crate) const CLUSTERS: &str = "clusters";

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let navigations = Counter::default();
        reg.register(
            "navigations",
            "Total number of navigations evaluated by the session gate",
            navigations.clone(),
        );

        let validations = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "session_validations",
            "Total number of settled session validations by outcome",
            validations.clone(),
        );

        let bootstraps = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "bootstraps",
            "Total number of resolved cluster bootstraps by outcome",
            bootstraps.clone(),
        );

        let stale = Family::<CallLabels, Counter>::default();
        reg.register(
            "stale_responses",
            "Total number of responses discarded because their navigation was superseded",
            stale.clone(),
        );

        let durations = Family::<CallLabels, Histogram>::new_with_constructor(|| {
            // Calls are bounded by the request timeout, 10s by default.
            Histogram::new([0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0])
        });
        reg.register_with_unit(
            "call_duration",
            "Histogram of backend call latency",
            Unit::Seconds,
            durations.clone(),
        );

        Self {
            navigations,
            validations,
            bootstraps,
            stale,
            durations,
        }
    }

    pub(crate) fn navigated(&self) {
        self.navigations.inc();
    }

    pub(crate) fn validated(&self, outcome: SessionOutcome) {
        let outcome = match outcome {
            SessionOutcome::Valid => "valid",
            SessionOutcome::Invalid => "invalid",
        };
        self.validations
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    pub(crate) fn bootstrapped(&self, outcome: &'static str) {
        self.bootstraps.get_or_create(&OutcomeLabels { outcome }).inc();
    }

    pub(crate) fn discarded(&self, call: &'static str) {
        self.stale.get_or_create(&CallLabels { call }).inc();
    }

    pub(crate) fn observe(&self, call: &'static str, started: time::Instant) {
        self.durations
            .get_or_create(&CallLabels { call })
            .observe(started.elapsed().as_secs_f64());
    }
}

impl Default for Metrics {
    /// Metrics that are recorded but never exported.
    fn default() -> Self {
        Self::register(&mut Registry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_recorded_outcomes() {
        let mut reg = Registry::with_prefix("console_gate");
        let metrics = Metrics::register(&mut reg);
        metrics.navigated();
        metrics.validated(SessionOutcome::Invalid);
        metrics.bootstrapped("no_cluster");
        metrics.discarded(SESSION);

        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &reg).unwrap();
        assert!(out.contains("console_gate_navigations_total 1"), "{out}");
        assert!(
            out.contains(r#"console_gate_session_validations_total{outcome="invalid"} 1"#),
            "{out}"
        );
        assert!(
            out.contains(r#"console_gate_bootstraps_total{outcome="no_cluster"} 1"#),
            "{out}"
        );
        assert!(
            out.contains(r#"console_gate_stale_responses_total{call="session"} 1"#),
            "{out}"
        );
    }
}
