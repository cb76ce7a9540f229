use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;

/// Sink for the outcome of every admission decision. The engine calls
/// this unconditionally, whether or not Prometheus export is enabled,
/// so a `NullReporter` build still exercises the exact same call path
/// as a production one. Mirrors spec §6's single `Duration(req, blocked,
/// errorOccurred, duration)` operation, tagged with authority, blocked,
/// and error; `ingress_class` is a deployment-wide label baked into the
/// reporter itself rather than threaded per-call, since the Request
/// model carries no such field.
pub trait MetricReporter: Send + Sync {
    fn record_decision(&self, authority: &str, blocked: bool, error_occurred: bool, duration: Duration);
}

/// Discards everything. Used by tests and by deployments that run
/// without a Prometheus exporter.
pub struct NullReporter;

impl MetricReporter for NullReporter {
    fn record_decision(&self, _authority: &str, _blocked: bool, _error_occurred: bool, _duration: Duration) {}
}

fn describe() {
    describe_counter!(
        "guardian_decisions_total",
        "Total number of admission decisions made, labeled by authority, blocked, error, ingress_class"
    );
    describe_histogram!(
        "guardian_decision_duration_seconds",
        "Time spent evaluating the admission chain for one request"
    );
}

/// Reports decisions through the `metrics` facade, scraped via the
/// Prometheus exporter `start_metrics_server` installs.
pub struct PrometheusReporter {
    ingress_class: String,
}

impl PrometheusReporter {
    pub fn new(ingress_class: impl Into<String>) -> Self {
        describe();
        Self { ingress_class: ingress_class.into() }
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new("guardian")
    }
}

impl MetricReporter for PrometheusReporter {
    fn record_decision(&self, authority: &str, blocked: bool, error_occurred: bool, duration: Duration) {
        counter!(
            "guardian_decisions_total",
            "authority" => authority.to_string(),
            "blocked" => blocked.to_string(),
            "error" => error_occurred.to_string(),
            "ingress_class" => self.ingress_class.clone(),
        )
        .increment(1);

        histogram!(
            "guardian_decision_duration_seconds",
            "authority" => authority.to_string(),
            "ingress_class" => self.ingress_class.clone(),
        )
        .record(duration.as_secs_f64());
    }
}

/// Installs the Prometheus recorder and binds its scrape listener to
/// `addr`.
pub fn start_metrics_server(addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: std::net::SocketAddr = addr.parse()?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reporter_accepts_any_outcome() {
        let reporter = NullReporter;
        reporter.record_decision("example.com", true, false, Duration::from_millis(1));
        reporter.record_decision("example.com", false, false, Duration::from_millis(1));
    }
}
