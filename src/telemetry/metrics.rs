//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines from startup.
pub fn describe_metrics() {
    describe_counter!(
        "nexus_site_resolved_total",
        "Requests bound to a site, by site"
    );
    describe_counter!(
        "nexus_site_unresolved_total",
        "Requests whose host matched no site"
    );
    describe_counter!(
        "nexus_sso_token_rejected_total",
        "SSO tokens that failed to decrypt"
    );
    describe_counter!(
        "nexus_sso_beacons_injected_total",
        "SSO beacons spliced into HTML responses"
    );

    counter!("nexus_site_unresolved_total").absolute(0);
    counter!("nexus_sso_token_rejected_total").absolute(0);
    counter!("nexus_sso_beacons_injected_total").absolute(0);
}
