//! Metrics emission (spec.md §6 `MetricsSink`).
//!
//! The core never reaches for a global recorder directly; it calls a
//! narrow, enum/count/time sink passed in at construction (Design Note §9).
//! Two concrete sinks are provided: [`TracingMetricsSink`], always
//! available, and — behind the `metrics` feature — [`CountingMetricsSink`],
//! grounded on the teacher's global-recorder-backed telemetry.

// self
use crate::_prelude::*;

/// Narrow capability the core emits telemetry through. `max`/`min`/`buckets`
/// mirror the bounded-histogram style of the upstream metrics the core was
/// distilled from; concrete sinks are free to ignore them.
pub trait MetricsSink: std::fmt::Debug + Send + Sync {
	/// Record an enum-valued sample, e.g. an error classification.
	fn send_enum(&self, name: &'static str, value: i64, max: i64);
	/// Record a bounded count, e.g. a byte total or a retry count.
	fn send_count(&self, name: &'static str, value: i64, min: i64, max: i64, buckets: u32);
	/// Record a bounded duration.
	fn send_time(&self, name: &'static str, value: Duration, min: Duration, max: Duration, buckets: u32);
}

/// A [`MetricsSink`] that logs every sample through `tracing` at debug
/// level. Always available; useful in development and as a sane default
/// when the `metrics`/`prometheus` features are not enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetricsSink;
impl MetricsSink for TracingMetricsSink {
	fn send_enum(&self, name: &'static str, value: i64, max: i64) {
		tracing::debug!(metric = name, value, max, "enum metric");
	}

	fn send_count(&self, name: &'static str, value: i64, min: i64, max: i64, buckets: u32) {
		tracing::debug!(metric = name, value, min, max, buckets, "count metric");
	}

	fn send_time(&self, name: &'static str, value: Duration, min: Duration, max: Duration, buckets: u32) {
		tracing::debug!(
			metric = name,
			value_secs = value.as_secs_f64(),
			min_secs = min.as_secs_f64(),
			max_secs = max.as_secs_f64(),
			buckets,
			"time metric"
		);
	}
}

#[cfg(feature = "metrics")]
mod recorder {
	// std
	use std::sync::OnceLock;

	// crates.io
	use metrics::Label;
	#[cfg(feature = "prometheus")]
	use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
	use smallvec::SmallVec;

	// self
	use super::MetricsSink;
	use crate::_prelude::*;

	type LabelSet = SmallVec<[Label; 2]>;

	#[cfg(feature = "prometheus")]
	static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

	/// A [`MetricsSink`] backed by the global `metrics` recorder, grouping
	/// every sample under a stable `payload_state_` name prefix.
	#[derive(Clone, Copy, Debug, Default)]
	pub struct CountingMetricsSink;
	impl MetricsSink for CountingMetricsSink {
		fn send_enum(&self, name: &'static str, value: i64, _max: i64) {
			metrics::gauge!(prefixed(name), bucket_labels(value).iter()).set(value as f64);
		}

		fn send_count(&self, name: &'static str, value: i64, _min: i64, _max: i64, _buckets: u32) {
			metrics::histogram!(prefixed(name)).record(value as f64);
		}

		fn send_time(
			&self,
			name: &'static str,
			value: Duration,
			_min: Duration,
			_max: Duration,
			_buckets: u32,
		) {
			metrics::histogram!(prefixed(name)).record(value.as_secs_f64());
		}
	}

	fn prefixed(name: &'static str) -> String {
		format!("payload_state_{name}")
	}

	fn bucket_labels(value: i64) -> LabelSet {
		let mut labels = LabelSet::new();

		labels.push(Label::new("value", value.to_string()));

		labels
	}

	/// Install the default Prometheus recorder. Safe to call more than once;
	/// only the first call takes effect.
	#[cfg(feature = "prometheus")]
	pub fn install_default_exporter() -> Result<()> {
		if PROMETHEUS_HANDLE.get().is_some() {
			return Ok(());
		}

		let handle = PrometheusBuilder::new()
			.install_recorder()
			.map_err(|err| crate::Error::Metrics(err.to_string()))?;
		let _ = PROMETHEUS_HANDLE.set(handle);

		Ok(())
	}

	/// Access the global Prometheus exporter handle, once installed.
	#[cfg(feature = "prometheus")]
	pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
		PROMETHEUS_HANDLE.get()
	}
}
#[cfg(feature = "metrics")]
pub use recorder::CountingMetricsSink;
#[cfg(feature = "prometheus")]
pub use recorder::{install_default_exporter, prometheus_handle};

/// Canonical metric names the engine emits (spec.md §4.3, §4.5, §4.6).
pub struct MetricNames;
impl MetricNames {
	/// `UpdateFailed` error classification.
	pub const UPDATE_FAILURE_KIND: &'static str = "update_failure_kind";
	/// Bytes downloaded per attempt, on `DownloadComplete`.
	pub const BYTES_DOWNLOADED: &'static str = "bytes_downloaded";
	/// Total wall-clock duration of a completed/abandoned attempt.
	pub const UPDATE_DURATION: &'static str = "update_duration";
	/// Total monotonic uptime duration of a completed/abandoned attempt.
	pub const UPDATE_DURATION_UPTIME: &'static str = "update_duration_uptime";
	/// Lifetime URL switches for the completed attempt.
	pub const URL_SWITCHES: &'static str = "url_switches";
	/// Whether the completed payload was a full payload (1) or delta (0).
	pub const PAYLOAD_TYPE: &'static str = "payload_type";
	/// Number of payload attempts made before success.
	pub const ATTEMPTS_COUNT: &'static str = "attempts_count";
	/// Number of update attempts abandoned (superseded before success).
	pub const UPDATES_ABANDONED: &'static str = "updates_abandoned";
	/// Time from the update-applied marker to observed reboot completion.
	pub const TIME_TO_REBOOT: &'static str = "time_to_reboot";
	/// Failed-boot attempts counter, reported when a reboot doesn't land on target.
	pub const FAILED_BOOT_ATTEMPTS: &'static str = "failed_boot_attempts";
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tracing_sink_does_not_panic_on_any_call() {
		let sink = TracingMetricsSink;

		sink.send_enum(MetricNames::UPDATE_FAILURE_KIND, 2, 8);
		sink.send_count(MetricNames::BYTES_DOWNLOADED, 4096, 0, i64::MAX, 20);
		sink.send_time(MetricNames::UPDATE_DURATION, Duration::from_secs(30), Duration::ZERO, Duration::from_secs(3600), 20);
	}
}
