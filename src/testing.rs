//! In-memory fakes for every consumed interface (spec.md §6), gated behind
//! the `testing` feature. These stand in for the external collaborators the
//! same way the teacher's `wiremock::MockServer` stands in for the JWKS
//! HTTP origin — except here everything is synchronous and in-process, since
//! the core itself has no network I/O to fake.

// self
use crate::{
	_prelude::*,
	clock::{MonotonicClock, WallClock},
	metrics::MetricsSink,
	system_state::SystemState,
};

/// [`WallClock`]/[`MonotonicClock`] pair whose time is advanced explicitly
/// by the test, rather than tracking the real clock.
#[derive(Debug)]
pub struct FakeClock {
	wall: std::sync::Mutex<DateTime<Utc>>,
	monotonic: std::sync::Mutex<Instant>,
}
impl FakeClock {
	/// Start the fake clock at `wall_start`, with its monotonic time anchored `now`.
	pub fn new(wall_start: DateTime<Utc>) -> Self {
		Self { wall: std::sync::Mutex::new(wall_start), monotonic: std::sync::Mutex::new(Instant::now()) }
	}

	/// Advance both the wall-clock and monotonic readings by `duration`.
	pub fn advance(&self, duration: Duration) {
		*self.wall.lock().unwrap() += TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
		*self.monotonic.lock().unwrap() += duration;
	}

	/// Advance only the wall clock, simulating clock drift independent of uptime.
	pub fn jump_wall_clock(&self, duration: TimeDelta) {
		*self.wall.lock().unwrap() += duration;
	}
}
impl WallClock for FakeClock {
	fn now(&self) -> DateTime<Utc> {
		*self.wall.lock().unwrap()
	}
}
impl MonotonicClock for FakeClock {
	fn now(&self) -> Instant {
		*self.monotonic.lock().unwrap()
	}
}

/// A [`SystemState`] whose answers are test-controlled.
#[derive(Debug)]
pub struct FakeSystemState {
	boot_id: std::sync::Mutex<String>,
	running_os_version: std::sync::Mutex<String>,
	is_official_build: bool,
	denied_urls: Vec<String>,
}
impl FakeSystemState {
	/// Construct a fake with an initial boot id and running version.
	pub fn new(boot_id: impl Into<String>, running_os_version: impl Into<String>) -> Self {
		Self {
			boot_id: std::sync::Mutex::new(boot_id.into()),
			running_os_version: std::sync::Mutex::new(running_os_version.into()),
			is_official_build: true,
			denied_urls: Vec::new(),
		}
	}

	/// Simulate a reboot: the next `boot_id()` call returns `new_boot_id`.
	pub fn set_boot_id(&self, new_boot_id: impl Into<String>) {
		*self.boot_id.lock().unwrap() = new_boot_id.into();
	}

	/// Simulate booting into a different OS version.
	pub fn set_running_os_version(&self, version: impl Into<String>) {
		*self.running_os_version.lock().unwrap() = version.into();
	}

	/// Mark this fake as a developer (non-official) build.
	pub fn set_official_build(mut self, is_official_build: bool) -> Self {
		self.is_official_build = is_official_build;

		self
	}

	/// Deny URLs matching any of these literal strings, as device policy would.
	pub fn deny_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.denied_urls = urls.into_iter().map(Into::into).collect();

		self
	}
}
impl SystemState for FakeSystemState {
	fn boot_id(&self) -> String {
		self.boot_id.lock().unwrap().clone()
	}

	fn running_os_version(&self) -> String {
		self.running_os_version.lock().unwrap().clone()
	}

	fn hardware_policy_predicate(&self, url: &str) -> bool {
		!self.denied_urls.iter().any(|denied| denied == url)
	}

	fn is_official_build(&self) -> bool {
		self.is_official_build
	}
}

/// A single recorded metrics sample.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordedMetric {
	/// `send_enum(name, value, max)`.
	Enum { name: &'static str, value: i64, max: i64 },
	/// `send_count(name, value, min, max, buckets)`.
	Count { name: &'static str, value: i64, min: i64, max: i64, buckets: u32 },
	/// `send_time(name, value, min, max, buckets)`, with durations reduced to
	/// milliseconds for easy equality assertions in tests.
	TimeMillis { name: &'static str, value_millis: u128, min_millis: u128, max_millis: u128, buckets: u32 },
}

/// A [`MetricsSink`] that records every call for later inspection instead of
/// emitting telemetry anywhere.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
	samples: std::sync::Mutex<Vec<RecordedMetric>>,
}
impl RecordingMetricsSink {
	/// Construct an empty recorder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot every sample recorded so far, in call order.
	pub fn samples(&self) -> Vec<RecordedMetric> {
		self.samples.lock().unwrap().clone()
	}

	/// Whether any sample with this metric name was recorded.
	pub fn has_metric(&self, name: &str) -> bool {
		self.samples.lock().unwrap().iter().any(|sample| match sample {
			RecordedMetric::Enum { name: n, .. }
			| RecordedMetric::Count { name: n, .. }
			| RecordedMetric::TimeMillis { name: n, .. } => *n == name,
		})
	}
}
impl MetricsSink for RecordingMetricsSink {
	fn send_enum(&self, name: &'static str, value: i64, max: i64) {
		self.samples.lock().unwrap().push(RecordedMetric::Enum { name, value, max });
	}

	fn send_count(&self, name: &'static str, value: i64, min: i64, max: i64, buckets: u32) {
		self.samples.lock().unwrap().push(RecordedMetric::Count { name, value, min, max, buckets });
	}

	fn send_time(&self, name: &'static str, value: Duration, min: Duration, max: Duration, buckets: u32) {
		self.samples.lock().unwrap().push(RecordedMetric::TimeMillis {
			name,
			value_millis: value.as_millis(),
			min_millis: min.as_millis(),
			max_millis: max.as_millis(),
			buckets,
		});
	}
}
