//! Shared fixtures for the scenario-level integration tests.

use payload_state::{
	DownloadSource, EngineConfig, InMemoryStore, PayloadStateMachine, PersistedStore, ResponseUrl,
	UpdateResponse,
	testing::{FakeClock, FakeSystemState, RecordingMetricsSink},
};

/// A fully-wired engine plus the fakes the test wants to poke at directly.
pub struct Harness {
	pub engine: PayloadStateMachine,
	pub clock: std::sync::Arc<FakeClock>,
	pub system: std::sync::Arc<FakeSystemState>,
	pub metrics: std::sync::Arc<RecordingMetricsSink>,
}

/// Build a harness with a two-failure-per-URL threshold, matching the
/// fixture spec.md §8's concrete scenarios are phrased against.
pub fn harness_with_max_failures(max_failure_count_per_url: u32) -> Harness {
	let clock = std::sync::Arc::new(FakeClock::new(chrono::Utc::now()));
	let system = std::sync::Arc::new(FakeSystemState::new("boot-0", "1.0.0"));
	let metrics = std::sync::Arc::new(RecordingMetricsSink::new());

	let config =
		EngineConfig { max_failure_count_per_url, ..EngineConfig::default() };
	let store = PersistedStore::new(Box::new(InMemoryStore::new()), Box::new(InMemoryStore::new()));

	let engine = PayloadStateMachine::new(
		config,
		store,
		Box::new(ArcWallClock(clock.clone())),
		Box::new(ArcMonotonicClock(clock.clone())),
		Box::new(ArcSystemState(system.clone())),
		Box::new(ArcMetricsSink(metrics.clone())),
	);

	Harness { engine, clock, system, metrics }
}

/// A response offering three candidate URLs, A/B/C, all HTTPS.
pub fn response_with_three_urls(version: &str) -> UpdateResponse {
	UpdateResponse {
		manifest_version: version.to_string(),
		payload_size: 4096,
		payload_hash_sha256: "f".repeat(64),
		metadata_size: 128,
		metadata_signature: "sig".to_string(),
		urls: vec![
			ResponseUrl {
				url: "https://a.example/payload".into(),
				failure_limit: 10,
				download_source: DownloadSource::HttpsServer,
			},
			ResponseUrl {
				url: "https://b.example/payload".into(),
				failure_limit: 10,
				download_source: DownloadSource::HttpsServer,
			},
			ResponseUrl {
				url: "https://c.example/payload".into(),
				failure_limit: 10,
				download_source: DownloadSource::HttpsServer,
			},
		],
		is_full_payload: true,
		is_interactive: false,
		has_deadline_hint: false,
	}
}

fn allow_all(_url: &str) -> bool {
	true
}

/// The policy predicate every scenario uses: accept every candidate URL.
pub fn allow_all_policy() -> &'static dyn Fn(&str) -> bool {
	&allow_all
}

#[derive(Debug)]
struct ArcWallClock(std::sync::Arc<FakeClock>);
impl payload_state::WallClock for ArcWallClock {
	fn now(&self) -> chrono::DateTime<chrono::Utc> {
		payload_state::WallClock::now(self.0.as_ref())
	}
}

#[derive(Debug)]
struct ArcMonotonicClock(std::sync::Arc<FakeClock>);
impl payload_state::MonotonicClock for ArcMonotonicClock {
	fn now(&self) -> std::time::Instant {
		payload_state::MonotonicClock::now(self.0.as_ref())
	}
}

#[derive(Debug)]
struct ArcSystemState(std::sync::Arc<FakeSystemState>);
impl payload_state::SystemState for ArcSystemState {
	fn boot_id(&self) -> String {
		self.0.boot_id()
	}

	fn running_os_version(&self) -> String {
		self.0.running_os_version()
	}

	fn hardware_policy_predicate(&self, url: &str) -> bool {
		self.0.hardware_policy_predicate(url)
	}

	fn is_official_build(&self) -> bool {
		self.0.is_official_build()
	}
}

#[derive(Debug)]
struct ArcMetricsSink(std::sync::Arc<RecordingMetricsSink>);
impl payload_state::MetricsSink for ArcMetricsSink {
	fn send_enum(&self, name: &'static str, value: i64, max: i64) {
		self.0.send_enum(name, value, max);
	}

	fn send_count(&self, name: &'static str, value: i64, min: i64, max: i64, buckets: u32) {
		self.0.send_count(name, value, min, max, buckets);
	}

	fn send_time(
		&self,
		name: &'static str,
		value: std::time::Duration,
		min: std::time::Duration,
		max: std::time::Duration,
		buckets: u32,
	) {
		self.0.send_time(name, value, min, max, buckets);
	}
}
