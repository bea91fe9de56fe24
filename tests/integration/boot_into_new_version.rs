//! spec.md §8 scenario 5: "Boot into new version".
//!
//! Exercises surviving a process restart: the marker and target-version
//! bookkeeping must be read back from persistence by a second, independently
//! constructed engine.

use payload_state::{
	EngineConfig, InMemoryStore, KeyValueStore, MetricNames, MonotonicClock, PayloadStateMachine,
	PersistedStore, SystemState, WallClock,
	testing::{FakeClock, FakeSystemState, RecordingMetricsSink},
};

#[derive(Debug)]
struct SharedStore(std::sync::Arc<InMemoryStore>);
impl KeyValueStore for SharedStore {
	fn get_int(&self, key: &str) -> Option<i64> {
		self.0.get_int(key)
	}

	fn set_int(&self, key: &str, value: i64) {
		self.0.set_int(key, value);
	}

	fn get_string(&self, key: &str) -> Option<String> {
		self.0.get_string(key)
	}

	fn set_string(&self, key: &str, value: &str) {
		self.0.set_string(key, value);
	}

	fn delete(&self, key: &str) {
		self.0.delete(key);
	}

	fn exists(&self, key: &str) -> bool {
		self.0.exists(key)
	}
}

fn engine_over(
	normal: std::sync::Arc<InMemoryStore>,
	powerwash: std::sync::Arc<InMemoryStore>,
	clock: std::sync::Arc<FakeClock>,
	system: std::sync::Arc<FakeSystemState>,
	metrics: std::sync::Arc<RecordingMetricsSink>,
) -> PayloadStateMachine {
	PayloadStateMachine::new(
		EngineConfig::default(),
		PersistedStore::new(Box::new(SharedStore(normal)), Box::new(SharedStore(powerwash))),
		Box::new(ArcWallClock(clock.clone())),
		Box::new(ArcMonotonicClock(clock)),
		Box::new(ArcSystemState(system)),
		Box::new(ArcMetricsSink(metrics)),
	)
}

#[derive(Debug)]
struct ArcWallClock(std::sync::Arc<FakeClock>);
impl WallClock for ArcWallClock {
	fn now(&self) -> chrono::DateTime<chrono::Utc> {
		WallClock::now(self.0.as_ref())
	}
}

#[derive(Debug)]
struct ArcMonotonicClock(std::sync::Arc<FakeClock>);
impl MonotonicClock for ArcMonotonicClock {
	fn now(&self) -> std::time::Instant {
		MonotonicClock::now(self.0.as_ref())
	}
}

#[derive(Debug)]
struct ArcSystemState(std::sync::Arc<FakeSystemState>);
impl SystemState for ArcSystemState {
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

#[test]
fn booting_into_the_expected_version_emits_time_to_reboot_and_clears_marker() {
	let normal = std::sync::Arc::new(InMemoryStore::new());
	let powerwash = std::sync::Arc::new(InMemoryStore::new());
	let clock = std::sync::Arc::new(FakeClock::new(chrono::Utc::now()));
	let system = std::sync::Arc::new(FakeSystemState::new("boot-0", "1.0.0"));
	let metrics = std::sync::Arc::new(RecordingMetricsSink::new());

	let mut engine = engine_over(
		normal.clone(),
		powerwash.clone(),
		clock.clone(),
		system.clone(),
		metrics.clone(),
	);

	engine.expect_reboot_in_new_version("2.0.0");
	engine.update_succeeded();

	clock.advance(std::time::Duration::from_secs(5));
	system.set_boot_id("boot-1");
	system.set_running_os_version("2.0.0");

	let mut restarted =
		engine_over(normal, powerwash, clock, system, metrics.clone());
	restarted.update_engine_started();

	assert!(metrics.has_metric(MetricNames::TIME_TO_REBOOT));

	let time_to_reboot = metrics
		.samples()
		.into_iter()
		.find_map(|sample| match sample {
			payload_state::testing::RecordedMetric::TimeMillis { name, value_millis, .. }
				if name == MetricNames::TIME_TO_REBOOT =>
				Some(value_millis),
			_ => None,
		})
		.expect("time_to_reboot sample recorded");

	assert!(time_to_reboot >= 4_000 && time_to_reboot <= 6_000, "expected ~5s, got {time_to_reboot}ms");
}
