//! `PayloadStateMachine`: the façade binding every component together.
//!
//! Grounded on the teacher's `Registry`, which likewise holds the
//! persistence handle and the narrow capability traits (clock, HTTP client)
//! behind trait objects and exposes one coherent API over several owned
//! components. Every event method here follows the same shape: read what's
//! needed from the owned components, compute the transition, write through
//! to persistence, optionally emit metrics.

// self
use rand::{SeedableRng, rngs::StdRng};

use crate::{
	_prelude::*,
	accounting::DurationAndBytesAccountant,
	backoff::BackoffPolicy,
	clock::{MonotonicClock, WallClock},
	config::{EngineConfig, PersistedKeys},
	download_source::DownloadSource,
	metrics::{MetricNames, MetricsSink},
	persisted_store::PersistedStore,
	reboot::{BootTransition, RebootAndRollbackTracker},
	response::{ResponseTracker, SetResponseOutcome, UpdateResponse},
	sequencer::{AttemptSequencer, UpdateFailureKind},
	system_state::SystemState,
};

/// The payload state machine core (spec.md §1-§6).
///
/// Single-threaded by contract: every `&mut self` method assumes it is
/// called by one driver that never re-enters the core (spec.md §5).
pub struct PayloadStateMachine {
	config: EngineConfig,
	store: PersistedStore,
	wall_clock: Box<dyn WallClock>,
	monotonic_clock: Box<dyn MonotonicClock>,
	system: Box<dyn SystemState>,
	metrics: Box<dyn MetricsSink>,
	rng: StdRng,
	response: ResponseTracker,
	sequencer: AttemptSequencer,
	backoff: BackoffPolicy,
	accounting: DurationAndBytesAccountant,
	reboot: RebootAndRollbackTracker,
}
impl std::fmt::Debug for PayloadStateMachine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PayloadStateMachine")
			.field("response", &self.response)
			.field("sequencer", &self.sequencer)
			.field("reboot", &self.reboot)
			.finish_non_exhaustive()
	}
}
impl PayloadStateMachine {
	/// Construct the engine, loading every persisted field (spec.md §3:
	/// "on startup every field is loaded from persistence; absent keys
	/// default as specified").
	pub fn new(
		config: EngineConfig,
		store: PersistedStore,
		wall_clock: Box<dyn WallClock>,
		monotonic_clock: Box<dyn MonotonicClock>,
		system: Box<dyn SystemState>,
		metrics: Box<dyn MetricsSink>,
	) -> Self {
		let response_signature = store.get_string_or(PersistedKeys::RESPONSE_SIGNATURE, false, "");
		let num_responses_seen = store.get_int_or(PersistedKeys::NUM_RESPONSES_SEEN, false, 0) as u64;
		let response = ResponseTracker::restore(response_signature, num_responses_seen);

		let max_failure_count_per_url = config.max_failure_count_per_url;
		let payload_attempt_number =
			store.get_int_or(PersistedKeys::PAYLOAD_ATTEMPT_NUMBER, false, 0) as u64;
		let full_payload_attempt_number =
			store.get_int_or(PersistedKeys::FULL_PAYLOAD_ATTEMPT_NUMBER, false, 0) as u64;
		let url_index = store.get_int_or(PersistedKeys::URL_INDEX, false, 0).max(0) as usize;
		let url_failure_count = store.get_int_or(PersistedKeys::URL_FAILURE_COUNT, false, 0) as u32;
		let url_switch_count = store.get_int_or(PersistedKeys::URL_SWITCH_COUNT, false, 0) as u64;
		let sequencer = AttemptSequencer::restore(
			max_failure_count_per_url,
			payload_attempt_number,
			full_payload_attempt_number,
			url_index,
			url_failure_count,
			url_switch_count,
		);

		let backoff = BackoffPolicy::new(&config);

		let update_start = {
			let start = store.get_wall_instant(PersistedKeys::UPDATE_TIMESTAMP_START);
			(start != DateTime::<Utc>::UNIX_EPOCH).then_some(start)
		};
		let uptime_accumulated = Duration::from_micros(
			store.get_int_or(PersistedKeys::UPDATE_DURATION_UPTIME, false, 0).max(0) as u64,
		);
		let current_bytes = load_source_counters(&store, PersistedKeys::current_bytes, false);
		let total_bytes = load_source_counters(&store, PersistedKeys::total_bytes, false);
		let accounting = DurationAndBytesAccountant::restore(
			config.clock_drift_slack,
			update_start,
			uptime_accumulated,
			current_bytes,
			total_bytes,
		);

		let previous_boot_id = store.get_string_or(PersistedKeys::PREVIOUS_BOOT_ID, false, "");
		let num_reboots = store.get_int_or(PersistedKeys::NUM_REBOOTS, false, 0) as u32;
		let target_version_uid = store.get_string_or(PersistedKeys::TARGET_VERSION_UID, false, "");
		let rollback_version = {
			let value = store.get_string_or(PersistedKeys::ROLLBACK_VERSION, true, "");
			(!value.is_empty()).then_some(value)
		};
		let reboot = RebootAndRollbackTracker::restore(
			previous_boot_id,
			num_reboots,
			!target_version_uid.is_empty(),
			rollback_version,
		);

		let rng = StdRng::from_os_rng();

		Self { config, store, wall_clock, monotonic_clock, system, metrics, rng, response, sequencer, backoff, accounting, reboot }
	}

	fn now(&self) -> DateTime<Utc> {
		self.wall_clock.now()
	}

	fn monotonic_now(&self) -> Instant {
		self.monotonic_clock.now()
	}

	/// `SetResponse(response)` (spec.md §4.2).
	#[tracing::instrument(skip(self, response, policy))]
	pub fn set_response(&mut self, response: UpdateResponse, policy: &dyn Fn(&str) -> bool) {
		let now = self.now();
		let monotonic_now = self.monotonic_now();

		match self.response.set_response(response, policy) {
			SetResponseOutcome::Resumed => {
				self.sequencer.clamp_url_index(self.response.candidate_urls());
			},
			SetResponseOutcome::Superseded => {
				self.sequencer.reset();
				self.accounting.start_new_attempt(now, monotonic_now);
				self.accounting.reset_current_bytes();
				self.clear_backoff_expiry();
				self.sequencer.clamp_url_index(self.response.candidate_urls());
			},
		}

		self.persist_all();
	}

	/// `DownloadProgress(count)` (spec.md §4.3, §4.5).
	pub fn download_progress(&mut self, count: u64) {
		if self.accounting.update_start().is_none() {
			self.accounting.start_new_attempt(self.now(), self.monotonic_now());
		}

		self.accounting.record_bytes(self.sequencer.current_download_source(), count);
		self.persist_bytes();
	}

	/// `DownloadComplete()` (spec.md §4.3).
	pub fn download_complete(&mut self) {
		self.sequencer.download_complete(self.response.is_full_payload());

		self.metrics.send_count(
			MetricNames::BYTES_DOWNLOADED,
			self.accounting.current_bytes(self.sequencer.current_download_source()) as i64,
			0,
			i64::MAX,
			20,
		);
		self.persist_all();
	}

	/// `UpdateFailed(error)` (spec.md §4.3, §4.4, §7).
	pub fn update_failed(&mut self, kind: UpdateFailureKind) {
		let now = self.now();
		let is_full_payload = self.response.is_full_payload();

		let (action, new_expiry) = self.sequencer.update_failed(
			kind,
			self.response.candidate_urls(),
			is_full_payload,
			now,
			&self.backoff,
			&mut self.rng,
		);

		self.metrics.send_enum(MetricNames::UPDATE_FAILURE_KIND, kind as i64, 9);

		if matches!(action, crate::sequencer::UpdateFailureAction::NoneTerminalSuccess) {
			self.accounting.reset_current_bytes();
		}

		if let Some(expiry) = new_expiry {
			self.store.set_wall_instant(PersistedKeys::BACKOFF_EXPIRY_TIME, expiry);
		}
		self.persist_all();
	}

	/// `UpdateSucceeded()` (spec.md §4.3, §4.6).
	pub fn update_succeeded(&mut self) {
		let now = self.now();

		self.accounting.calculate_update_duration_uptime(self.monotonic_now());

		self.metrics.send_time(
			MetricNames::UPDATE_DURATION,
			self.accounting.get_update_duration(now),
			Duration::ZERO,
			Duration::from_secs(7 * 24 * 60 * 60),
			20,
		);
		self.metrics.send_time(
			MetricNames::UPDATE_DURATION_UPTIME,
			self.accounting.get_update_duration_uptime(),
			Duration::ZERO,
			Duration::from_secs(7 * 24 * 60 * 60),
			20,
		);
		self.metrics.send_count(
			MetricNames::URL_SWITCHES,
			self.sequencer.url_switch_count() as i64,
			0,
			i64::MAX,
			20,
		);
		self.metrics.send_enum(
			MetricNames::PAYLOAD_TYPE,
			self.response.is_full_payload() as i64,
			1,
		);
		self.metrics.send_count(
			MetricNames::ATTEMPTS_COUNT,
			self.sequencer.payload_attempt_number() as i64,
			0,
			i64::MAX,
			20,
		);
		self.metrics.send_count(
			MetricNames::UPDATES_ABANDONED,
			self.response.num_responses_seen().saturating_sub(1) as i64,
			0,
			i64::MAX,
			20,
		);

		self.sequencer.reset();
		self.accounting.reset_current_bytes();
		self.response.reset_num_responses_seen();
		self.reboot.reset_rollback_version();

		self.store.set_int(PersistedKeys::NUM_REBOOTS, 0, false);
		for source in DownloadSource::REAL {
			self.store.set_int(&PersistedKeys::total_bytes(source.key_fragment()), 0, false);
		}
		self.store.set_wall_instant(PersistedKeys::SYSTEM_UPDATED_MARKER, now);

		self.persist_all();
	}

	/// `UpdateResumed()` (spec.md §4.3): re-anchor uptime, no counter changes.
	pub fn update_resumed(&mut self) {
		self.accounting.calculate_update_duration_uptime(self.monotonic_now());
	}

	/// `UpdateRestarted()` (spec.md §4.3): start of a fresh attempt against the same response.
	pub fn update_restarted(&mut self) {
		self.accounting.start_new_attempt(self.now(), self.monotonic_now());
		self.persist_bytes();
	}

	/// `Rollback()` (spec.md §4.6).
	pub fn rollback(&mut self) {
		let running_version = self.system.running_os_version();

		self.reboot.rollback(running_version.clone());
		self.sequencer.reset();
		self.accounting.reset_current_bytes();
		self.clear_backoff_expiry();

		self.store.set_string(PersistedKeys::ROLLBACK_VERSION, &running_version, true);
		self.persist_all();
	}

	/// `ExpectRebootInNewVersion(target_version_uid)` (spec.md §4.6).
	pub fn expect_reboot_in_new_version(&mut self, target_version_uid: impl Into<String>) {
		self.reboot.expect_reboot_in_new_version();

		let target = target_version_uid.into();
		self.store.set_string(PersistedKeys::TARGET_VERSION_UID, &target, false);
		self.store.set_int(PersistedKeys::TARGET_VERSION_ATTEMPTS, 0, false);
	}

	/// `UpdateEngineStarted()` (spec.md §4.6): boot detection plus the
	/// failed-boot and booted-into-update checks.
	pub fn update_engine_started(&mut self) {
		let transition = self.reboot.update_num_reboots(self.system.as_ref());
		self.store.set_int(PersistedKeys::NUM_REBOOTS, self.reboot.num_reboots() as i64, false);
		self.store.set_string(PersistedKeys::PREVIOUS_BOOT_ID, self.reboot.previous_boot_id(), false);

		if transition != BootTransition::BootedIntoUpdate {
			self.report_failed_boot_if_needed();
		}

		self.check_booted_into_update();
	}

	fn report_failed_boot_if_needed(&mut self) {
		if self.reboot.is_expecting_reboot() {
			return;
		}

		let target = self.store.get_string_or(PersistedKeys::TARGET_VERSION_UID, false, "");
		if target.is_empty() {
			return;
		}

		if self.system.running_os_version() != target {
			let attempts = self.store.get_int_or(PersistedKeys::TARGET_VERSION_ATTEMPTS, false, 0);

			self.metrics.send_count(MetricNames::FAILED_BOOT_ATTEMPTS, attempts, 0, i64::MAX, 20);
			self.store.set_int(PersistedKeys::TARGET_VERSION_ATTEMPTS, attempts + 1, false);
		} else {
			self.store.set_string(PersistedKeys::TARGET_VERSION_UID, "", false);
			self.store.set_int(PersistedKeys::TARGET_VERSION_ATTEMPTS, 0, false);
		}
	}

	fn check_booted_into_update(&mut self) {
		if !self.store.exists(PersistedKeys::SYSTEM_UPDATED_MARKER, false) {
			return;
		}

		let target = self.store.get_string_or(PersistedKeys::TARGET_VERSION_UID, false, "");
		if !target.is_empty() && self.system.running_os_version() != target {
			return;
		}

		let now = self.now();
		let marker = self.store.get_wall_instant(PersistedKeys::SYSTEM_UPDATED_MARKER);
		let time_to_reboot = (now - marker).to_std().unwrap_or(Duration::ZERO);

		self.metrics.send_time(
			MetricNames::TIME_TO_REBOOT,
			time_to_reboot,
			Duration::ZERO,
			Duration::from_secs(24 * 60 * 60),
			20,
		);
		self.store.delete(PersistedKeys::SYSTEM_UPDATED_MARKER, false);
	}

	/// `ResetUpdateStatus()` (spec.md §5): forget the in-flight attempt
	/// without touching signatures or totals.
	pub fn reset_update_status(&mut self) {
		self.sequencer.reset();
		self.accounting.reset_current_bytes();
		self.clear_backoff_expiry();
		self.persist_all();
	}

	/// `ResetPersistedState`'s `backoff_expiry_time` clear (spec.md §4.2 step
	/// 4a), shared by a new offer, `Rollback`, and `ResetUpdateStatus`.
	fn clear_backoff_expiry(&self) {
		self.store.set_wall_instant(PersistedKeys::BACKOFF_EXPIRY_TIME, DateTime::<Utc>::UNIX_EPOCH);
	}

	fn persist_all(&self) {
		self.store.set_string(PersistedKeys::RESPONSE_SIGNATURE, self.response.response_signature(), false);
		self.store.set_int(PersistedKeys::NUM_RESPONSES_SEEN, self.response.num_responses_seen() as i64, false);
		self.store.set_int(
			PersistedKeys::PAYLOAD_ATTEMPT_NUMBER,
			self.sequencer.payload_attempt_number() as i64,
			false,
		);
		self.store.set_int(
			PersistedKeys::FULL_PAYLOAD_ATTEMPT_NUMBER,
			self.sequencer.full_payload_attempt_number() as i64,
			false,
		);
		self.store.set_int(PersistedKeys::URL_INDEX, self.sequencer.url_index() as i64, false);
		self.store.set_int(PersistedKeys::URL_FAILURE_COUNT, self.sequencer.url_failure_count() as i64, false);
		self.store.set_int(PersistedKeys::URL_SWITCH_COUNT, self.sequencer.url_switch_count() as i64, false);
		if let Some(start) = self.accounting.update_start() {
			self.store.set_wall_instant(PersistedKeys::UPDATE_TIMESTAMP_START, start);
		}
		self.store.set_int(
			PersistedKeys::UPDATE_DURATION_UPTIME,
			self.accounting.get_update_duration_uptime().as_micros() as i64,
			false,
		);
		self.persist_bytes();
	}

	fn persist_bytes(&self) {
		for source in DownloadSource::REAL {
			self.store.set_int(
				&PersistedKeys::current_bytes(source.key_fragment()),
				self.accounting.current_bytes(source) as i64,
				false,
			);
			self.store.set_int(
				&PersistedKeys::total_bytes(source.key_fragment()),
				self.accounting.total_bytes(source) as i64,
				false,
			);
		}
	}

	/// Canonical signature of the currently tracked response.
	pub fn response_signature(&self) -> &str {
		self.response.response_signature()
	}

	/// Current `payload_attempt_number`.
	pub fn payload_attempt_number(&self) -> u64 {
		self.sequencer.payload_attempt_number()
	}

	/// Current `full_payload_attempt_number`.
	pub fn full_payload_attempt_number(&self) -> u64 {
		self.sequencer.full_payload_attempt_number()
	}

	/// URL string the engine is currently pointed at.
	pub fn current_url(&self) -> &str {
		self.response.url_at(self.sequencer.url_index())
	}

	/// Current per-URL failure count.
	pub fn url_failure_count(&self) -> u32 {
		self.sequencer.url_failure_count()
	}

	/// Lifetime URL switch count for the current response.
	pub fn url_switch_count(&self) -> u64 {
		self.sequencer.url_switch_count()
	}

	/// Number of distinct responses seen since the last successful update.
	pub fn num_responses_seen(&self) -> u64 {
		self.response.num_responses_seen()
	}

	/// Currently persisted backoff expiry time.
	pub fn backoff_expiry_time(&self) -> DateTime<Utc> {
		self.store.get_clamped_wall_instant(PersistedKeys::BACKOFF_EXPIRY_TIME, self.now(), &self.config)
	}

	/// `ShouldBackoffDownload()` (spec.md §4.4).
	pub fn should_backoff_download(&self) -> bool {
		let applies = self
			.backoff
			.should_backoff_download(self.response.is_interactive(), self.response.has_deadline_hint());

		applies && self.now() < self.backoff_expiry_time()
	}

	/// Wall-clock duration of the current attempt.
	pub fn update_duration(&self) -> Duration {
		self.accounting.get_update_duration(self.now())
	}

	/// Monotonic uptime duration of the current attempt.
	pub fn update_duration_uptime(&self) -> Duration {
		self.accounting.get_update_duration_uptime()
	}

	/// Current-attempt bytes downloaded from `source`.
	pub fn current_bytes_downloaded(&self, source: DownloadSource) -> u64 {
		self.accounting.current_bytes(source)
	}

	/// Lifetime total bytes downloaded from `source`.
	pub fn total_bytes_downloaded(&self, source: DownloadSource) -> u64 {
		self.accounting.total_bytes(source)
	}

	/// Number of reboots observed during the current attempt.
	pub fn num_reboots(&self) -> u32 {
		self.reboot.num_reboots()
	}

	/// Currently blacklisted rollback version, if any.
	pub fn rollback_version(&self) -> Option<&str> {
		self.reboot.rollback_version()
	}
}

fn load_source_counters(
	store: &PersistedStore,
	key_fn: fn(&str) -> String,
	across_powerwash: bool,
) -> crate::download_source::SourceCounters {
	let mut counters = crate::download_source::SourceCounters::new();

	for source in DownloadSource::REAL {
		let value = store.get_int_or(&key_fn(source.key_fragment()), across_powerwash, 0).max(0) as u64;
		counters.set(source, value);
	}

	counters
}
