//! Duration and byte accounting (spec.md §4.5).
//!
//! Two independent clocks are tracked: wall-clock duration since the update
//! attempt started (reset to zero on drift, never negative) and monotonic
//! "uptime" duration, which only accumulates while the process is actually
//! running. Bytes are tracked per [`DownloadSource`], current and total.

// self
use crate::{_prelude::*, download_source::{DownloadSource, SourceCounters}};

/// Accumulates update duration and per-source byte counts across the life
/// of a single payload attempt.
#[derive(Debug)]
pub struct DurationAndBytesAccountant {
	clock_drift_slack: Duration,
	/// Wall-clock instant the current attempt started, or `None` before the
	/// first `DownloadProgress`/`UpdateSucceeded` call anchors it.
	update_start: Option<DateTime<Utc>>,
	/// Monotonic instant accounting was last anchored from.
	uptime_anchor: Option<Instant>,
	/// Accumulated monotonic uptime duration for the current attempt.
	uptime_accumulated: Duration,
	current_bytes: SourceCounters,
	total_bytes: SourceCounters,
}
impl DurationAndBytesAccountant {
	/// Build a fresh accountant.
	pub fn new(clock_drift_slack: Duration) -> Self {
		Self {
			clock_drift_slack,
			update_start: None,
			uptime_anchor: None,
			uptime_accumulated: Duration::ZERO,
			current_bytes: SourceCounters::new(),
			total_bytes: SourceCounters::new(),
		}
	}

	/// Restore previously persisted counters (e.g. across a process restart).
	pub fn restore(
		clock_drift_slack: Duration,
		update_start: Option<DateTime<Utc>>,
		uptime_accumulated: Duration,
		current_bytes: SourceCounters,
		total_bytes: SourceCounters,
	) -> Self {
		Self {
			clock_drift_slack,
			update_start,
			uptime_anchor: None,
			uptime_accumulated,
			current_bytes,
			total_bytes,
		}
	}

	/// Anchor the start of a new attempt. Called from `SetResponse` when a
	/// genuinely new offer (not a resume) begins.
	pub fn start_new_attempt(&mut self, now: DateTime<Utc>, monotonic_now: Instant) {
		self.update_start = Some(now);
		self.uptime_anchor = Some(monotonic_now);
		self.uptime_accumulated = Duration::ZERO;
		self.current_bytes.reset();
	}

	/// `GetUpdateDuration`: wall-clock time elapsed since the attempt
	/// started. Clamped to zero if `now` appears to precede the recorded
	/// start by more than `clock_drift_slack` (spec.md §4.5).
	pub fn get_update_duration(&self, now: DateTime<Utc>) -> Duration {
		let Some(start) = self.update_start else {
			return Duration::ZERO;
		};

		let delta = now - start;
		if delta < -self.clock_drift_slack.to_chrono() {
			return Duration::ZERO;
		}

		delta.to_std().unwrap_or(Duration::ZERO)
	}

	/// `CalculateUpdateDurationUptime`: fold elapsed monotonic time since the
	/// last anchor into the running total, then re-anchor to `monotonic_now`.
	/// Does not advance while the process is not running, so suspend time is
	/// never counted (spec.md GLOSSARY: "Uptime").
	pub fn calculate_update_duration_uptime(&mut self, monotonic_now: Instant) -> Duration {
		if let Some(anchor) = self.uptime_anchor {
			self.uptime_accumulated += monotonic_now.saturating_duration_since(anchor);
		}
		self.uptime_anchor = Some(monotonic_now);

		self.uptime_accumulated
	}

	/// `GetUpdateDurationUptime`: the accumulated monotonic uptime without
	/// folding in any further elapsed time.
	pub fn get_update_duration_uptime(&self) -> Duration {
		self.uptime_accumulated
	}

	/// Record `bytes` downloaded from `source`, advancing both the
	/// current-attempt and lifetime-total counters.
	pub fn record_bytes(&mut self, source: DownloadSource, bytes: u64) {
		self.current_bytes.add(source, bytes);
		self.total_bytes.add(source, bytes);
	}

	/// Current-attempt bytes downloaded from `source`.
	pub fn current_bytes(&self, source: DownloadSource) -> u64 {
		self.current_bytes.get(source)
	}

	/// Lifetime total bytes downloaded from `source`.
	pub fn total_bytes(&self, source: DownloadSource) -> u64 {
		self.total_bytes.get(source)
	}

	/// Reset current-attempt byte counters without touching lifetime totals
	/// (a new attempt against a fresh response starts counting from zero).
	pub fn reset_current_bytes(&mut self) {
		self.current_bytes.reset();
	}

	/// Wall-clock instant the current attempt started, for persistence.
	pub fn update_start(&self) -> Option<DateTime<Utc>> {
		self.update_start
	}
}

/// Helper converting `std::time::Duration` to a `chrono::TimeDelta`, saturating
/// rather than panicking on values outside `TimeDelta`'s range.
trait ToChrono {
	fn to_chrono(self) -> TimeDelta;
}
impl ToChrono for Duration {
	fn to_chrono(self) -> TimeDelta {
		TimeDelta::from_std(self).unwrap_or(TimeDelta::MAX)
	}
}
