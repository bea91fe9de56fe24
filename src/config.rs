//! Engine configuration: the single value carrying every tunable constant.
//!
//! Per Design Note §9 ("Global constants... a single configuration value
//! passed at construction; do not scatter"), every knob the components in
//! this crate consult lives here rather than as free-floating `const`s.

// self
use crate::{_prelude::*, error::Error};

/// Per-URL failure threshold before the engine advances to the next URL.
pub const DEFAULT_MAX_FAILURE_COUNT_PER_URL: u32 = 10;
/// Base of the exponential backoff schedule (spec.md §4.4: `2^(n-1)` days).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound applied to backoff growth.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(16 * 24 * 60 * 60);
/// Uniform fuzz ratio applied to the chosen backoff duration.
pub const DEFAULT_BACKOFF_JITTER_RATIO: f64 = 0.05;
/// Slack allowed before wall-clock drift is treated as "zero duration" rather
/// than negative (spec.md §4.5).
pub const DEFAULT_CLOCK_DRIFT_SLACK: Duration = Duration::from_secs(5 * 60);

/// All persisted key names (spec.md §6), collected in one place.
pub struct PersistedKeys;
impl PersistedKeys {
	/// `response-signature`
	pub const RESPONSE_SIGNATURE: &'static str = "response-signature";
	/// `payload-attempt-number`
	pub const PAYLOAD_ATTEMPT_NUMBER: &'static str = "payload-attempt-number";
	/// `full-payload-attempt-number`
	pub const FULL_PAYLOAD_ATTEMPT_NUMBER: &'static str = "full-payload-attempt-number";
	/// `current-url-index`
	pub const URL_INDEX: &'static str = "current-url-index";
	/// `current-url-failure-count`
	pub const URL_FAILURE_COUNT: &'static str = "current-url-failure-count";
	/// `url-switch-count`
	pub const URL_SWITCH_COUNT: &'static str = "url-switch-count";
	/// `backoff-expiry-time`
	pub const BACKOFF_EXPIRY_TIME: &'static str = "backoff-expiry-time";
	/// `update-timestamp-start`
	pub const UPDATE_TIMESTAMP_START: &'static str = "update-timestamp-start";
	/// `update-duration-uptime`
	pub const UPDATE_DURATION_UPTIME: &'static str = "update-duration-uptime";
	/// `num-responses-seen`
	pub const NUM_RESPONSES_SEEN: &'static str = "num-responses-seen";
	/// `num-reboots`
	pub const NUM_REBOOTS: &'static str = "num-reboots";
	/// `previous-boot-id`
	pub const PREVIOUS_BOOT_ID: &'static str = "previous-boot-id";
	/// `target-version-uid`
	pub const TARGET_VERSION_UID: &'static str = "target-version-uid";
	/// `target-version-attempts`
	pub const TARGET_VERSION_ATTEMPTS: &'static str = "target-version-attempts";
	/// `system-updated-marker`
	pub const SYSTEM_UPDATED_MARKER: &'static str = "system-updated-marker";
	/// `rollback-version` (powerwash-safe)
	pub const ROLLBACK_VERSION: &'static str = "rollback-version";

	/// Per-source current-bytes key, e.g. `current-bytes-downloaded-HttpsServer`.
	pub fn current_bytes(source: &str) -> String {
		format!("current-bytes-downloaded-{source}")
	}

	/// Per-source total-bytes key, e.g. `total-bytes-downloaded-HttpsServer`.
	pub fn total_bytes(source: &str) -> String {
		format!("total-bytes-downloaded-{source}")
	}
}

/// Tunable configuration for a [`crate::engine::PayloadStateMachine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
	/// Failures permitted against a single URL before switching (spec.md §4.3).
	pub max_failure_count_per_url: u32,
	/// Base of the exponential backoff schedule.
	pub backoff_base: Duration,
	/// Upper bound applied to backoff growth.
	pub backoff_cap: Duration,
	/// Uniform fuzz ratio (e.g. `0.05` for ±5%) applied to the chosen backoff.
	pub backoff_jitter_ratio: f64,
	/// Drift slack before `GetUpdateDuration` treats a negative delta as zero.
	pub clock_drift_slack: Duration,
}
impl EngineConfig {
	/// Validate invariants for engine configuration.
	pub fn validate(&self) -> crate::error::Result<()> {
		if self.max_failure_count_per_url == 0 {
			return Err(Error::Config {
				field: "max_failure_count_per_url",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.backoff_cap < self.backoff_base {
			return Err(Error::Config {
				field: "backoff_cap",
				reason: "Must be greater than or equal to backoff_base.".into(),
			});
		}
		if !(0.0..=1.0).contains(&self.backoff_jitter_ratio) {
			return Err(Error::Config {
				field: "backoff_jitter_ratio",
				reason: "Must be within [0.0, 1.0].".into(),
			});
		}

		Ok(())
	}
}
impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			max_failure_count_per_url: DEFAULT_MAX_FAILURE_COUNT_PER_URL,
			backoff_base: DEFAULT_BACKOFF_BASE,
			backoff_cap: DEFAULT_BACKOFF_CAP,
			backoff_jitter_ratio: DEFAULT_BACKOFF_JITTER_RATIO,
			clock_drift_slack: DEFAULT_CLOCK_DRIFT_SLACK,
		}
	}
}

/// Builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
	config: EngineConfig,
}
impl EngineConfigBuilder {
	/// Start from the default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Override the per-URL failure threshold.
	pub fn max_failure_count_per_url(mut self, value: u32) -> Self {
		self.config.max_failure_count_per_url = value;

		self
	}

	/// Override the backoff base duration.
	pub fn backoff_base(mut self, value: Duration) -> Self {
		self.config.backoff_base = value;

		self
	}

	/// Override the backoff cap.
	pub fn backoff_cap(mut self, value: Duration) -> Self {
		self.config.backoff_cap = value;

		self
	}

	/// Override the backoff jitter ratio.
	pub fn backoff_jitter_ratio(mut self, value: f64) -> Self {
		self.config.backoff_jitter_ratio = value;

		self
	}

	/// Override the clock drift slack.
	pub fn clock_drift_slack(mut self, value: Duration) -> Self {
		self.config.clock_drift_slack = value;

		self
	}

	/// Finalise and validate the configuration.
	pub fn build(self) -> crate::error::Result<EngineConfig> {
		self.config.validate()?;

		Ok(self.config)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_config_validates() {
		assert!(EngineConfig::default().validate().is_ok());
	}

	#[test]
	fn rejects_cap_below_base() {
		let config = EngineConfigBuilder::new()
			.backoff_base(Duration::from_secs(10))
			.backoff_cap(Duration::from_secs(5))
			.build();

		assert!(config.is_err());
	}

	#[test]
	fn rejects_zero_failure_threshold() {
		let config = EngineConfigBuilder::new().max_failure_count_per_url(0).build();

		assert!(config.is_err());
	}
}
