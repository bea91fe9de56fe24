//! Exponential backoff schedule for URL retries (spec.md §4.4).
//!
//! Grounded on the retry/backoff shape the teacher uses for transient HTTP
//! failures, generalised to the engine's own notion of "attempt number" and
//! stripped of anything HTTP-specific (jitter strategy selection, attempt
//! budgets): this crate always applies the same uniform jitter and never
//! gives up retrying on its own, since that decision belongs to the caller.

// self
use rand::RngCore;

use crate::{_prelude::*, config::EngineConfig};

/// Computes and checks backoff expiry times against the full-payload attempt
/// counter (spec.md §4.4: "keyed on the *full* payload attempt number, not
/// the per-URL attempt number").
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
	base: Duration,
	cap: Duration,
	jitter_ratio: f64,
}
impl BackoffPolicy {
	/// Build a policy from engine configuration.
	pub fn new(config: &EngineConfig) -> Self {
		Self { base: config.backoff_base, cap: config.backoff_cap, jitter_ratio: config.backoff_jitter_ratio }
	}

	/// `UpdateBackoffExpiryTime`: compute the wall-clock instant at which the
	/// next attempt against `full_payload_attempt_number` is allowed,
	/// starting from `now`.
	///
	/// Grows as `base * 2^(n-1)`, capped at `cap`, then fuzzed by a uniform
	/// `±jitter_ratio` factor so that devices which failed in lockstep do not
	/// retry in lockstep too. If `n == 0` the expiry is cleared to the epoch
	/// rather than backing off by a full base interval (spec.md §4.4).
	pub fn update_backoff_expiry_time(
		&self,
		full_payload_attempt_number: u32,
		now: DateTime<Utc>,
		rng: &mut dyn RngCore,
	) -> DateTime<Utc> {
		if full_payload_attempt_number == 0 {
			return DateTime::<Utc>::UNIX_EPOCH;
		}

		let exponent = full_payload_attempt_number.saturating_sub(1).min(32);
		let grown = self.base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
		let capped = grown.min(self.cap);

		now + apply_jitter(capped, self.jitter_ratio, rng)
	}

	/// `ShouldBackoffDownload`: whether backoff should be honoured at all for
	/// this response. Interactive checks and full-payload responses carrying
	/// an explicit deadline hint bypass backoff entirely (spec.md §4.4).
	pub fn should_backoff_download(&self, is_interactive: bool, has_deadline_hint: bool) -> bool {
		!is_interactive && !has_deadline_hint
	}
}

/// Apply a uniform `±ratio` fuzz to `duration`.
fn apply_jitter(duration: Duration, ratio: f64, rng: &mut dyn RngCore) -> Duration {
	if ratio <= 0.0 {
		return duration;
	}

	let fuzz = rng.random_range(-ratio..=ratio);
	let factor = (1.0 + fuzz).max(0.0);

	duration.mul_f64(factor)
}

#[cfg(test)]
mod tests {
	// external
	use rand::{SeedableRng, rngs::SmallRng};

	// self
	use super::*;

	fn policy() -> BackoffPolicy {
		BackoffPolicy::new(&EngineConfig::default())
	}

	#[test]
	fn first_attempt_backs_off_by_roughly_one_base_interval() {
		let policy = policy();
		let mut rng = SmallRng::seed_from_u64(1);
		let now = Utc::now();

		let expiry = policy.update_backoff_expiry_time(1, now, &mut rng);
		let delta = expiry - now;

		assert!(delta >= TimeDelta::zero());
		assert!(delta <= TimeDelta::days(2));
	}

	#[test]
	fn growth_is_capped() {
		let policy = policy();
		let mut rng = SmallRng::seed_from_u64(2);
		let now = Utc::now();

		let expiry = policy.update_backoff_expiry_time(20, now, &mut rng);
		let delta = expiry - now;
		let cap_with_jitter = TimeDelta::days(16) + TimeDelta::days(1);

		assert!(delta <= cap_with_jitter);
	}

	#[test]
	fn zero_attempt_number_clears_expiry_to_epoch() {
		let policy = policy();
		let mut rng = SmallRng::seed_from_u64(3);
		let now = Utc::now();

		let expiry = policy.update_backoff_expiry_time(0, now, &mut rng);

		assert_eq!(expiry, DateTime::<Utc>::UNIX_EPOCH);
	}

	#[test]
	fn interactive_checks_never_back_off() {
		let policy = policy();

		assert!(!policy.should_backoff_download(true, false));
		assert!(policy.should_backoff_download(false, false));
		assert!(!policy.should_backoff_download(false, true));
	}
}
