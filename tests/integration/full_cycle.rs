//! spec.md §8 scenario 2: "Full cycle" — two failures on each of three URLs.

use super::support::{allow_all_policy, harness_with_max_failures, response_with_three_urls};

#[test]
fn two_fails_on_each_of_three_urls_wraps_and_bumps_attempt_numbers() {
	let mut harness = harness_with_max_failures(2);

	harness.engine.set_response(response_with_three_urls("1.0.0"), allow_all_policy());

	for _ in 0..6 {
		harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);
	}

	assert_eq!(harness.engine.current_url(), "https://a.example/payload");
	assert_eq!(harness.engine.url_switch_count(), 3);
	assert_eq!(harness.engine.payload_attempt_number(), 1);
	assert_eq!(harness.engine.full_payload_attempt_number(), 1);

	let now = payload_state::WallClock::now(&*harness.clock);
	let expiry = harness.engine.backoff_expiry_time();
	let delta = expiry - now;

	assert!(delta >= chrono::TimeDelta::hours(22));
	assert!(delta <= chrono::TimeDelta::hours(26));
}
