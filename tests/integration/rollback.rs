//! spec.md §8 scenario 6: "Rollback".

use super::support::{allow_all_policy, harness_with_max_failures, response_with_three_urls};

#[test]
fn rollback_blacklists_the_running_version_and_clears_in_flight_offer() {
	let mut harness = harness_with_max_failures(2);

	harness.engine.set_response(response_with_three_urls("1.0.0"), allow_all_policy());
	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);

	harness.engine.rollback();

	assert_eq!(harness.engine.rollback_version(), Some("1.0.0"));
	assert_eq!(harness.engine.url_failure_count(), 0);
	assert_eq!(harness.engine.url_switch_count(), 0);
}
