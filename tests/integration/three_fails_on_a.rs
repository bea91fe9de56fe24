//! spec.md §8 scenario 1: "Three fails on A".

use super::support::{allow_all_policy, harness_with_max_failures, response_with_three_urls};

#[test]
fn three_fails_on_a_then_one_on_b() {
	let mut harness = harness_with_max_failures(2);

	harness.engine.set_response(response_with_three_urls("1.0.0"), allow_all_policy());

	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);
	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);

	assert_eq!(harness.engine.url_switch_count(), 1);
	assert_eq!(harness.engine.url_failure_count(), 0);
	assert_eq!(harness.engine.current_url(), "https://b.example/payload");

	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);

	assert_eq!(harness.engine.url_failure_count(), 1);
	assert_eq!(harness.engine.current_url(), "https://b.example/payload");
}
