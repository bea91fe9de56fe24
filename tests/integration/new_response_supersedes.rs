//! spec.md §8 scenario 3: "New response supersedes".

use super::support::{allow_all_policy, harness_with_max_failures, response_with_three_urls};
use payload_state::DownloadSource;

#[test]
fn new_offer_resets_response_scoped_state_but_preserves_totals() {
	let mut harness = harness_with_max_failures(2);

	harness.engine.set_response(response_with_three_urls("1.0.0"), allow_all_policy());
	harness.engine.download_progress(300);
	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);
	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);
	harness.engine.update_failed(payload_state::UpdateFailureKind::DownloadTransferError);

	assert_eq!(harness.engine.url_failure_count(), 1);
	assert_eq!(harness.engine.url_switch_count(), 1);
	assert_eq!(harness.engine.current_bytes_downloaded(DownloadSource::HttpsServer), 300);

	harness.engine.set_response(response_with_three_urls("2.0.0"), allow_all_policy());

	assert_eq!(harness.engine.current_url(), "https://a.example/payload");
	assert_eq!(harness.engine.url_failure_count(), 0);
	assert_eq!(harness.engine.payload_attempt_number(), 0);
	assert_eq!(harness.engine.current_bytes_downloaded(DownloadSource::HttpsServer), 0);
	assert_eq!(harness.engine.total_bytes_downloaded(DownloadSource::HttpsServer), 300);
	assert_eq!(harness.engine.num_responses_seen(), 2);
}
