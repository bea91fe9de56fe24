//! spec.md §8 scenario 4: "Successful update".

use super::support::{allow_all_policy, harness_with_max_failures, response_with_three_urls};
use payload_state::{DownloadSource, MetricNames};

#[test]
fn update_succeeded_zeroes_counters_and_writes_marker() {
	let mut harness = harness_with_max_failures(2);

	harness.engine.set_response(response_with_three_urls("1.0.0"), allow_all_policy());
	harness.engine.download_progress(4096);
	harness.engine.download_complete();
	harness.engine.update_succeeded();

	assert_eq!(harness.engine.payload_attempt_number(), 0);
	assert_eq!(harness.engine.url_switch_count(), 0);
	assert_eq!(harness.engine.num_responses_seen(), 0);
	assert_eq!(harness.engine.total_bytes_downloaded(DownloadSource::HttpsServer), 0);
	assert_eq!(harness.engine.num_reboots(), 0);
	assert!(harness.metrics.has_metric(MetricNames::UPDATE_DURATION));
	assert!(harness.metrics.has_metric(MetricNames::ATTEMPTS_COUNT));
	assert!(harness.metrics.has_metric(MetricNames::UPDATES_ABANDONED));
}
