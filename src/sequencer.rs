//! `AttemptSequencer`: the URL/attempt counters and their transition rules
//! (spec.md §4.3).
//!
//! This is the busiest component in the crate: almost every event passes
//! through it. Grounded on the teacher's `CacheEntry` transition methods
//! (each external event maps to one or more small, named internal
//! transitions rather than one large match), generalised from a four-state
//! cache lifecycle to the flatter counter-based lifecycle this spec calls for.

// self
use crate::{_prelude::*, backoff::BackoffPolicy, download_source::DownloadSource, response::ResponseUrl};

/// The canonical error classification table (spec.md §4.3, §9 Open Question
/// (b)). Any error not named here defaults to [`UpdateFailureAction::RetrySameUrl`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateFailureKind {
	/// Not actually a failure; callers should not reach `UpdateFailed` with this.
	Success,
	/// Unclassified error, retried against the same URL.
	Error,
	/// The server itself rejected the request.
	OmahaError,
	/// A transient transport failure.
	DownloadTransferError,
	/// The downloaded payload's hash did not match the manifest.
	PayloadHashMismatchError,
	/// The metadata signature did not match.
	DownloadMetadataSignatureMismatch,
	/// A delta payload was expected to be signed but was not.
	SignedDeltaPayloadExpectedError,
	/// Any kind this table does not explicitly name.
	Other,
	/// A non-retryable internal failure (e.g. disk full): terminal, clears
	/// in-flight counters, never advances the URL or attempt (spec.md §4.3, §7).
	Fatal,
}
impl UpdateFailureKind {
	/// Resolve this error kind to the action `AttemptSequencer::update_failed`
	/// should take, per the canonical table.
	pub fn action(self) -> UpdateFailureAction {
		use UpdateFailureAction::*;

		match self {
			Self::Success | Self::Fatal => NoneTerminalSuccess,
			Self::OmahaError | Self::PayloadHashMismatchError | Self::DownloadMetadataSignatureMismatch => {
				SkipToNextUrl
			},
			Self::SignedDeltaPayloadExpectedError => SkipToNextUrl,
			Self::DownloadTransferError | Self::Error | Self::Other => RetrySameUrl,
		}
	}
}

/// Action an [`UpdateFailureKind`] resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateFailureAction {
	/// Not a real failure; the caller should not have reached this path.
	NoneTerminalSuccess,
	/// Increment the per-URL failure count (may cascade into a URL switch).
	RetrySameUrl,
	/// Advance the URL index immediately, bypassing the failure threshold.
	SkipToNextUrl,
}

/// Owns `payload_attempt_number`, `full_payload_attempt_number`, `url_index`,
/// `url_failure_count`, `url_switch_count`, and `current_download_source`.
#[derive(Debug)]
pub struct AttemptSequencer {
	max_failure_count_per_url: u32,
	payload_attempt_number: u64,
	full_payload_attempt_number: u64,
	url_index: usize,
	url_failure_count: u32,
	url_switch_count: u64,
	current_download_source: DownloadSource,
}
impl AttemptSequencer {
	/// Restore sequencer state from persisted values.
	pub fn restore(
		max_failure_count_per_url: u32,
		payload_attempt_number: u64,
		full_payload_attempt_number: u64,
		url_index: usize,
		url_failure_count: u32,
		url_switch_count: u64,
	) -> Self {
		Self {
			max_failure_count_per_url,
			payload_attempt_number,
			full_payload_attempt_number,
			url_index,
			url_failure_count,
			url_switch_count,
			current_download_source: DownloadSource::None,
		}
	}

	/// Zero every counter this component owns (spec.md §4.2 `ResetPersistedState`,
	/// §4.6 `Rollback`, and `ResetUpdateStatus`).
	pub fn reset(&mut self) {
		self.payload_attempt_number = 0;
		self.full_payload_attempt_number = 0;
		self.url_index = 0;
		self.url_failure_count = 0;
		self.url_switch_count = 0;
		self.current_download_source = DownloadSource::None;
	}

	/// Clamp `url_index` into range after candidate URLs were recomputed,
	/// without otherwise touching any counter (spec.md §4.2 step 3, resume path).
	pub fn clamp_url_index(&mut self, candidate_urls: &[ResponseUrl]) {
		let candidate_url_count = candidate_urls.len();
		if candidate_url_count == 0 {
			self.url_index = 0;
		} else if self.url_index >= candidate_url_count {
			self.url_index = candidate_url_count - 1;
		}
		self.refresh_current_download_source(candidate_urls);
	}

	/// `current_download_source` is cached from `url_index`: the
	/// `download_source` the server itself declared for the URL at that
	/// position (spec.md §3), not an arbitrary rotation through the enum.
	fn refresh_current_download_source(&mut self, candidate_urls: &[ResponseUrl]) {
		self.current_download_source =
			candidate_urls.get(self.url_index).map(|url| url.download_source).unwrap_or(DownloadSource::None);
	}

	/// `IncrementUrlIndex`: advance to the next candidate URL, wrapping and
	/// bumping the attempt counters when the list is exhausted.
	#[tracing::instrument(skip(self, candidate_urls, backoff, rng))]
	pub fn increment_url_index(
		&mut self,
		candidate_urls: &[ResponseUrl],
		is_full_payload: bool,
		now: DateTime<Utc>,
		backoff: &BackoffPolicy,
		rng: &mut dyn rand::RngCore,
	) -> Option<DateTime<Utc>> {
		let candidate_url_count = candidate_urls.len();
		self.url_switch_count += 1;
		self.url_failure_count = 0;

		let mut new_expiry = None;
		self.url_index += 1;
		if candidate_url_count == 0 || self.url_index >= candidate_url_count {
			self.url_index = 0;
			self.payload_attempt_number += 1;
			if is_full_payload {
				self.full_payload_attempt_number += 1;
			}
			new_expiry =
				Some(backoff.update_backoff_expiry_time(self.full_payload_attempt_number as u32, now, rng));
		}
		self.refresh_current_download_source(candidate_urls);

		new_expiry
	}

	/// `IncrementFailureCount`: bump the per-URL failure count, cascading
	/// into `IncrementUrlIndex` once the configured threshold is reached.
	pub fn increment_failure_count(
		&mut self,
		candidate_urls: &[ResponseUrl],
		is_full_payload: bool,
		now: DateTime<Utc>,
		backoff: &BackoffPolicy,
		rng: &mut dyn rand::RngCore,
	) -> Option<DateTime<Utc>> {
		self.url_failure_count += 1;

		if self.url_failure_count >= self.max_failure_count_per_url {
			self.increment_url_index(candidate_urls, is_full_payload, now, backoff, rng)
		} else {
			None
		}
	}

	/// `DownloadComplete`: bump the attempt counters directly (no URL
	/// advance — the URL itself worked) and clear the per-URL failure count.
	pub fn download_complete(&mut self, is_full_payload: bool) {
		self.payload_attempt_number += 1;
		if is_full_payload {
			self.full_payload_attempt_number += 1;
		}
		self.url_failure_count = 0;
	}

	/// `UpdateFailed`: classify and apply `kind`, returning the action taken
	/// and, when it caused a URL wrap, the new backoff expiry.
	pub fn update_failed(
		&mut self,
		kind: UpdateFailureKind,
		candidate_urls: &[ResponseUrl],
		is_full_payload: bool,
		now: DateTime<Utc>,
		backoff: &BackoffPolicy,
		rng: &mut dyn rand::RngCore,
	) -> (UpdateFailureAction, Option<DateTime<Utc>>) {
		let action = kind.action();
		let expiry = match action {
			UpdateFailureAction::RetrySameUrl =>
				self.increment_failure_count(candidate_urls, is_full_payload, now, backoff, rng),
			UpdateFailureAction::SkipToNextUrl =>
				self.increment_url_index(candidate_urls, is_full_payload, now, backoff, rng),
			UpdateFailureAction::NoneTerminalSuccess => None,
		};

		(action, expiry)
	}

	/// Current value of `payload_attempt_number`.
	pub fn payload_attempt_number(&self) -> u64 {
		self.payload_attempt_number
	}

	/// Current value of `full_payload_attempt_number`.
	pub fn full_payload_attempt_number(&self) -> u64 {
		self.full_payload_attempt_number
	}

	/// Current `url_index`.
	pub fn url_index(&self) -> usize {
		self.url_index
	}

	/// Current per-URL failure count.
	pub fn url_failure_count(&self) -> u32 {
		self.url_failure_count
	}

	/// Lifetime URL switch count for the current response.
	pub fn url_switch_count(&self) -> u64 {
		self.url_switch_count
	}

	/// Download source associated with the current `url_index`.
	pub fn current_download_source(&self) -> DownloadSource {
		self.current_download_source
	}
}
