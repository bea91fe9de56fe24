//! `ResponseTracker`: response signatures, candidate URL derivation, and the
//! `SetResponse` contract that decides "resume" vs. "new offer" (spec.md §4.2).

// self
use sha2::{Digest, Sha256};

use crate::{_prelude::*, download_source::DownloadSource};

/// One URL offered in a response, with the attributes the signature and the
/// sequencer need.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseUrl {
	/// The URL itself.
	pub url: String,
	/// Per-URL failure threshold override, if the response carries one.
	pub failure_limit: u32,
	/// Which [`DownloadSource`] this URL is served from.
	pub download_source: DownloadSource,
}

/// A structured server offer, already parsed. Parsing itself is out of
/// scope for this crate; callers hand in this value directly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpdateResponse {
	/// OS version this response offers.
	pub manifest_version: String,
	/// Declared payload size in bytes.
	pub payload_size: u64,
	/// SHA-256 hash of the payload, as it will appear once downloaded.
	pub payload_hash_sha256: String,
	/// Declared metadata size in bytes.
	pub metadata_size: u64,
	/// Metadata signature blob, opaque to this crate.
	pub metadata_signature: String,
	/// URLs offered for this payload, in server order.
	pub urls: Vec<ResponseUrl>,
	/// Whether this is a full (non-delta) payload.
	pub is_full_payload: bool,
	/// Whether this check was interactive/forced by the user.
	pub is_interactive: bool,
	/// Whether the response carries a deadline hint overriding backoff.
	pub has_deadline_hint: bool,
}

/// Separator chosen so no field value can be confused with a field boundary:
/// none of the fields this crate hashes may themselves legally contain it.
const SIGNATURE_SEPARATOR: char = '\u{1f}';

/// Compute the canonical response signature (spec.md §4.2 "Signature").
pub fn calculate_response_signature(response: &UpdateResponse) -> String {
	let mut fields = vec![
		response.manifest_version.clone(),
		response.payload_size.to_string(),
		response.payload_hash_sha256.clone(),
		response.metadata_size.to_string(),
		response.metadata_signature.clone(),
	];
	for url in &response.urls {
		fields.push(url.url.clone());
		fields.push(url.failure_limit.to_string());
		fields.push(url.download_source.key_fragment().to_string());
	}

	let joined = fields.join(&SIGNATURE_SEPARATOR.to_string());

	let mut hasher = Sha256::new();
	hasher.update(joined.as_bytes());

	hex::encode(hasher.finalize())
}

/// Derive the ordered candidate URL list for `response`, retaining only
/// URLs `policy` allows. No deduplication (spec.md §4.2).
pub fn derive_candidate_urls(response: &UpdateResponse, policy: &dyn Fn(&str) -> bool) -> Vec<ResponseUrl> {
	response.urls.iter().filter(|candidate| policy(&candidate.url)).cloned().collect()
}

/// Outcome of `SetResponse`, telling the caller which side-effects to apply
/// to the other components (they are not owned by this tracker).
#[derive(Debug, Eq, PartialEq)]
pub enum SetResponseOutcome {
	/// Same offer as before; only `url_index` clamping is needed.
	Resumed,
	/// A new offer superseded the previous one; response-scoped state must
	/// be reset and `num_responses_seen` incremented.
	Superseded,
}

/// Tracks the current response, its signature, and how many distinct
/// responses have been observed.
#[derive(Debug)]
pub struct ResponseTracker {
	response: Option<UpdateResponse>,
	response_signature: String,
	num_responses_seen: u64,
	candidate_urls: Vec<ResponseUrl>,
}
impl ResponseTracker {
	/// Restore from a persisted signature and responses-seen counter. The
	/// response value itself is never persisted (spec.md §3, `response_`).
	pub fn restore(response_signature: String, num_responses_seen: u64) -> Self {
		Self { response: None, response_signature, num_responses_seen, candidate_urls: Vec::new() }
	}

	/// `SetResponse(response)`: apply the resume-vs-new-offer contract and
	/// report which branch was taken.
	#[tracing::instrument(skip(self, response, policy))]
	pub fn set_response(
		&mut self,
		response: UpdateResponse,
		policy: &dyn Fn(&str) -> bool,
	) -> SetResponseOutcome {
		let new_signature = calculate_response_signature(&response);
		let outcome = if new_signature == self.response_signature {
			SetResponseOutcome::Resumed
		} else {
			self.response_signature = new_signature;
			self.num_responses_seen += 1;

			SetResponseOutcome::Superseded
		};

		self.candidate_urls = derive_candidate_urls(&response, policy);
		self.response = Some(response);

		tracing::debug!(?outcome, candidate_url_count = self.candidate_urls.len(), "response applied");

		outcome
	}

	/// Canonical signature of the currently tracked response.
	pub fn response_signature(&self) -> &str {
		&self.response_signature
	}

	/// Number of distinct responses seen for the life of this tracker.
	pub fn num_responses_seen(&self) -> u64 {
		self.num_responses_seen
	}

	/// Reset the responses-seen counter (only on `UpdateSucceeded`).
	pub fn reset_num_responses_seen(&mut self) {
		self.num_responses_seen = 0;
	}

	/// Current candidate URL list, after policy filtering.
	pub fn candidate_urls(&self) -> &[ResponseUrl] {
		&self.candidate_urls
	}

	/// URL string at `index`, or the empty string if out of range
	/// (spec.md §3 invariant: "otherwise accessors return the empty string").
	pub fn url_at(&self, index: usize) -> &str {
		self.candidate_urls.get(index).map(|entry| entry.url.as_str()).unwrap_or("")
	}

	/// Whether the currently tracked response is a full (non-delta) payload.
	pub fn is_full_payload(&self) -> bool {
		self.response.as_ref().is_some_and(|response| response.is_full_payload)
	}

	/// Whether the current check is interactive/forced.
	pub fn is_interactive(&self) -> bool {
		self.response.as_ref().is_some_and(|response| response.is_interactive)
	}

	/// Whether the current response carries a deadline hint.
	pub fn has_deadline_hint(&self) -> bool {
		self.response.as_ref().is_some_and(|response| response.has_deadline_hint)
	}
}
