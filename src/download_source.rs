//! `DownloadSource`: a closed enum plus a sentinel, and the small fixed
//! counter map indexed by it (spec.md §3: "extra slot" arrays, generalised
//! per Design Note §9 into a total mapping).

/// Closed set of download sources a payload can be fetched from, plus a
/// sentinel "none/invalid" variant used when no URL is selected yet.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum DownloadSource {
	/// No URL selected, or an out-of-range index resolved to this slot.
	#[default]
	None,
	/// HTTPS CDN server.
	HttpsServer,
	/// Plain HTTP CDN server.
	HttpServer,
	/// Peer-to-peer HTTP source (local network peer).
	HttpPeer,
}
impl DownloadSource {
	/// All real (non-sentinel) sources, in a stable order.
	pub const REAL: [DownloadSource; 3] =
		[DownloadSource::HttpsServer, DownloadSource::HttpServer, DownloadSource::HttpPeer];

	/// Stable index into a [`SourceCounters`] map.
	const fn index(self) -> usize {
		match self {
			DownloadSource::HttpsServer => 0,
			DownloadSource::HttpServer => 1,
			DownloadSource::HttpPeer => 2,
			DownloadSource::None => 3,
		}
	}

	/// Canonical persisted-key fragment for this source, e.g. `HttpsServer`.
	pub const fn key_fragment(self) -> &'static str {
		match self {
			DownloadSource::HttpsServer => "HttpsServer",
			DownloadSource::HttpServer => "HttpServer",
			DownloadSource::HttpPeer => "HttpPeer",
			DownloadSource::None => "None",
		}
	}
}

const SLOT_COUNT: usize = 4;

/// A total mapping from [`DownloadSource`] (including the sentinel) to a
/// counter. Writes to the sentinel slot are harmless; it is never read
/// externally (spec.md §3).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SourceCounters {
	slots: [u64; SLOT_COUNT],
}
impl SourceCounters {
	/// All-zero counters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Read the counter for `source`.
	pub fn get(&self, source: DownloadSource) -> u64 {
		self.slots[source.index()]
	}

	/// Set the counter for `source`.
	pub fn set(&mut self, source: DownloadSource, value: u64) {
		self.slots[source.index()] = value;
	}

	/// Add `amount` to the counter for `source`, saturating at `u64::MAX`.
	pub fn add(&mut self, source: DownloadSource, amount: u64) {
		self.slots[source.index()] = self.slots[source.index()].saturating_add(amount);
	}

	/// Reset every slot to zero.
	pub fn reset(&mut self) {
		self.slots = [0; SLOT_COUNT];
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sentinel_slot_is_writable_but_isolated_from_real_sources() {
		let mut counters = SourceCounters::new();

		counters.add(DownloadSource::None, 100);
		counters.add(DownloadSource::HttpsServer, 5);

		assert_eq!(counters.get(DownloadSource::None), 100);
		assert_eq!(counters.get(DownloadSource::HttpsServer), 5);
	}

	#[test]
	fn add_saturates_instead_of_overflowing() {
		let mut counters = SourceCounters::new();

		counters.set(DownloadSource::HttpPeer, u64::MAX);
		counters.add(DownloadSource::HttpPeer, 10);

		assert_eq!(counters.get(DownloadSource::HttpPeer), u64::MAX);
	}
}
