//! Typed adapter over the two key-value backends (spec.md §4.1).
//!
//! The core never talks to a concrete preferences implementation; it talks
//! to this adapter, which in turn talks to two [`KeyValueStore`] instances —
//! one ordinary, one that survives a factory reset ("powerwash"). Integer
//! reads validate non-negativity; absent or negative values read back as
//! "absent" and the caller's default is substituted (spec.md §3, last row).

// self
use crate::{_prelude::*, config::EngineConfig};

/// A single string-keyed store backend. Implementations are free to be
/// in-memory, file-backed, or wrap a platform preferences API; the adapter
/// only requires synchronous, best-effort durability (spec.md §5: failures
/// degrade durability, not progress).
pub trait KeyValueStore: std::fmt::Debug + Send + Sync {
	/// Read a raw integer, if present.
	fn get_int(&self, key: &str) -> Option<i64>;
	/// Write a raw integer.
	fn set_int(&self, key: &str, value: i64);
	/// Read a raw string, if present.
	fn get_string(&self, key: &str) -> Option<String>;
	/// Write a raw string.
	fn set_string(&self, key: &str, value: &str);
	/// Remove a key entirely.
	fn delete(&self, key: &str);
	/// Whether a key is currently present.
	fn exists(&self, key: &str) -> bool;
}

/// Typed view over the normal and powerwash-safe backends.
#[derive(Debug)]
pub struct PersistedStore {
	normal: Box<dyn KeyValueStore>,
	powerwash_safe: Box<dyn KeyValueStore>,
}
impl PersistedStore {
	/// Build an adapter over the two backends.
	pub fn new(normal: Box<dyn KeyValueStore>, powerwash_safe: Box<dyn KeyValueStore>) -> Self {
		Self { normal, powerwash_safe }
	}

	fn backend(&self, across_powerwash: bool) -> &dyn KeyValueStore {
		if across_powerwash { self.powerwash_safe.as_ref() } else { self.normal.as_ref() }
	}

	/// Read a non-negative integer, falling back to `default` when absent or negative.
	pub fn get_int_or(&self, key: &str, across_powerwash: bool, default: i64) -> i64 {
		match self.backend(across_powerwash).get_int(key) {
			Some(value) if value >= 0 => value,
			_ => default,
		}
	}

	/// Write a non-negative integer.
	pub fn set_int(&self, key: &str, value: i64, across_powerwash: bool) {
		debug_assert!(value >= 0, "persisted integer fields must be non-negative");
		self.backend(across_powerwash).set_int(key, value);
	}

	/// Read a string, falling back to `default` when absent.
	pub fn get_string_or(&self, key: &str, across_powerwash: bool, default: &str) -> String {
		self.backend(across_powerwash).get_string(key).unwrap_or_else(|| default.to_string())
	}

	/// Write a string.
	pub fn set_string(&self, key: &str, value: &str, across_powerwash: bool) {
		self.backend(across_powerwash).set_string(key, value);
	}

	/// Remove a key.
	pub fn delete(&self, key: &str, across_powerwash: bool) {
		self.backend(across_powerwash).delete(key);
	}

	/// Whether a key is present.
	pub fn exists(&self, key: &str, across_powerwash: bool) -> bool {
		self.backend(across_powerwash).exists(key)
	}

	/// Read a persisted microsecond timestamp without adjustment, defaulting
	/// to the epoch when absent (spec.md §3: "absent keys default as
	/// specified"). For timestamps that are legitimately in the past, such
	/// as `update-timestamp-start` or `system-updated-marker`.
	pub fn get_wall_instant(&self, key: &str) -> DateTime<Utc> {
		let micros = self.get_int_or(key, false, 0);
		if micros <= 0 {
			return DateTime::<Utc>::UNIX_EPOCH;
		}

		DateTime::<Utc>::UNIX_EPOCH + TimeDelta::microseconds(micros)
	}

	/// Read the persisted backoff expiry time, clamping it into
	/// `[now, now + config.backoff_cap + jitter_allowance]` to guard against
	/// clock jumps leaving a stale absolute instant far in the past or
	/// future (spec.md §9, Open Question (a)). Only valid for
	/// `backoff-expiry-time`, which is always meant to sit at or after `now`
	/// — other persisted instants should use [`Self::get_wall_instant`].
	pub fn get_clamped_wall_instant(
		&self,
		key: &str,
		now: DateTime<Utc>,
		config: &EngineConfig,
	) -> DateTime<Utc> {
		let micros = self.get_int_or(key, false, 0);
		if micros <= 0 {
			return DateTime::<Utc>::UNIX_EPOCH;
		}

		let persisted = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::microseconds(micros);
		let ceiling = now + config.backoff_cap + config.backoff_cap.mul_f64(config.backoff_jitter_ratio);

		persisted.clamp(now, ceiling)
	}

	/// Persist a wall-clock instant as microseconds since the epoch.
	pub fn set_wall_instant(&self, key: &str, value: DateTime<Utc>) {
		let micros = (value - DateTime::<Utc>::UNIX_EPOCH).num_microseconds().unwrap_or(0).max(0);

		self.set_int(key, micros, false);
	}
}

/// A [`KeyValueStore`] held entirely in memory, keyed and typed at runtime.
///
/// Useful as the normal backend in tests, or as a scratch backend when no
/// persistence is wired up yet.
#[derive(Debug, Default)]
pub struct InMemoryStore {
	ints: std::sync::Mutex<std::collections::HashMap<String, i64>>,
	strings: std::sync::Mutex<std::collections::HashMap<String, String>>,
}
impl InMemoryStore {
	/// Construct an empty store.
	pub fn new() -> Self {
		Self::default()
	}
}
impl KeyValueStore for InMemoryStore {
	fn get_int(&self, key: &str) -> Option<i64> {
		self.ints.lock().unwrap().get(key).copied()
	}

	fn set_int(&self, key: &str, value: i64) {
		self.ints.lock().unwrap().insert(key.to_string(), value);
	}

	fn get_string(&self, key: &str) -> Option<String> {
		self.strings.lock().unwrap().get(key).cloned()
	}

	fn set_string(&self, key: &str, value: &str) {
		self.strings.lock().unwrap().insert(key.to_string(), value.to_string());
	}

	fn delete(&self, key: &str) {
		self.ints.lock().unwrap().remove(key);
		self.strings.lock().unwrap().remove(key);
	}

	fn exists(&self, key: &str) -> bool {
		self.ints.lock().unwrap().contains_key(key) || self.strings.lock().unwrap().contains_key(key)
	}
}

/// A [`KeyValueStore`] backed by a single JSON file, read fully into memory
/// on open and rewritten on every mutation (write-through, per spec.md §5).
///
/// I/O failures are logged and swallowed: the in-memory cache stays
/// authoritative for the remainder of the process lifetime, matching the
/// "persistence failures degrade durability, not progress" contract.
#[derive(Debug)]
pub struct JsonFileStore {
	path: std::path::PathBuf,
	data: std::sync::Mutex<JsonFileData>,
}
#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonFileData {
	#[serde(default)]
	ints: std::collections::HashMap<String, i64>,
	#[serde(default)]
	strings: std::collections::HashMap<String, String>,
}
impl JsonFileStore {
	/// Open (or create) a JSON-backed store at `path`.
	pub fn open(path: impl Into<std::path::PathBuf>) -> Self {
		let path = path.into();
		let data = std::fs::read_to_string(&path)
			.ok()
			.and_then(|raw| serde_json::from_str(&raw).ok())
			.unwrap_or_default();

		Self { path, data: std::sync::Mutex::new(data) }
	}

	fn flush(&self, data: &JsonFileData) {
		match serde_json::to_string_pretty(data) {
			Ok(json) =>
				if let Err(err) = std::fs::write(&self.path, json) {
					tracing::warn!(path = %self.path.display(), error = %err, "failed to persist state to disk");
				},
			Err(err) => tracing::warn!(error = %err, "failed to serialize persisted state"),
		}
	}
}
impl KeyValueStore for JsonFileStore {
	fn get_int(&self, key: &str) -> Option<i64> {
		self.data.lock().unwrap().ints.get(key).copied()
	}

	fn set_int(&self, key: &str, value: i64) {
		let mut data = self.data.lock().unwrap();

		data.ints.insert(key.to_string(), value);
		self.flush(&data);
	}

	fn get_string(&self, key: &str) -> Option<String> {
		self.data.lock().unwrap().strings.get(key).cloned()
	}

	fn set_string(&self, key: &str, value: &str) {
		let mut data = self.data.lock().unwrap();

		data.strings.insert(key.to_string(), value.to_string());
		self.flush(&data);
	}

	fn delete(&self, key: &str) {
		let mut data = self.data.lock().unwrap();

		data.ints.remove(key);
		data.strings.remove(key);
		self.flush(&data);
	}

	fn exists(&self, key: &str) -> bool {
		let data = self.data.lock().unwrap();

		data.ints.contains_key(key) || data.strings.contains_key(key)
	}
}
