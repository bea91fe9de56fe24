//! Injected clock capabilities.
//!
//! The core never reads the system clock directly; it consumes narrow
//! capability traits so tests can control time deterministically (spec.md
//! §6: "the core consumes a wall-clock and a monotonic clock through an
//! injected interface").

// self
use crate::_prelude::*;

/// Wall-clock time source, used for persisted instants (backoff expiry,
/// update start/end, the "system updated" marker).
pub trait WallClock: std::fmt::Debug + Send + Sync {
	/// Current wall-clock time.
	fn now(&self) -> DateTime<Utc>;
}

/// Monotonic time source, used for uptime accounting. Unaffected by wall-
/// clock adjustments and does not advance across suspend (spec.md
/// GLOSSARY: "Uptime").
pub trait MonotonicClock: std::fmt::Debug + Send + Sync {
	/// Current monotonic instant.
	fn now(&self) -> Instant;
}

/// Default clock pair backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl WallClock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}
impl MonotonicClock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}
