//! Persisted payload state machine for an OS auto-update client.
//!
//! This crate is the core decision logic of an auto-update client: it
//! tracks which server response is currently offered, which URL and attempt
//! the client is on, how long to back off after failures, and how many
//! reboots and rollbacks have happened — all as a pure transform over
//! persisted counters plus a handful of injected capability interfaces
//! (clock, preferences store, device policy, metrics sink). It does not
//! parse server responses, transfer bytes, or verify signatures; those are
//! external collaborators the host wires in.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(feature = "testing")] pub mod testing;

mod accounting;
mod backoff;
mod clock;
mod config;
mod download_source;
mod engine;
mod error;
mod metrics;
mod persisted_store;
mod reboot;
mod response;
mod sequencer;
mod system_state;

mod _prelude {
	pub use std::time::{Duration, Instant};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use serde::{Deserialize, Serialize};

	pub use crate::{Error, Result};
}

pub use crate::{
	accounting::DurationAndBytesAccountant,
	backoff::BackoffPolicy,
	clock::{MonotonicClock, SystemClock, WallClock},
	config::{EngineConfig, EngineConfigBuilder, PersistedKeys},
	download_source::{DownloadSource, SourceCounters},
	engine::PayloadStateMachine,
	error::{Error, Result},
	metrics::{MetricNames, MetricsSink, TracingMetricsSink},
	persisted_store::{InMemoryStore, JsonFileStore, KeyValueStore, PersistedStore},
	reboot::{BootTransition, RebootAndRollbackTracker},
	response::{ResponseTracker, ResponseUrl, SetResponseOutcome, UpdateResponse},
	sequencer::{AttemptSequencer, UpdateFailureAction, UpdateFailureKind},
	system_state::SystemState,
};
#[cfg(feature = "metrics")] pub use crate::metrics::CountingMetricsSink;
#[cfg(feature = "prometheus")] pub use crate::metrics::{install_default_exporter, prometheus_handle};

#[cfg(test)]
mod _test {
	use metrics_util as _;
	use tempfile as _;
	use tracing_subscriber as _;
}
