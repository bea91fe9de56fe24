//! The `SystemState` consumed interface (spec.md §6).

/// Narrow capability interface over platform/device state the core needs
/// but does not own: the current boot identity, the running OS version,
/// device-policy URL filtering, and build channel.
pub trait SystemState: std::fmt::Debug + Send + Sync {
	/// Opaque identifier for the current boot; changes across every reboot.
	fn boot_id(&self) -> String;
	/// OS version string currently running.
	fn running_os_version(&self) -> String;
	/// Device-policy predicate deciding whether a candidate URL may be used.
	fn hardware_policy_predicate(&self, url: &str) -> bool;
	/// Whether this build is an official (non-developer) build.
	fn is_official_build(&self) -> bool;
}
