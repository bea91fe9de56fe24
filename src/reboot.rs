//! Reboot and rollback tracking (spec.md §4.6).
//!
//! Boot identity is supplied by the host through [`SystemState::boot_id`];
//! this module only diffs it against what was last persisted and reacts to
//! the marker file protocol used to detect "did we boot into the version we
//! just installed".

// self
use crate::{_prelude::*, system_state::SystemState};

/// Outcome of comparing the current boot id against the last-seen one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootTransition {
	/// Same boot as last observed; nothing changed.
	SameBoot,
	/// A new boot was observed and a reboot marker was pending, meaning the
	/// update engine expected this reboot.
	BootedIntoUpdate,
	/// A new boot was observed with no pending marker — an unexpected
	/// reboot, most likely a crash or a manual restart.
	UnexpectedReboot,
}

/// Tracks boot-id transitions, the reboot counter, and the rollback version
/// (spec.md §4.6).
#[derive(Debug)]
pub struct RebootAndRollbackTracker {
	previous_boot_id: String,
	num_reboots: u32,
	/// Set by `ExpectRebootInNewVersion`; cleared once the expected reboot is observed.
	expecting_reboot: bool,
	rollback_version: Option<String>,
}
impl RebootAndRollbackTracker {
	/// Restore tracker state from persisted values.
	pub fn restore(
		previous_boot_id: String,
		num_reboots: u32,
		expecting_reboot: bool,
		rollback_version: Option<String>,
	) -> Self {
		Self { previous_boot_id, num_reboots, expecting_reboot, rollback_version }
	}

	/// `UpdateNumReboots`: compare `system.boot_id()` against the last
	/// persisted boot id, incrementing the reboot counter and classifying the
	/// transition whenever the boot id changed.
	#[tracing::instrument(skip(self, system), fields(previous = %self.previous_boot_id))]
	pub fn update_num_reboots(&mut self, system: &dyn SystemState) -> BootTransition {
		let current = system.boot_id();

		if current == self.previous_boot_id {
			return BootTransition::SameBoot;
		}

		self.num_reboots += 1;
		self.previous_boot_id = current;

		if std::mem::take(&mut self.expecting_reboot) {
			tracing::debug!(num_reboots = self.num_reboots, "booted into expected update");

			BootTransition::BootedIntoUpdate
		} else {
			tracing::warn!(num_reboots = self.num_reboots, "unexpected reboot observed");

			BootTransition::UnexpectedReboot
		}
	}

	/// `ExpectRebootInNewVersion`: arm the tracker so the next boot-id change
	/// is classified as an expected update reboot rather than a crash.
	pub fn expect_reboot_in_new_version(&mut self) {
		self.expecting_reboot = true;
	}

	/// Number of reboots observed so far.
	pub fn num_reboots(&self) -> u32 {
		self.num_reboots
	}

	/// Current persisted boot id.
	pub fn previous_boot_id(&self) -> &str {
		&self.previous_boot_id
	}

	/// Whether a reboot is currently expected.
	pub fn is_expecting_reboot(&self) -> bool {
		self.expecting_reboot
	}

	/// `Rollback`: record that the device is rolling back to `version`. This
	/// field survives a powerwash (spec.md §4.1, §6) so the engine can tell
	/// the difference between a fresh rollback and a previously-completed one.
	pub fn rollback(&mut self, version: impl Into<String>) {
		self.rollback_version = Some(version.into());
	}

	/// `ResetRollbackVersion`: clear the rollback marker once it has been
	/// consumed (the device has acknowledged the rollback).
	pub fn reset_rollback_version(&mut self) {
		self.rollback_version = None;
	}

	/// Currently recorded rollback version, if any.
	pub fn rollback_version(&self) -> Option<&str> {
		self.rollback_version.as_deref()
	}
}
