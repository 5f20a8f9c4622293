// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle phases of a session.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Phase of a session as observed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
	/// No namespace exists
	Absent,
	NamespaceProvisioning,
	NamespaceActive,
	RollingOut,
	/// Every deployment reports all replicas available
	Ready,
	/// Rollout stopped on request; resources are left standing
	Aborted,
	/// An unrecoverable platform or configuration error
	Failed,
	/// Namespace deletion requested
	Deleting,
	/// Namespace still present after the teardown ceiling
	CleanupTimeout,
}

impl SessionPhase {
	/// Whether the lifecycle permits moving from `self` to `next`.
	pub fn can_transition_to(self, next: SessionPhase) -> bool {
		use SessionPhase::*;

		match (self, next) {
			(Absent, NamespaceProvisioning) => true,
			(NamespaceProvisioning, NamespaceActive) => true,
			(NamespaceActive, RollingOut) => true,
			(RollingOut, Ready | Aborted) => true,
			(Deleting, Absent | CleanupTimeout) => true,
			(Absent, _) => false,
			(from, Failed) => from != Failed,
			(_, Deleting) => true,
			_ => false,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SessionPhase::Absent => "absent",
			SessionPhase::NamespaceProvisioning => "namespace_provisioning",
			SessionPhase::NamespaceActive => "namespace_active",
			SessionPhase::RollingOut => "rolling_out",
			SessionPhase::Ready => "ready",
			SessionPhase::Aborted => "aborted",
			SessionPhase::Failed => "failed",
			SessionPhase::Deleting => "deleting",
			SessionPhase::CleanupTimeout => "cleanup_timeout",
		}
	}
}

impl fmt::Display for SessionPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Phase of one lifecycle operation on one namespace, logged as it moves.
#[derive(Debug)]
pub(crate) struct PhaseTracker<'a> {
	namespace: &'a str,
	phase: SessionPhase,
}

impl<'a> PhaseTracker<'a> {
	pub(crate) fn new(namespace: &'a str, phase: SessionPhase) -> Self {
		Self { namespace, phase }
	}

	pub(crate) fn phase(&self) -> SessionPhase {
		self.phase
	}

	/// Move to `next` if the lifecycle allows it.
	pub(crate) fn advance(&mut self, next: SessionPhase) -> bool {
		if !self.phase.can_transition_to(next) {
			warn!(
				namespace = %self.namespace,
				from = %self.phase,
				to = %next,
				"ignoring invalid session phase transition"
			);
			return false;
		}
		info!(namespace = %self.namespace, from = %self.phase, to = %next, "session phase");
		self.phase = next;
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use SessionPhase::*;

	const ALL: [SessionPhase; 9] = [
		Absent,
		NamespaceProvisioning,
		NamespaceActive,
		RollingOut,
		Ready,
		Aborted,
		Failed,
		Deleting,
		CleanupTimeout,
	];

	#[test]
	fn success_path() {
		let path = [Absent, NamespaceProvisioning, NamespaceActive, RollingOut, Ready];
		for pair in path.windows(2) {
			assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
		}
	}

	#[test]
	fn teardown_reachable_from_every_present_phase() {
		for phase in ALL.into_iter().filter(|p| *p != Absent) {
			assert!(phase.can_transition_to(Deleting), "{phase}");
		}
		assert!(!Absent.can_transition_to(Deleting));
		assert!(Deleting.can_transition_to(Absent));
		assert!(Deleting.can_transition_to(CleanupTimeout));
	}

	#[test]
	fn failure_reachable_from_every_present_phase() {
		for phase in ALL.into_iter().filter(|p| !matches!(p, Absent | Failed)) {
			assert!(phase.can_transition_to(Failed), "{phase}");
		}
	}

	#[test]
	fn no_skipping_ahead() {
		assert!(!Absent.can_transition_to(Ready));
		assert!(!NamespaceProvisioning.can_transition_to(RollingOut));
		assert!(!Ready.can_transition_to(RollingOut));
		assert!(!Aborted.can_transition_to(Ready));
	}

	#[test]
	fn tracker_rejects_invalid_moves() {
		let mut tracker = PhaseTracker::new("session-a", Absent);
		assert!(tracker.advance(NamespaceProvisioning));
		assert!(!tracker.advance(Ready));
		assert_eq!(tracker.phase(), NamespaceProvisioning);
	}
}
