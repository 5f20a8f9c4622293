// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Public session operations.

use std::future::Future;
use std::sync::Arc;

use berth_config::OrchestratorConfig;
use berth_k8s::K8sClient;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{RolloutError, SessionError, TeardownError};
use crate::kernels::KernelQuery;
use crate::manifests::ManifestCompiler;
use crate::namespace::NamespaceProvisioner;
use crate::naming::{NamespaceNamer, PrefixNamer};
use crate::phase::{PhaseTracker, SessionPhase};
use crate::poll::AbortSignal;
use crate::restart::ServiceRestarter;
use crate::rollout::RolloutSequencer;
use crate::teardown::TeardownCoordinator;
use crate::types::{SessionConfig, SessionIdentity};

/// How a launch ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
	/// Every deployment reports all replicas available
	Ready,
	/// The abort signal fired during the readiness wait; resources are left
	/// in place
	Aborted,
}

/// Entry point for session lifecycles on one cluster.
pub struct SessionOrchestrator {
	namer: Arc<dyn NamespaceNamer>,
	compiler: ManifestCompiler,
	provisioner: NamespaceProvisioner,
	sequencer: RolloutSequencer,
	teardown: Arc<TeardownCoordinator>,
	restarter: ServiceRestarter,
	kernels: Arc<dyn KernelQuery>,
}

impl SessionOrchestrator {
	pub fn new(
		client: Arc<dyn K8sClient>,
		kernels: Arc<dyn KernelQuery>,
		config: &OrchestratorConfig,
	) -> Self {
		let polling = &config.polling;
		Self {
			namer: Arc::new(PrefixNamer::new(config.workloads.namespace_prefix.clone())),
			compiler: ManifestCompiler::new(config.workloads.clone()),
			provisioner: NamespaceProvisioner::new(Arc::clone(&client), polling),
			sequencer: RolloutSequencer::new(Arc::clone(&client), polling),
			teardown: Arc::new(TeardownCoordinator::new(Arc::clone(&client), polling)),
			restarter: ServiceRestarter::new(client, polling),
			kernels,
		}
	}

	pub fn with_namer(mut self, namer: Arc<dyn NamespaceNamer>) -> Self {
		self.namer = namer;
		self
	}

	pub fn with_compiler(mut self, compiler: ManifestCompiler) -> Self {
		self.compiler = compiler;
		self
	}

	/// Namespace holding the session's resources.
	pub fn namespace_for(&self, identity: &SessionIdentity) -> String {
		self.namer.namespace_for(&identity.uuid)
	}

	/// Start every workload of a session and wait until all are available.
	///
	/// The configuration is compiled before anything is submitted, so a
	/// configuration error leaves the cluster untouched. Later failures leave
	/// whatever was created in place; call [`Self::cleanup_resources`] to
	/// remove it. An abort is reported as [`LaunchOutcome::Aborted`] and also
	/// leaves resources in place.
	#[instrument(skip(self, config, should_abort), fields(session = %identity))]
	pub async fn launch(
		&self,
		identity: &SessionIdentity,
		config: &SessionConfig,
		should_abort: &dyn AbortSignal,
	) -> Result<LaunchOutcome, SessionError> {
		let namespace = self.namespace_for(identity);
		let descriptors = self.compiler.compile(identity, config)?;
		let mut phase = PhaseTracker::new(&namespace, SessionPhase::Absent);

		phase.advance(SessionPhase::NamespaceProvisioning);
		if let Err(e) = self
			.provisioner
			.provision(&namespace, identity, config, true)
			.await
		{
			warn!(namespace = %namespace, phase = %phase.phase(), error = %e, "launch failed");
			phase.advance(SessionPhase::Failed);
			return Err(e.into());
		}
		phase.advance(SessionPhase::NamespaceActive);

		phase.advance(SessionPhase::RollingOut);
		match self
			.sequencer
			.rollout(&namespace, &descriptors, should_abort)
			.await
		{
			Ok(()) => {
				phase.advance(SessionPhase::Ready);
				Ok(LaunchOutcome::Ready)
			}
			Err(RolloutError::Aborted) => {
				phase.advance(SessionPhase::Aborted);
				Ok(LaunchOutcome::Aborted)
			}
			Err(e) => {
				warn!(namespace = %namespace, phase = %phase.phase(), error = %e, "launch failed");
				phase.advance(SessionPhase::Failed);
				Err(e.into())
			}
		}
	}

	/// Delete the session namespace and everything in it.
	#[instrument(skip(self), fields(session = %identity))]
	pub async fn shutdown(
		&self,
		identity: &SessionIdentity,
		wait_for_completion: bool,
	) -> Result<(), SessionError> {
		let namespace = self.namespace_for(identity);
		let mut phase = PhaseTracker::new(&namespace, SessionPhase::Deleting);

		match self
			.teardown
			.teardown(&namespace, wait_for_completion)
			.await
		{
			Ok(()) => {
				if wait_for_completion {
					phase.advance(SessionPhase::Absent);
				}
				Ok(())
			}
			Err(e @ TeardownError::CleanupTimeout { .. }) => {
				phase.advance(SessionPhase::CleanupTimeout);
				Err(e.into())
			}
			Err(e) => {
				phase.advance(SessionPhase::Failed);
				Err(e.into())
			}
		}
	}

	/// Same as [`Self::shutdown`]; removes leftovers of a failed or aborted
	/// launch.
	pub async fn cleanup_resources(
		&self,
		identity: &SessionIdentity,
		wait_for_completion: bool,
	) -> Result<(), SessionError> {
		self.shutdown(identity, wait_for_completion).await
	}

	/// Whether any notebook kernel of the session is executing.
	#[instrument(skip(self), fields(session = %identity))]
	pub async fn has_busy_kernels(&self, identity: &SessionIdentity) -> Result<bool, SessionError> {
		let namespace = self.namespace_for(identity);
		Ok(self.kernels.query_busy(&namespace).await?)
	}

	/// Restart one workload of the session, e.g. to clear `memory-server`.
	#[instrument(skip(self), fields(session = %identity))]
	pub async fn restart_service(
		&self,
		identity: &SessionIdentity,
		service: &str,
		wait_for_readiness: bool,
	) -> Result<(), SessionError> {
		let namespace = self.namespace_for(identity);
		self
			.restarter
			.restart(&namespace, service, wait_for_readiness)
			.await?;
		Ok(())
	}

	/// Launch a noninteractive session whose teardown is tied to the returned
	/// guard.
	///
	/// If the launch fails the session is torn down before the error is
	/// returned. If this future is dropped part way, the teardown is spawned
	/// on the current runtime.
	pub async fn launch_noninteractive(
		&self,
		uuid: Uuid,
		config: &SessionConfig,
		should_abort: &dyn AbortSignal,
	) -> Result<SessionGuard, SessionError> {
		let identity = SessionIdentity::noninteractive(uuid);
		let mut guard = SessionGuard::new(
			identity,
			self.namespace_for(&identity),
			Arc::clone(&self.teardown),
		);

		match self.launch(&identity, config, should_abort).await {
			Ok(outcome) => {
				guard.outcome = outcome;
				Ok(guard)
			}
			Err(e) => {
				if let Err(cleanup) = guard.shutdown(false).await {
					warn!(session = %identity, error = %cleanup, "teardown after failed launch failed");
				}
				Err(e)
			}
		}
	}

	/// Run `body` against a freshly launched noninteractive session and shut
	/// the session down afterwards, whether or not `body` completes.
	///
	/// `body` receives the launch outcome and runs even when the launch was
	/// aborted. A failed teardown after `body` is reported as the error.
	pub async fn with_noninteractive_session<F, Fut, T>(
		&self,
		uuid: Uuid,
		config: &SessionConfig,
		should_abort: &dyn AbortSignal,
		body: F,
	) -> Result<T, SessionError>
	where
		F: FnOnce(LaunchOutcome) -> Fut,
		Fut: Future<Output = T>,
	{
		let guard = self.launch_noninteractive(uuid, config, should_abort).await?;
		let value = body(guard.outcome()).await;
		guard.shutdown(false).await?;
		Ok(value)
	}
}

/// A launched noninteractive session that is torn down when the guard goes
/// away.
///
/// Prefer [`SessionGuard::shutdown`], which reports errors. Dropping the
/// guard spawns a teardown without waiting on the current tokio runtime; with
/// no runtime available the namespace is left in place and a warning logged.
#[must_use = "dropping the guard tears the session down"]
pub struct SessionGuard {
	identity: SessionIdentity,
	namespace: String,
	outcome: LaunchOutcome,
	teardown: Option<Arc<TeardownCoordinator>>,
}

impl SessionGuard {
	fn new(identity: SessionIdentity, namespace: String, teardown: Arc<TeardownCoordinator>) -> Self {
		Self {
			identity,
			namespace,
			outcome: LaunchOutcome::Ready,
			teardown: Some(teardown),
		}
	}

	pub fn identity(&self) -> &SessionIdentity {
		&self.identity
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn outcome(&self) -> LaunchOutcome {
		self.outcome
	}

	/// Tear the session down now.
	pub async fn shutdown(mut self, wait_for_completion: bool) -> Result<(), SessionError> {
		let Some(teardown) = self.teardown.take() else {
			return Ok(());
		};
		teardown
			.teardown(&self.namespace, wait_for_completion)
			.await?;
		Ok(())
	}
}

impl Drop for SessionGuard {
	fn drop(&mut self) {
		let Some(teardown) = self.teardown.take() else {
			return;
		};
		let namespace = std::mem::take(&mut self.namespace);

		match Handle::try_current() {
			Ok(handle) => {
				info!(namespace = %namespace, "session guard dropped, tearing down");
				handle.spawn(async move {
					if let Err(e) = teardown.teardown(&namespace, false).await {
						warn!(namespace = %namespace, error = %e, "teardown of dropped session failed");
					}
				});
			}
			Err(_) => {
				warn!(namespace = %namespace, "no runtime to tear down dropped session");
			}
		}
	}
}
