// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Two-wave submission of a session's workloads and the readiness wait.

use std::sync::Arc;

use berth_config::PollingConfig;
use berth_k8s::{K8sClient, K8sError, ReplicaCounts};
use tracing::{debug, info, instrument, warn};

use crate::error::RolloutError;
use crate::manifests::WorkloadDescriptor;
use crate::poll::{poll, AbortSignal, PollOutcome, PollPolicy, Probe};

/// Submits workloads and waits until every deployment is available.
pub struct RolloutSequencer {
	client: Arc<dyn K8sClient>,
	policy: PollPolicy,
}

impl RolloutSequencer {
	pub fn new(client: Arc<dyn K8sClient>, polling: &PollingConfig) -> Self {
		Self::with_policy(
			client,
			PollPolicy {
				interval: polling.rollout_interval(),
				max_attempts: polling.rollout_max_attempts,
			},
		)
	}

	pub fn with_policy(client: Arc<dyn K8sClient>, policy: PollPolicy) -> Self {
		Self { client, policy }
	}

	/// Roll out `descriptors` into `namespace`.
	///
	/// All deployments are created first, then all services, both in
	/// descriptor order. The first failed submission ends the rollout and
	/// leaves earlier submissions in place. Then each deployment is read until
	/// its available replicas match the desired count; `should_abort` is
	/// sampled between reads and stops the wait without deleting anything.
	#[instrument(skip(self, descriptors, should_abort), fields(workloads = descriptors.len()))]
	pub async fn rollout(
		&self,
		namespace: &str,
		descriptors: &[WorkloadDescriptor],
		should_abort: &dyn AbortSignal,
	) -> Result<(), RolloutError> {
		for descriptor in descriptors {
			info!(namespace = %namespace, deployment = %descriptor.name, "creating deployment");
			self
				.client
				.create_deployment(namespace, descriptor.deployment.clone())
				.await
				.map_err(|source| RolloutError::SubmissionFailed {
					kind: "deployment",
					name: descriptor.name.clone(),
					source,
				})?;
		}

		for descriptor in descriptors {
			let Some(service) = &descriptor.service else {
				continue;
			};
			info!(namespace = %namespace, service = %descriptor.name, "creating service");
			self
				.client
				.create_service(namespace, service.clone())
				.await
				.map_err(|source| RolloutError::SubmissionFailed {
					kind: "service",
					name: descriptor.name.clone(),
					source,
				})?;
		}

		for descriptor in descriptors {
			let name = descriptor.name.as_str();
			let client = self.client.as_ref();
			let outcome = poll(self.policy, should_abort, move || {
				read_readiness(client, name, namespace)
			})
			.await?;

			match outcome {
				PollOutcome::Ready { attempts, .. } => {
					debug!(namespace = %namespace, deployment = %name, attempts, "deployment ready");
				}
				PollOutcome::Aborted { attempts } => {
					warn!(namespace = %namespace, deployment = %name, attempts, "rollout aborted");
					return Err(RolloutError::Aborted);
				}
				PollOutcome::TimedOut { attempts } => {
					return Err(RolloutError::ReadinessTimeout {
						deployment: name.to_string(),
						attempts,
					});
				}
			}
		}

		info!(namespace = %namespace, "all deployments ready");
		Ok(())
	}
}

/// Read a deployment and report whether all desired replicas are available.
pub(crate) async fn read_readiness(
	client: &dyn K8sClient,
	name: &str,
	namespace: &str,
) -> Result<Probe<()>, K8sError> {
	let deployment = client.get_deployment(name, namespace).await?;
	let counts = ReplicaCounts::of(&deployment);
	if counts.is_ready() {
		Ok(Probe::Ready(()))
	} else {
		debug!(
			namespace = %namespace,
			deployment = %name,
			desired = counts.desired,
			available = counts.available,
			"waiting for replicas"
		);
		Ok(Probe::Pending)
	}
}
