// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Disruptive restart of one workload: scale to zero, then back.

use std::sync::Arc;

use berth_config::PollingConfig;
use berth_k8s::{K8sClient, ReplicaCounts};
use tracing::{info, instrument};

use crate::error::RestartError;
use crate::poll::{poll, NeverAbort, PollOutcome, PollPolicy};
use crate::rollout::read_readiness;

/// Restarts a session workload by scaling its deployment to zero and back.
pub struct ServiceRestarter {
	client: Arc<dyn K8sClient>,
	policy: PollPolicy,
}

impl ServiceRestarter {
	pub fn new(client: Arc<dyn K8sClient>, polling: &PollingConfig) -> Self {
		Self::with_policy(
			client,
			PollPolicy {
				interval: polling.restart_interval(),
				max_attempts: polling.restart_max_attempts,
			},
		)
	}

	pub fn with_policy(client: Arc<dyn K8sClient>, policy: PollPolicy) -> Self {
		Self { client, policy }
	}

	/// Restart the deployment named `service` by scaling it to zero replicas
	/// and back to its previous desired count.
	///
	/// The two scale updates are always issued; `wait_for_readiness` only
	/// controls whether availability is polled afterwards.
	#[instrument(skip(self))]
	pub async fn restart(
		&self,
		namespace: &str,
		service: &str,
		wait_for_readiness: bool,
	) -> Result<(), RestartError> {
		let deployment = self.client.get_deployment(service, namespace).await?;
		let replicas = ReplicaCounts::of(&deployment).desired;

		info!(namespace = %namespace, deployment = %service, replicas, "restarting deployment");
		self.client.scale_deployment(service, namespace, 0).await?;
		self
			.client
			.scale_deployment(service, namespace, replicas)
			.await?;

		if !wait_for_readiness {
			return Ok(());
		}

		let client = self.client.as_ref();
		match poll(self.policy, &NeverAbort, move || {
			read_readiness(client, service, namespace)
		})
		.await?
		{
			PollOutcome::Ready { attempts, .. } => {
				info!(namespace = %namespace, deployment = %service, attempts, "deployment ready after restart");
				Ok(())
			}
			PollOutcome::TimedOut { attempts } | PollOutcome::Aborted { attempts } => {
				Err(RestartError::ReadinessTimeout {
					deployment: service.to_string(),
					attempts,
				})
			}
		}
	}
}
