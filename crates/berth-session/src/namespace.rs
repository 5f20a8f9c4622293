// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Creation of the session namespace.

use std::sync::Arc;

use berth_config::PollingConfig;
use berth_k8s::{namespace_phase, K8sClient, K8sError, Namespace, ObjectMeta, NAMESPACE_ACTIVE};
use tracing::{info, instrument};

use crate::error::ProvisionError;
use crate::labels::session_labels;
use crate::poll::{poll, NeverAbort, PollOutcome, PollPolicy, Probe};
use crate::types::{SessionConfig, SessionIdentity};

/// Creates session namespaces and waits for them to become usable.
pub struct NamespaceProvisioner {
	client: Arc<dyn K8sClient>,
	policy: PollPolicy,
}

impl NamespaceProvisioner {
	pub fn new(client: Arc<dyn K8sClient>, polling: &PollingConfig) -> Self {
		Self::with_policy(
			client,
			PollPolicy::bounded(polling.namespace_interval(), polling.namespace_max_attempts),
		)
	}

	pub fn with_policy(client: Arc<dyn K8sClient>, policy: PollPolicy) -> Self {
		Self { client, policy }
	}

	/// Create the namespace labelled for the session.
	///
	/// With `wait_ready`, reads its status until it is `Active`. A namespace
	/// that is not visible yet is re-read; any other read failure ends the
	/// wait. A name conflict is returned to the caller as
	/// [`ProvisionError::PlatformRejected`].
	#[instrument(skip(self, identity, config), fields(session = %identity.uuid))]
	pub async fn provision(
		&self,
		namespace: &str,
		identity: &SessionIdentity,
		config: &SessionConfig,
		wait_ready: bool,
	) -> Result<(), ProvisionError> {
		let manifest = Namespace {
			metadata: ObjectMeta {
				name: Some(namespace.to_string()),
				labels: Some(session_labels(identity, config)),
				..Default::default()
			},
			..Default::default()
		};

		info!(namespace = %namespace, "creating session namespace");
		self.client.create_namespace(manifest).await?;

		if !wait_ready {
			return Ok(());
		}

		let client = self.client.as_ref();
		match poll(self.policy, &NeverAbort, move || read_phase(client, namespace)).await? {
			PollOutcome::Ready { attempts, .. } => {
				info!(namespace = %namespace, attempts, "namespace active");
				Ok(())
			}
			PollOutcome::TimedOut { attempts } | PollOutcome::Aborted { attempts } => {
				Err(ProvisionError::Timeout {
					namespace: namespace.to_string(),
					attempts,
				})
			}
		}
	}
}

async fn read_phase(client: &dyn K8sClient, namespace: &str) -> Result<Probe<()>, K8sError> {
	match client.get_namespace(namespace).await {
		Ok(ns) if namespace_phase(&ns) == Some(NAMESPACE_ACTIVE) => Ok(Probe::Ready(())),
		Ok(_) => Ok(Probe::Pending),
		Err(e) if e.is_not_found() => Ok(Probe::Pending),
		Err(e) => Err(e),
	}
}
