// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deletion of the session namespace.

use std::sync::Arc;

use berth_config::PollingConfig;
use berth_k8s::{K8sClient, K8sError};
use tracing::{debug, info, instrument};

use crate::error::TeardownError;
use crate::poll::{poll, NeverAbort, PollOutcome, PollPolicy, Probe};

/// Deletes session namespaces, optionally waiting until they are gone.
pub struct TeardownCoordinator {
	client: Arc<dyn K8sClient>,
	policy: PollPolicy,
}

impl TeardownCoordinator {
	pub fn new(client: Arc<dyn K8sClient>, polling: &PollingConfig) -> Self {
		Self::with_policy(
			client,
			PollPolicy::bounded(polling.teardown_interval(), polling.teardown_max_attempts),
		)
	}

	pub fn with_policy(client: Arc<dyn K8sClient>, policy: PollPolicy) -> Self {
		Self { client, policy }
	}

	/// Request deletion of `namespace`; deleting the namespace cascades to
	/// every workload inside it.
	///
	/// An absent namespace counts as deleted. With `wait_for_completion`,
	/// reads the namespace until the platform reports it not found.
	#[instrument(skip(self))]
	pub async fn teardown(
		&self,
		namespace: &str,
		wait_for_completion: bool,
	) -> Result<(), TeardownError> {
		match self.client.delete_namespace(namespace).await {
			Ok(()) => info!(namespace = %namespace, "namespace deletion requested"),
			Err(e) if e.is_not_found() => {
				debug!(namespace = %namespace, "namespace already absent");
			}
			Err(e) => return Err(e.into()),
		}

		if !wait_for_completion {
			return Ok(());
		}

		let client = self.client.as_ref();
		match poll(self.policy, &NeverAbort, move || read_absence(client, namespace)).await? {
			PollOutcome::Ready { attempts, .. } => {
				info!(namespace = %namespace, attempts, "namespace deleted");
				Ok(())
			}
			PollOutcome::TimedOut { attempts } | PollOutcome::Aborted { attempts } => {
				Err(TeardownError::CleanupTimeout {
					namespace: namespace.to_string(),
					attempts,
				})
			}
		}
	}
}

async fn read_absence(client: &dyn K8sClient, namespace: &str) -> Result<Probe<()>, K8sError> {
	match client.get_namespace(namespace).await {
		Ok(_) => Ok(Probe::Pending),
		Err(e) if e.is_not_found() => Ok(Probe::Ready(())),
		Err(e) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use berth_k8s::{MockCall, MockK8sClient};
	use std::time::Duration;
	use tokio::time::Instant;
	use tokio_test::{assert_err, assert_ok};

	fn coordinator(mock: &MockK8sClient) -> TeardownCoordinator {
		TeardownCoordinator::new(Arc::new(mock.clone()), &PollingConfig::default())
	}

	#[tokio::test(start_paused = true)]
	async fn absent_namespace_is_success() {
		let mock = MockK8sClient::new();
		assert_ok!(coordinator(&mock).teardown("session-gone", false).await);
		assert_ok!(coordinator(&mock).teardown("session-gone", true).await);
	}

	#[tokio::test(start_paused = true)]
	async fn waits_for_namespace_to_disappear() {
		let mock = MockK8sClient::new().with_deletion_reads(3);
		mock.seed_namespace("session-a");
		mock.seed_deployment("session-a", "memory-server", 1);
		let start = Instant::now();

		assert_ok!(coordinator(&mock).teardown("session-a", true).await);

		assert_eq!(start.elapsed(), Duration::from_secs(3));
		assert!(!mock.namespace_exists("session-a"));
		assert!(mock.deployment_names("session-a").is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn without_waiting_returns_after_one_request() {
		let mock = MockK8sClient::new().with_deletion_reads(3);
		mock.seed_namespace("session-a");

		assert_ok!(coordinator(&mock).teardown("session-a", false).await);

		assert_eq!(mock.calls(), vec![MockCall::DeleteNamespace("session-a".to_string())]);
		assert!(mock.namespace_exists("session-a"));
	}

	#[tokio::test(start_paused = true)]
	async fn lingering_namespace_times_out() {
		let mock = MockK8sClient::new().with_deletion_reads(u32::MAX);
		mock.seed_namespace("session-a");
		let coordinator = TeardownCoordinator::with_policy(
			Arc::new(mock.clone()),
			PollPolicy::bounded(Duration::from_secs(1), 5),
		);

		let err = assert_err!(coordinator.teardown("session-a", true).await);
		assert!(matches!(
			err,
			TeardownError::CleanupTimeout { ref namespace, attempts: 5 } if namespace == "session-a"
		));
	}

	#[tokio::test(start_paused = true)]
	async fn read_errors_are_propagated() {
		let mock = MockK8sClient::new().with_namespace_read_error(K8sError::ApiError {
			message: "etcd unavailable".to_string(),
		});
		mock.seed_namespace("session-a");

		let err = assert_err!(coordinator(&mock).teardown("session-a", true).await);
		assert!(matches!(err, TeardownError::PlatformError(_)));
	}
}
