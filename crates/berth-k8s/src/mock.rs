// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory fake control plane for exercising session lifecycles without a
//! cluster.
//!
//! The mock models the eventual consistency the real API server exposes:
//! namespaces can stay invisible or inactive for a configurable number of
//! reads, deployments report zero available replicas for a configurable
//! number of reads, and deleted namespaces linger in `Terminating` before
//! disappearing together with everything inside them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{
	Deployment, DeploymentSpec, DeploymentStatus, Namespace, NamespaceStatus, ObjectMeta,
	ReplicaCounts, Service, NAMESPACE_ACTIVE, NAMESPACE_TERMINATING,
};

/// Recorded call to the mock K8s client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
	CreateNamespace(String),
	GetNamespace(String),
	DeleteNamespace(String),
	CreateDeployment { namespace: String, name: String },
	GetDeployment { namespace: String, name: String },
	ScaleDeployment { namespace: String, name: String, replicas: i32 },
	CreateService { namespace: String, name: String },
}

/// Scripted platform behaviour.
#[derive(Clone, Debug, Default)]
pub struct MockBehavior {
	/// Reads after creation that answer "not found".
	pub namespace_missing_reads: u32,
	/// Further reads that return the namespace without an `Active` phase.
	pub namespace_pending_reads: u32,
	/// Reads of each deployment (after creation or a scale) that report no
	/// available replicas.
	pub deployment_unready_reads: u32,
	/// Reads after deletion that still return the namespace as terminating.
	pub deletion_reads: u32,
	/// If set, namespace creation fails with this error.
	pub namespace_create_error: Option<K8sError>,
	/// If set, namespace reads fail with this error.
	pub namespace_read_error: Option<K8sError>,
	/// If set, creating the deployment with this name fails.
	pub failing_deployment: Option<String>,
	/// If set, creating the service with this name fails.
	pub failing_service: Option<String>,
}

#[derive(Debug)]
struct MockNamespace {
	namespace: Namespace,
	reads: u32,
	deleting: bool,
	reads_since_delete: u32,
}

#[derive(Debug)]
struct MockDeployment {
	deployment: Deployment,
	reads: u32,
}

#[derive(Debug, Default)]
struct MockState {
	namespaces: BTreeMap<String, MockNamespace>,
	deployments: BTreeMap<(String, String), MockDeployment>,
	services: BTreeMap<(String, String), Service>,
	calls: Vec<MockCall>,
}

impl MockState {
	fn remove_namespace(&mut self, name: &str) {
		self.namespaces.remove(name);
		self.deployments.retain(|(ns, _), _| ns != name);
		self.services.retain(|(ns, _), _| ns != name);
	}

	fn require_namespace(&self, name: &str) -> Result<(), K8sError> {
		match self.namespaces.get(name) {
			Some(ns) if !ns.deleting => Ok(()),
			_ => Err(K8sError::NamespaceNotFound { name: name.into() }),
		}
	}
}

/// Mock K8s client for testing.
#[derive(Clone, Default)]
pub struct MockK8sClient {
	behavior: MockBehavior,
	state: Arc<Mutex<MockState>>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
		self.behavior = behavior;
		self
	}

	pub fn with_namespace_pending_reads(mut self, reads: u32) -> Self {
		self.behavior.namespace_pending_reads = reads;
		self
	}

	pub fn with_namespace_missing_reads(mut self, reads: u32) -> Self {
		self.behavior.namespace_missing_reads = reads;
		self
	}

	pub fn with_deployment_unready_reads(mut self, reads: u32) -> Self {
		self.behavior.deployment_unready_reads = reads;
		self
	}

	pub fn with_deletion_reads(mut self, reads: u32) -> Self {
		self.behavior.deletion_reads = reads;
		self
	}

	pub fn with_failing_deployment(mut self, name: impl Into<String>) -> Self {
		self.behavior.failing_deployment = Some(name.into());
		self
	}

	pub fn with_failing_service(mut self, name: impl Into<String>) -> Self {
		self.behavior.failing_service = Some(name.into());
		self
	}

	pub fn with_namespace_read_error(mut self, err: K8sError) -> Self {
		self.behavior.namespace_read_error = Some(err);
		self
	}

	pub fn with_namespace_create_error(mut self, err: K8sError) -> Self {
		self.behavior.namespace_create_error = Some(err);
		self
	}

	/// Seed an already active namespace.
	pub fn seed_namespace(&self, name: &str) {
		let mut state = self.lock();
		state.namespaces.insert(
			name.to_string(),
			MockNamespace {
				namespace: namespace_with_phase(name, Some(NAMESPACE_ACTIVE)),
				reads: u32::MAX,
				deleting: false,
				reads_since_delete: 0,
			},
		);
	}

	/// Seed a deployment with the given desired replica count; it becomes
	/// available according to `deployment_unready_reads`.
	pub fn seed_deployment(&self, namespace: &str, name: &str, replicas: i32) {
		let deployment = Deployment {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some(namespace.to_string()),
				..Default::default()
			},
			spec: Some(DeploymentSpec {
				replicas: Some(replicas),
				..Default::default()
			}),
			status: None,
		};
		self.lock().deployments.insert(
			(namespace.to_string(), name.to_string()),
			MockDeployment {
				deployment,
				reads: 0,
			},
		);
	}

	/// All calls made so far, in order.
	pub fn calls(&self) -> Vec<MockCall> {
		self.lock().calls.clone()
	}

	/// Whether the namespace currently exists (including while terminating).
	pub fn namespace_exists(&self, name: &str) -> bool {
		self.lock().namespaces.contains_key(name)
	}

	/// Names of deployments in a namespace.
	pub fn deployment_names(&self, namespace: &str) -> Vec<String> {
		self
			.lock()
			.deployments
			.keys()
			.filter(|(ns, _)| ns == namespace)
			.map(|(_, name)| name.clone())
			.collect()
	}

	/// Names of services in a namespace.
	pub fn service_names(&self, namespace: &str) -> Vec<String> {
		self
			.lock()
			.services
			.keys()
			.filter(|(ns, _)| ns == namespace)
			.map(|(_, name)| name.clone())
			.collect()
	}

	/// Current desired replica count of a deployment.
	pub fn desired_replicas(&self, namespace: &str, name: &str) -> Option<i32> {
		self
			.lock()
			.deployments
			.get(&(namespace.to_string(), name.to_string()))
			.map(|d| ReplicaCounts::of(&d.deployment).desired)
	}

	fn lock(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn namespace_with_phase(name: &str, phase: Option<&str>) -> Namespace {
	Namespace {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			..Default::default()
		},
		spec: None,
		status: Some(NamespaceStatus {
			phase: phase.map(str::to_string),
			..Default::default()
		}),
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError> {
		let name = namespace.metadata.name.clone().unwrap_or_default();
		let mut state = self.lock();
		state.calls.push(MockCall::CreateNamespace(name.clone()));

		if let Some(err) = &self.behavior.namespace_create_error {
			return Err(err.clone());
		}
		if state.namespaces.contains_key(&name) {
			return Err(K8sError::AlreadyExists {
				kind: "Namespace".to_string(),
				name,
			});
		}

		let mut stored = namespace;
		stored.status = None;
		state.namespaces.insert(
			name,
			MockNamespace {
				namespace: stored.clone(),
				reads: 0,
				deleting: false,
				reads_since_delete: 0,
			},
		);
		Ok(stored)
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		let mut state = self.lock();
		state.calls.push(MockCall::GetNamespace(name.to_string()));

		if let Some(err) = &self.behavior.namespace_read_error {
			return Err(err.clone());
		}

		let missing = self.behavior.namespace_missing_reads;
		let pending = self.behavior.namespace_pending_reads;
		let deletion_reads = self.behavior.deletion_reads;

		let Some(entry) = state.namespaces.get_mut(name) else {
			return Err(K8sError::NamespaceNotFound { name: name.into() });
		};

		if entry.deleting {
			if entry.reads_since_delete >= deletion_reads {
				state.remove_namespace(name);
				return Err(K8sError::NamespaceNotFound { name: name.into() });
			}
			entry.reads_since_delete += 1;
			let mut ns = entry.namespace.clone();
			ns.status = Some(NamespaceStatus {
				phase: Some(NAMESPACE_TERMINATING.to_string()),
				..Default::default()
			});
			return Ok(ns);
		}

		entry.reads = entry.reads.saturating_add(1);
		if entry.reads <= missing {
			return Err(K8sError::NamespaceNotFound { name: name.into() });
		}
		let phase = if entry.reads <= missing.saturating_add(pending) {
			None
		} else {
			Some(NAMESPACE_ACTIVE.to_string())
		};
		let mut ns = entry.namespace.clone();
		ns.status = Some(NamespaceStatus {
			phase,
			..Default::default()
		});
		Ok(ns)
	}

	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let mut state = self.lock();
		state.calls.push(MockCall::DeleteNamespace(name.to_string()));

		let deletion_reads = self.behavior.deletion_reads;
		match state.namespaces.get_mut(name) {
			None => Err(K8sError::NamespaceNotFound { name: name.into() }),
			Some(entry) => {
				entry.deleting = true;
				if deletion_reads == 0 {
					state.remove_namespace(name);
				}
				Ok(())
			}
		}
	}

	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		let name = deployment.metadata.name.clone().unwrap_or_default();
		let mut state = self.lock();
		state.calls.push(MockCall::CreateDeployment {
			namespace: namespace.to_string(),
			name: name.clone(),
		});

		if self.behavior.failing_deployment.as_deref() == Some(name.as_str()) {
			return Err(K8sError::ApiError {
				message: format!("admission webhook denied deployment {name}"),
			});
		}
		state.require_namespace(namespace)?;
		let key = (namespace.to_string(), name.clone());
		if state.deployments.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Deployment".to_string(),
				name,
			});
		}

		state.deployments.insert(
			key,
			MockDeployment {
				deployment: deployment.clone(),
				reads: 0,
			},
		);
		Ok(deployment)
	}

	async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, K8sError> {
		let mut state = self.lock();
		state.calls.push(MockCall::GetDeployment {
			namespace: namespace.to_string(),
			name: name.to_string(),
		});

		let unready = self.behavior.deployment_unready_reads;
		let Some(entry) = state
			.deployments
			.get_mut(&(namespace.to_string(), name.to_string()))
		else {
			return Err(K8sError::DeploymentNotFound {
				namespace: namespace.into(),
				name: name.into(),
			});
		};

		entry.reads = entry.reads.saturating_add(1);
		let desired = ReplicaCounts::of(&entry.deployment).desired;
		let available = if entry.reads > unready { desired } else { 0 };

		let mut deployment = entry.deployment.clone();
		deployment.status = Some(DeploymentStatus {
			available_replicas: Some(available),
			replicas: Some(desired),
			..Default::default()
		});
		Ok(deployment)
	}

	async fn scale_deployment(
		&self,
		name: &str,
		namespace: &str,
		replicas: i32,
	) -> Result<(), K8sError> {
		let mut state = self.lock();
		state.calls.push(MockCall::ScaleDeployment {
			namespace: namespace.to_string(),
			name: name.to_string(),
			replicas,
		});

		let Some(entry) = state
			.deployments
			.get_mut(&(namespace.to_string(), name.to_string()))
		else {
			return Err(K8sError::DeploymentNotFound {
				namespace: namespace.into(),
				name: name.into(),
			});
		};

		entry
			.deployment
			.spec
			.get_or_insert_with(DeploymentSpec::default)
			.replicas = Some(replicas);
		entry.reads = 0;
		Ok(())
	}

	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		let name = service.metadata.name.clone().unwrap_or_default();
		let mut state = self.lock();
		state.calls.push(MockCall::CreateService {
			namespace: namespace.to_string(),
			name: name.clone(),
		});

		if self.behavior.failing_service.as_deref() == Some(name.as_str()) {
			return Err(K8sError::ApiError {
				message: format!("service {name} rejected"),
			});
		}
		state.require_namespace(namespace)?;
		let key = (namespace.to_string(), name.clone());
		if state.services.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				kind: "Service".to_string(),
				name,
			});
		}

		state.services.insert(key, service.clone());
		Ok(service)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::namespace_phase;
	use tokio_test::{assert_err, assert_ok};

	fn named_namespace(name: &str) -> Namespace {
		Namespace {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[tokio::test]
	async fn namespace_becomes_active_after_scripted_reads() {
		let mock = MockK8sClient::new()
			.with_namespace_missing_reads(1)
			.with_namespace_pending_reads(1);
		assert_ok!(mock.create_namespace(named_namespace("session-a")).await);

		let first = mock.get_namespace("session-a").await;
		assert!(matches!(first, Err(K8sError::NamespaceNotFound { .. })));

		let second = assert_ok!(mock.get_namespace("session-a").await);
		assert_eq!(namespace_phase(&second), None);

		let third = assert_ok!(mock.get_namespace("session-a").await);
		assert_eq!(namespace_phase(&third), Some(NAMESPACE_ACTIVE));
	}

	#[tokio::test]
	async fn duplicate_namespace_is_rejected() {
		let mock = MockK8sClient::new();
		assert_ok!(mock.create_namespace(named_namespace("session-a")).await);
		let err = assert_err!(mock.create_namespace(named_namespace("session-a")).await);
		assert!(matches!(err, K8sError::AlreadyExists { .. }));
	}

	#[tokio::test]
	async fn deletion_cascades_after_terminating_reads() {
		let mock = MockK8sClient::new().with_deletion_reads(1);
		mock.seed_namespace("session-a");
		mock.seed_deployment("session-a", "memory-server", 1);

		assert_ok!(mock.delete_namespace("session-a").await);
		let terminating = assert_ok!(mock.get_namespace("session-a").await);
		assert_eq!(namespace_phase(&terminating), Some(NAMESPACE_TERMINATING));

		let gone = mock.get_namespace("session-a").await;
		assert!(matches!(gone, Err(K8sError::NamespaceNotFound { .. })));
		assert!(mock.deployment_names("session-a").is_empty());
	}

	#[tokio::test]
	async fn deleting_absent_namespace_reports_not_found() {
		let mock = MockK8sClient::new();
		let err = assert_err!(mock.delete_namespace("session-missing").await);
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn deployment_reports_available_after_unready_reads() {
		let mock = MockK8sClient::new().with_deployment_unready_reads(1);
		mock.seed_namespace("session-a");
		mock.seed_deployment("session-a", "memory-server", 2);

		let first = assert_ok!(mock.get_deployment("memory-server", "session-a").await);
		assert!(!ReplicaCounts::of(&first).is_ready());
		let second = assert_ok!(mock.get_deployment("memory-server", "session-a").await);
		assert_eq!(
			ReplicaCounts::of(&second),
			ReplicaCounts {
				desired: 2,
				available: 2
			}
		);
	}

	#[tokio::test]
	async fn scaling_updates_desired_replicas_and_records_call() {
		let mock = MockK8sClient::new();
		mock.seed_namespace("session-a");
		mock.seed_deployment("session-a", "memory-server", 1);

		assert_ok!(mock.scale_deployment("memory-server", "session-a", 0).await);
		assert_eq!(mock.desired_replicas("session-a", "memory-server"), Some(0));
		assert_eq!(
			mock.calls(),
			vec![MockCall::ScaleDeployment {
				namespace: "session-a".to_string(),
				name: "memory-server".to_string(),
				replicas: 0,
			}]
		);
	}

	#[tokio::test]
	async fn creating_in_missing_namespace_fails() {
		let mock = MockK8sClient::new();
		let deployment = Deployment {
			metadata: ObjectMeta {
				name: Some("memory-server".to_string()),
				..Default::default()
			},
			..Default::default()
		};
		let err = assert_err!(mock.create_deployment("session-x", deployment).await);
		assert!(matches!(err, K8sError::NamespaceNotFound { .. }));
	}
}
