// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{Deployment, Namespace, Service};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the K8s operations needed by the session
/// lifecycle: namespaces, deployments and services.
///
/// Reads that address an absent object must return the matching
/// `*NotFound` variant so callers can tell "not there (yet)" apart from
/// other failures.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a cluster-scoped namespace.
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError>;

	/// Get a namespace by name.
	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError>;

	/// Request deletion of a namespace and everything inside it.
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

	/// Create a deployment in the specified namespace.
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError>;

	/// Get a deployment, including its status, by name.
	async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, K8sError>;

	/// Set the desired replica count through the scale subresource.
	async fn scale_deployment(
		&self,
		name: &str,
		namespace: &str,
		replicas: i32,
	) -> Result<(), K8sError>;

	/// Create a service in the specified namespace.
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError>;
}
