// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
pub use k8s_openapi::api::core::v1::{
	Container, ContainerPort, EnvVar, HostPathVolumeSource, LocalObjectReference, Namespace,
	NamespaceStatus, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
pub use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Namespace phase reported once the namespace can hold resources.
pub const NAMESPACE_ACTIVE: &str = "Active";

/// Namespace phase reported while deletion is in progress.
pub const NAMESPACE_TERMINATING: &str = "Terminating";

/// Replica count K8s assumes when a deployment spec leaves it unset.
pub const DEFAULT_REPLICAS: i32 = 1;

/// Read the phase of a namespace, if the platform reported one.
pub fn namespace_phase(namespace: &Namespace) -> Option<&str> {
	namespace.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// Desired and available replica counts of a deployment as read back from
/// the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaCounts {
	pub desired: i32,
	pub available: i32,
}

impl ReplicaCounts {
	/// Extract replica counts from a deployment.
	///
	/// A missing `spec.replicas` counts as [`DEFAULT_REPLICAS`] and a missing
	/// `status.availableReplicas` counts as zero.
	pub fn of(deployment: &Deployment) -> Self {
		let desired = deployment
			.spec
			.as_ref()
			.and_then(|s| s.replicas)
			.unwrap_or(DEFAULT_REPLICAS);
		let available = deployment
			.status
			.as_ref()
			.and_then(|s| s.available_replicas)
			.unwrap_or(0);
		Self { desired, available }
	}

	/// A deployment is ready when every desired replica is available.
	pub fn is_ready(&self) -> bool {
		self.available == self.desired
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn deployment(replicas: Option<i32>, available: Option<i32>) -> Deployment {
		Deployment {
			metadata: ObjectMeta::default(),
			spec: Some(DeploymentSpec {
				replicas,
				..Default::default()
			}),
			status: Some(DeploymentStatus {
				available_replicas: available,
				..Default::default()
			}),
		}
	}

	#[test]
	fn missing_available_counts_as_zero() {
		let counts = ReplicaCounts::of(&deployment(Some(1), None));
		assert_eq!(
			counts,
			ReplicaCounts {
				desired: 1,
				available: 0
			}
		);
		assert!(!counts.is_ready());
	}

	#[test]
	fn missing_replicas_uses_k8s_default() {
		let counts = ReplicaCounts::of(&deployment(None, Some(1)));
		assert_eq!(counts.desired, DEFAULT_REPLICAS);
		assert!(counts.is_ready());
	}

	#[test]
	fn scaled_to_zero_is_ready_without_status() {
		let counts = ReplicaCounts::of(&deployment(Some(0), None));
		assert!(counts.is_ready());
	}

	#[test]
	fn namespace_phase_reads_status() {
		let ns = Namespace {
			status: Some(NamespaceStatus {
				phase: Some(NAMESPACE_ACTIVE.to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		assert_eq!(namespace_phase(&ns), Some(NAMESPACE_ACTIVE));
		assert_eq!(namespace_phase(&Namespace::default()), None);
	}
}
