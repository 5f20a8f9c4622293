// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s control-plane abstraction for berth sessions.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - An in-memory mock that scripts eventual consistency (`test-support`)
//! - Common types for namespaces, deployments and services

mod client;
mod error;
mod kube_client;
#[cfg(any(test, feature = "test-support"))]
mod mock;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockBehavior, MockCall, MockK8sClient};
pub use types::{
	namespace_phase, Container, ContainerPort, Deployment, DeploymentSpec, DeploymentStatus,
	EnvVar, HostPathVolumeSource, IntOrString, LabelSelector, LocalObjectReference, Namespace,
	NamespaceStatus, ObjectMeta, PodSpec, PodTemplateSpec, ReplicaCounts, Service, ServicePort,
	ServiceSpec, Volume, VolumeMount, DEFAULT_REPLICAS, NAMESPACE_ACTIVE, NAMESPACE_TERMINATING,
};
