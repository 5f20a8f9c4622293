// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle error types.

use berth_k8s::K8sError;

/// Errors raised while parsing or compiling a session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// An `environment@<id>` image has no entry in the image mapping
	#[error("No image resolved for environment: {0}")]
	UnresolvedEnvironment(String),

	/// A scope entry is not a session kind
	#[error("Invalid scope: {0} (expected interactive or noninteractive)")]
	InvalidScope(String),

	/// A required field is absent
	#[error("Missing field: {field}")]
	MissingField { field: String },

	/// A service name is not an RFC 1035 label or disagrees with its key
	#[error("Invalid service name: {0}")]
	InvalidServiceName(String),

	/// A user service is named like an internal workload
	#[error("Service name is reserved: {0}")]
	ReservedServiceName(String),

	/// A port outside 1..=65535
	#[error("Invalid port {port} for service {service}")]
	InvalidPort { service: String, port: u16 },

	/// The same port is listed twice for one service
	#[error("Duplicate port {port} for service {service}")]
	DuplicatePort { service: String, port: u16 },

	/// Malformed configuration payload
	#[error("Malformed session configuration: {0}")]
	Json(#[from] serde_json::Error),
}

/// Errors from creating the session namespace.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
	/// Namespace never reported `Active` within the attempt ceiling
	#[error("Namespace {namespace} not active after {attempts} status reads")]
	Timeout { namespace: String, attempts: u32 },

	/// The platform refused the namespace or a status read failed
	#[error("Namespace rejected by platform: {0}")]
	PlatformRejected(#[from] K8sError),
}

/// Errors from submitting workloads and waiting for readiness.
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
	/// Creating a deployment or service failed; earlier submissions are kept
	#[error("Failed to create {kind} {name}: {source}")]
	SubmissionFailed {
		kind: &'static str,
		name: String,
		#[source]
		source: K8sError,
	},

	/// The caller asked to stop while waiting for readiness
	#[error("Rollout aborted")]
	Aborted,

	/// Reading deployment status failed
	#[error("Platform error during rollout: {0}")]
	PlatformError(#[from] K8sError),

	/// A deployment did not become ready within the attempt ceiling
	#[error("Deployment {deployment} not ready after {attempts} status reads")]
	ReadinessTimeout { deployment: String, attempts: u32 },
}

/// Errors from deleting the session namespace.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
	/// Namespace still present after the attempt ceiling
	#[error("Namespace {namespace} still present after {attempts} status reads")]
	CleanupTimeout { namespace: String, attempts: u32 },

	#[error("Platform error during teardown: {0}")]
	PlatformError(#[from] K8sError),
}

/// Errors from the scale-to-zero-and-back restart.
#[derive(Debug, thiserror::Error)]
pub enum RestartError {
	#[error("Platform error during restart: {0}")]
	PlatformError(#[from] K8sError),

	#[error("Deployment {deployment} not ready after {attempts} status reads")]
	ReadinessTimeout { deployment: String, attempts: u32 },
}

/// Errors from the kernel gateway liveness query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
	/// Connection failure, timeout or non-success status
	#[error("Kernel query to {url} failed: {source}")]
	Transport {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	/// Response body was not a list of kernel records
	#[error("Kernel query to {url} returned an unexpected body: {source}")]
	Parse {
		url: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Any failure of a public session operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Provision(#[from] ProvisionError),

	#[error(transparent)]
	Rollout(#[from] RolloutError),

	#[error(transparent)]
	Teardown(#[from] TeardownError),

	#[error(transparent)]
	Restart(#[from] RestartError),

	#[error(transparent)]
	Query(#[from] QueryError),
}
