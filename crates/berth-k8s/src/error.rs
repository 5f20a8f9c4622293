// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("Namespace not found: {name}")]
	NamespaceNotFound { name: String },

	#[error("Deployment not found: {namespace}/{name}")]
	DeploymentNotFound { namespace: String, name: String },

	#[error("{kind} already exists: {name}")]
	AlreadyExists { kind: String, name: String },
}

impl K8sError {
	/// Whether the platform reported the addressed object as absent.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			K8sError::NamespaceNotFound { .. } | K8sError::DeploymentNotFound { .. }
		)
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}
