// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Internal workload configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_NAMESPACE_PREFIX: &str = "session-";
const DEFAULT_MEMORY_SERVER_IMAGE: &str = "ghcr.io/ghuntley/berth-memory-server:latest";
const DEFAULT_SESSION_SIDECAR_IMAGE: &str = "ghcr.io/ghuntley/berth-session-sidecar:latest";
const DEFAULT_JUPYTER_GATEWAY_IMAGE: &str = "elyra/enterprise-gateway:3.2.3";
const DEFAULT_JUPYTER_SERVER_IMAGE: &str = "jupyter/base-notebook:latest";
const DEFAULT_IMAGE_PULL_POLICY: &str = "IfNotPresent";

/// Workloads configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkloadsConfigLayer {
	pub namespace_prefix: Option<String>,
	pub memory_server_image: Option<String>,
	pub session_sidecar_image: Option<String>,
	pub jupyter_gateway_image: Option<String>,
	pub jupyter_server_image: Option<String>,
	pub image_pull_policy: Option<String>,
	pub image_pull_secrets: Option<Vec<String>>,
}

impl WorkloadsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.namespace_prefix.is_some() {
			self.namespace_prefix = other.namespace_prefix;
		}
		if other.memory_server_image.is_some() {
			self.memory_server_image = other.memory_server_image;
		}
		if other.session_sidecar_image.is_some() {
			self.session_sidecar_image = other.session_sidecar_image;
		}
		if other.jupyter_gateway_image.is_some() {
			self.jupyter_gateway_image = other.jupyter_gateway_image;
		}
		if other.jupyter_server_image.is_some() {
			self.jupyter_server_image = other.jupyter_server_image;
		}
		if other.image_pull_policy.is_some() {
			self.image_pull_policy = other.image_pull_policy;
		}
		if other.image_pull_secrets.is_some() {
			self.image_pull_secrets = other.image_pull_secrets;
		}
	}

	pub fn finalize(self) -> WorkloadsConfig {
		WorkloadsConfig {
			namespace_prefix: self
				.namespace_prefix
				.unwrap_or_else(|| DEFAULT_NAMESPACE_PREFIX.to_string()),
			memory_server_image: self
				.memory_server_image
				.unwrap_or_else(|| DEFAULT_MEMORY_SERVER_IMAGE.to_string()),
			session_sidecar_image: self
				.session_sidecar_image
				.unwrap_or_else(|| DEFAULT_SESSION_SIDECAR_IMAGE.to_string()),
			jupyter_gateway_image: self
				.jupyter_gateway_image
				.unwrap_or_else(|| DEFAULT_JUPYTER_GATEWAY_IMAGE.to_string()),
			jupyter_server_image: self
				.jupyter_server_image
				.unwrap_or_else(|| DEFAULT_JUPYTER_SERVER_IMAGE.to_string()),
			image_pull_policy: self
				.image_pull_policy
				.unwrap_or_else(|| DEFAULT_IMAGE_PULL_POLICY.to_string()),
			image_pull_secrets: self.image_pull_secrets.unwrap_or_default(),
		}
	}
}

/// Workloads configuration (runtime, resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadsConfig {
	/// Prefix joined with the session UUID to name the session namespace
	pub namespace_prefix: String,
	pub memory_server_image: String,
	pub session_sidecar_image: String,
	pub jupyter_gateway_image: String,
	pub jupyter_server_image: String,
	pub image_pull_policy: String,
	/// Image pull secret names for private registries
	pub image_pull_secrets: Vec<String>,
}

impl WorkloadsConfig {
	/// Images of the internal workloads, paired with the config key that
	/// sets them.
	pub fn images(&self) -> [(&'static str, &str); 4] {
		[
			("memory_server_image", &self.memory_server_image),
			("session_sidecar_image", &self.session_sidecar_image),
			("jupyter_gateway_image", &self.jupyter_gateway_image),
			("jupyter_server_image", &self.jupyter_server_image),
		]
	}
}

impl Default for WorkloadsConfig {
	fn default() -> Self {
		WorkloadsConfigLayer::default().finalize()
	}
}
