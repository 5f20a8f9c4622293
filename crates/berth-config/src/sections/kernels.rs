// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kernel gateway query configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the session namespace.
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

const DEFAULT_URL_TEMPLATE: &str =
	"http://jupyter-server.{namespace}.svc.cluster.local:8888/jupyter-server/api/kernels";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KernelsConfigLayer {
	pub url_template: Option<String>,
	pub timeout_ms: Option<u64>,
}

impl KernelsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url_template.is_some() {
			self.url_template = other.url_template;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
	}

	pub fn finalize(self) -> KernelsConfig {
		KernelsConfig {
			url_template: self
				.url_template
				.unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
			timeout_ms: self.timeout_ms.unwrap_or(2000),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KernelsConfig {
	/// Kernels endpoint; `{namespace}` is replaced with the session namespace
	pub url_template: String,
	pub timeout_ms: u64,
}

impl KernelsConfig {
	/// Kernels endpoint for a session namespace.
	pub fn url_for(&self, namespace: &str) -> String {
		self.url_template.replace(NAMESPACE_PLACEHOLDER, namespace)
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

impl Default for KernelsConfig {
	fn default() -> Self {
		KernelsConfigLayer::default().finalize()
	}
}
