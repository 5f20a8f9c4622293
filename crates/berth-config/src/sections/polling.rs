// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Polling configuration section.
//!
//! Every wait in the session lifecycle is a status re-check loop with an
//! interval and an attempt ceiling. A ceiling of `0` in a layer means
//! "unbounded" for the loops that allow it (rollout and restart readiness).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PollingConfigLayer {
	pub namespace_interval_ms: Option<u64>,
	pub namespace_max_attempts: Option<u32>,
	pub rollout_interval_ms: Option<u64>,
	pub rollout_max_attempts: Option<u32>,
	pub teardown_interval_ms: Option<u64>,
	pub teardown_max_attempts: Option<u32>,
	pub restart_interval_ms: Option<u64>,
	pub restart_max_attempts: Option<u32>,
}

impl PollingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.namespace_interval_ms.is_some() {
			self.namespace_interval_ms = other.namespace_interval_ms;
		}
		if other.namespace_max_attempts.is_some() {
			self.namespace_max_attempts = other.namespace_max_attempts;
		}
		if other.rollout_interval_ms.is_some() {
			self.rollout_interval_ms = other.rollout_interval_ms;
		}
		if other.rollout_max_attempts.is_some() {
			self.rollout_max_attempts = other.rollout_max_attempts;
		}
		if other.teardown_interval_ms.is_some() {
			self.teardown_interval_ms = other.teardown_interval_ms;
		}
		if other.teardown_max_attempts.is_some() {
			self.teardown_max_attempts = other.teardown_max_attempts;
		}
		if other.restart_interval_ms.is_some() {
			self.restart_interval_ms = other.restart_interval_ms;
		}
		if other.restart_max_attempts.is_some() {
			self.restart_max_attempts = other.restart_max_attempts;
		}
	}

	pub fn finalize(self) -> PollingConfig {
		let defaults = PollingConfig::default();
		PollingConfig {
			namespace_interval_ms: self
				.namespace_interval_ms
				.unwrap_or(defaults.namespace_interval_ms),
			namespace_max_attempts: self
				.namespace_max_attempts
				.unwrap_or(defaults.namespace_max_attempts),
			rollout_interval_ms: self
				.rollout_interval_ms
				.unwrap_or(defaults.rollout_interval_ms),
			rollout_max_attempts: self.rollout_max_attempts.filter(|n| *n > 0),
			teardown_interval_ms: self
				.teardown_interval_ms
				.unwrap_or(defaults.teardown_interval_ms),
			teardown_max_attempts: self
				.teardown_max_attempts
				.unwrap_or(defaults.teardown_max_attempts),
			restart_interval_ms: self
				.restart_interval_ms
				.unwrap_or(defaults.restart_interval_ms),
			restart_max_attempts: self.restart_max_attempts.filter(|n| *n > 0),
		}
	}
}

/// Polling configuration (runtime, resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
	/// Interval between namespace status reads while provisioning
	pub namespace_interval_ms: u64,
	/// Reads before provisioning gives up
	pub namespace_max_attempts: u32,
	/// Interval between deployment status reads during rollout
	pub rollout_interval_ms: u64,
	/// Reads per deployment before rollout gives up; `None` waits forever
	pub rollout_max_attempts: Option<u32>,
	/// Interval between namespace reads while confirming deletion
	pub teardown_interval_ms: u64,
	/// Reads before teardown confirmation gives up
	pub teardown_max_attempts: u32,
	/// Interval between deployment reads after a restart
	pub restart_interval_ms: u64,
	/// Reads before restart readiness gives up; `None` waits forever
	pub restart_max_attempts: Option<u32>,
}

impl PollingConfig {
	pub fn namespace_interval(&self) -> Duration {
		Duration::from_millis(self.namespace_interval_ms)
	}

	pub fn rollout_interval(&self) -> Duration {
		Duration::from_millis(self.rollout_interval_ms)
	}

	pub fn teardown_interval(&self) -> Duration {
		Duration::from_millis(self.teardown_interval_ms)
	}

	pub fn restart_interval(&self) -> Duration {
		Duration::from_millis(self.restart_interval_ms)
	}
}

impl Default for PollingConfig {
	fn default() -> Self {
		Self {
			namespace_interval_ms: 500,
			namespace_max_attempts: 120,
			rollout_interval_ms: 1000,
			rollout_max_attempts: None,
			teardown_interval_ms: 1000,
			teardown_max_attempts: 1000,
			restart_interval_ms: 1000,
			restart_max_attempts: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = PollingConfig::default();
		assert_eq!(config.namespace_interval(), Duration::from_millis(500));
		assert_eq!(config.namespace_max_attempts, 120);
		assert_eq!(config.rollout_interval(), Duration::from_secs(1));
		assert_eq!(config.rollout_max_attempts, None);
		assert_eq!(config.teardown_max_attempts, 1000);
		assert_eq!(config.restart_max_attempts, None);
	}

	#[test]
	fn test_layer_finalize_defaults() {
		let config = PollingConfigLayer::default().finalize();
		assert_eq!(config, PollingConfig::default());
	}

	#[test]
	fn test_zero_ceiling_means_unbounded() {
		let layer = PollingConfigLayer {
			rollout_max_attempts: Some(0),
			restart_max_attempts: Some(30),
			..Default::default()
		};
		let config = layer.finalize();
		assert_eq!(config.rollout_max_attempts, None);
		assert_eq!(config.restart_max_attempts, Some(30));
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = PollingConfigLayer {
			namespace_interval_ms: Some(500),
			teardown_max_attempts: Some(1000),
			..Default::default()
		};
		let overlay = PollingConfigLayer {
			namespace_interval_ms: Some(250),
			rollout_max_attempts: Some(600),
			..Default::default()
		};

		base.merge(overlay);
		assert_eq!(base.namespace_interval_ms, Some(250));
		assert_eq!(base.teardown_max_attempts, Some(1000));
		assert_eq!(base.rollout_max_attempts, Some(600));
	}
}
