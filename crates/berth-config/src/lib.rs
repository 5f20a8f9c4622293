// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration for the berth session orchestrator.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`BERTH_*`)
//!
//! # Usage
//!
//! ```ignore
//! use berth_config::load_config;
//!
//! let config = load_config()?;
//! println!("namespace prefix {}", config.workloads.namespace_prefix);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::OrchestratorConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorConfig {
	pub polling: PollingConfig,
	pub workloads: WorkloadsConfig,
	pub kernels: KernelsConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`BERTH_*`)
/// 2. Config file (`/etc/berth/orchestrator.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<OrchestratorConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<OrchestratorConfig, ConfigError> {
	let mut merged = OrchestratorConfigLayer::default();
	merged.merge(EnvSource::new().load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<OrchestratorConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge an arbitrary set of sources in precedence order and resolve.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<OrchestratorConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = OrchestratorConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: OrchestratorConfigLayer) -> Result<OrchestratorConfig, ConfigError> {
	let polling = layer.polling.unwrap_or_default().finalize();
	let workloads = layer.workloads.unwrap_or_default().finalize();
	let kernels = layer.kernels.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_polling(&polling)?;
	validate_workloads(&workloads)?;
	validate_kernels(&kernels)?;

	info!(
		namespace_prefix = %workloads.namespace_prefix,
		namespace_max_attempts = polling.namespace_max_attempts,
		rollout_max_attempts = ?polling.rollout_max_attempts,
		teardown_max_attempts = polling.teardown_max_attempts,
		kernels_timeout_ms = kernels.timeout_ms,
		"Orchestrator configuration loaded"
	);

	Ok(OrchestratorConfig {
		polling,
		workloads,
		kernels,
		logging,
	})
}

fn validate_polling(polling: &PollingConfig) -> Result<(), ConfigError> {
	let intervals = [
		("polling.namespace_interval_ms", polling.namespace_interval_ms),
		("polling.rollout_interval_ms", polling.rollout_interval_ms),
		("polling.teardown_interval_ms", polling.teardown_interval_ms),
		("polling.restart_interval_ms", polling.restart_interval_ms),
	];
	for (key, value) in intervals {
		if value == 0 {
			return Err(ConfigError::Validation(format!("{key} must be non-zero")));
		}
	}

	if polling.namespace_max_attempts == 0 {
		return Err(ConfigError::Validation(
			"polling.namespace_max_attempts must be non-zero".to_string(),
		));
	}
	if polling.teardown_max_attempts == 0 {
		return Err(ConfigError::Validation(
			"polling.teardown_max_attempts must be non-zero".to_string(),
		));
	}

	Ok(())
}

fn validate_workloads(workloads: &WorkloadsConfig) -> Result<(), ConfigError> {
	for (key, image) in workloads.images() {
		if image.trim().is_empty() {
			return Err(ConfigError::Validation(format!(
				"workloads.{key} must not be empty"
			)));
		}
	}

	// The prefix is joined with a UUID (lowercase hex and dashes), so it alone
	// decides whether the namespace name is a valid DNS label.
	let prefix = &workloads.namespace_prefix;
	let valid_prefix = prefix.len() <= 26
		&& prefix
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
		&& !prefix.starts_with('-');
	if !valid_prefix {
		return Err(ConfigError::Validation(format!(
			"workloads.namespace_prefix '{prefix}' cannot form a namespace name"
		)));
	}

	Ok(())
}

fn validate_kernels(kernels: &KernelsConfig) -> Result<(), ConfigError> {
	if !kernels.url_template.contains(NAMESPACE_PLACEHOLDER) {
		return Err(ConfigError::Validation(format!(
			"kernels.url_template must contain {NAMESPACE_PLACEHOLDER}"
		)));
	}
	if kernels.timeout_ms == 0 {
		return Err(ConfigError::Validation(
			"kernels.timeout_ms must be non-zero".to_string(),
		));
	}
	Ok(())
}
