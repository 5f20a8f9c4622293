// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::OrchestratorConfigLayer;
use crate::sections::{
	KernelsConfigLayer, LogFormat, LoggingConfigLayer, PollingConfigLayer, WorkloadsConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(OrchestratorConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/berth/orchestrator.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(OrchestratorConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: OrchestratorConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: BERTH_<SECTION>_<FIELD>
#[derive(Default)]
pub struct EnvSource {
	overrides: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Read from the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Read from a fixed set of variables instead of the process environment.
	pub fn from_vars(vars: HashMap<String, String>) -> Self {
		Self {
			overrides: Some(vars),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.overrides {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn parsed<T: FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|v| {
			v.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(str::to_string)
				.collect()
		})
	}

	fn load_polling(&self) -> Result<PollingConfigLayer, ConfigError> {
		Ok(PollingConfigLayer {
			namespace_interval_ms: self.parsed("BERTH_POLLING_NAMESPACE_INTERVAL_MS", "u64")?,
			namespace_max_attempts: self.parsed("BERTH_POLLING_NAMESPACE_MAX_ATTEMPTS", "u32")?,
			rollout_interval_ms: self.parsed("BERTH_POLLING_ROLLOUT_INTERVAL_MS", "u64")?,
			rollout_max_attempts: self.parsed("BERTH_POLLING_ROLLOUT_MAX_ATTEMPTS", "u32")?,
			teardown_interval_ms: self.parsed("BERTH_POLLING_TEARDOWN_INTERVAL_MS", "u64")?,
			teardown_max_attempts: self.parsed("BERTH_POLLING_TEARDOWN_MAX_ATTEMPTS", "u32")?,
			restart_interval_ms: self.parsed("BERTH_POLLING_RESTART_INTERVAL_MS", "u64")?,
			restart_max_attempts: self.parsed("BERTH_POLLING_RESTART_MAX_ATTEMPTS", "u32")?,
		})
	}

	fn load_workloads(&self) -> WorkloadsConfigLayer {
		WorkloadsConfigLayer {
			namespace_prefix: self.var("BERTH_WORKLOADS_NAMESPACE_PREFIX"),
			memory_server_image: self.var("BERTH_WORKLOADS_MEMORY_SERVER_IMAGE"),
			session_sidecar_image: self.var("BERTH_WORKLOADS_SESSION_SIDECAR_IMAGE"),
			jupyter_gateway_image: self.var("BERTH_WORKLOADS_JUPYTER_GATEWAY_IMAGE"),
			jupyter_server_image: self.var("BERTH_WORKLOADS_JUPYTER_SERVER_IMAGE"),
			image_pull_policy: self.var("BERTH_WORKLOADS_IMAGE_PULL_POLICY"),
			image_pull_secrets: self.list("BERTH_WORKLOADS_IMAGE_PULL_SECRETS"),
		}
	}

	fn load_kernels(&self) -> Result<KernelsConfigLayer, ConfigError> {
		Ok(KernelsConfigLayer {
			url_template: self.var("BERTH_KERNELS_URL_TEMPLATE"),
			timeout_ms: self.parsed("BERTH_KERNELS_TIMEOUT_MS", "u64")?,
		})
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		let format = match self.var("BERTH_LOG_FORMAT") {
			Some(v) => Some(v.parse::<LogFormat>().map_err(|message| {
				ConfigError::InvalidValue {
					key: "BERTH_LOG_FORMAT".to_string(),
					message,
				}
			})?),
			None => None,
		};
		Ok(LoggingConfigLayer {
			level: self.var("BERTH_LOG_LEVEL"),
			format,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(OrchestratorConfigLayer {
			polling: Some(self.load_polling()?),
			workloads: Some(self.load_workloads()),
			kernels: Some(self.load_kernels()?),
			logging: Some(self.load_logging()?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> EnvSource {
		EnvSource::from_vars(
			pairs
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
		)
	}

	#[test]
	fn precedence_orders_sources() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn env_source_reads_polling_and_lists() {
		let source = env(&[
			("BERTH_POLLING_ROLLOUT_MAX_ATTEMPTS", "600"),
			("BERTH_WORKLOADS_IMAGE_PULL_SECRETS", "ghcr, quay ,"),
			("BERTH_LOG_FORMAT", "json"),
			("BERTH_KERNELS_TIMEOUT_MS", ""),
		]);
		let layer = source.load().unwrap();

		assert_eq!(layer.polling.unwrap().rollout_max_attempts, Some(600));
		assert_eq!(
			layer.workloads.unwrap().image_pull_secrets,
			Some(vec!["ghcr".to_string(), "quay".to_string()])
		);
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
		assert_eq!(layer.kernels.unwrap().timeout_ms, None);
	}

	#[test]
	fn env_source_rejects_malformed_numbers() {
		let source = env(&[("BERTH_POLLING_NAMESPACE_MAX_ATTEMPTS", "lots")]);
		let err = source.load().unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BERTH_POLLING_NAMESPACE_MAX_ATTEMPTS"));
	}

	#[test]
	fn env_source_rejects_unknown_log_format() {
		let source = env(&[("BERTH_LOG_FORMAT", "xml")]);
		assert!(source.load().is_err());
	}

	#[test]
	fn toml_source_missing_file_is_empty_layer() {
		let dir = tempfile::tempdir().unwrap();
		let source = TomlSource::new(dir.path().join("absent.toml"));
		assert_eq!(source.load().unwrap(), OrchestratorConfigLayer::default());
	}

	#[test]
	fn toml_source_reads_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[workloads]\nnamespace_prefix = \"ci-\"\n\n[polling]\nnamespace_interval_ms = 100"
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.workloads.unwrap().namespace_prefix,
			Some("ci-".to_string())
		);
		assert_eq!(layer.polling.unwrap().namespace_interval_ms, Some(100));
	}

	#[test]
	fn toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[polling\nnamespace_interval_ms = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}
}
