// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session identity and configuration types.
//!
//! Configuration arrives as loosely shaped JSON where every field is optional
//! on the wire ([`SessionConfigLayer`], [`ServiceSpecLayer`]). Resolving a
//! layer validates it once and yields the typed [`SessionConfig`] that the
//! rest of the crate works with.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::manifests::RESERVED_WORKLOAD_NAMES;

/// Image prefix marking a reference to a built environment image.
pub const ENVIRONMENT_IMAGE_PREFIX: &str = "environment@";

/// Bind source aliasing `<host_userdir>/data`.
pub const DATA_DIR_ALIAS: &str = "/data";

/// Bind source aliasing the project directory.
pub const PROJECT_DIR_ALIAS: &str = "/project-dir";

const MAX_SERVICE_NAME_LENGTH: usize = 63;

/// Kind of session, deciding which workloads take part.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
	/// Notebook session; includes the kernel gateway and notebook server.
	Interactive,
	/// Pipeline run; never includes the notebook workloads.
	Noninteractive,
}

impl SessionKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SessionKind::Interactive => "interactive",
			SessionKind::Noninteractive => "noninteractive",
		}
	}
}

impl fmt::Display for SessionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for SessionKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"interactive" => Ok(SessionKind::Interactive),
			"noninteractive" => Ok(SessionKind::Noninteractive),
			other => Err(ConfigError::InvalidScope(other.to_string())),
		}
	}
}

/// Identity of one session. Maps to exactly one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
	pub uuid: Uuid,
	pub kind: SessionKind,
}

impl SessionIdentity {
	pub fn new(uuid: Uuid, kind: SessionKind) -> Self {
		Self { uuid, kind }
	}

	pub fn interactive(uuid: Uuid) -> Self {
		Self::new(uuid, SessionKind::Interactive)
	}

	pub fn noninteractive(uuid: Uuid) -> Self {
		Self::new(uuid, SessionKind::Noninteractive)
	}
}

impl fmt::Display for SessionIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.uuid, self.kind)
	}
}

/// Image of a user service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
	/// Pulled as given.
	External(String),
	/// Built environment, resolved through the session's image mapping.
	Environment(String),
}

impl ImageRef {
	pub fn parse(image: &str) -> Self {
		match image.strip_prefix(ENVIRONMENT_IMAGE_PREFIX) {
			Some(id) => ImageRef::Environment(id.to_string()),
			None => ImageRef::External(image.to_string()),
		}
	}

	/// Concrete image reference to run.
	pub fn resolve(&self, mappings: &BTreeMap<String, String>) -> Result<String, ConfigError> {
		match self {
			ImageRef::External(image) => Ok(image.clone()),
			ImageRef::Environment(id) => mappings
				.get(id)
				.cloned()
				.ok_or_else(|| ConfigError::UnresolvedEnvironment(id.clone())),
		}
	}
}

/// One user-declared workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
	pub name: String,
	pub image: ImageRef,
	/// Arguments passed to the entrypoint
	pub command: Option<String>,
	/// Overrides the image entrypoint
	pub entrypoint: Option<String>,
	/// Host path (or alias) to container path
	pub binds: BTreeMap<String, String>,
	/// Exposed TCP ports
	pub ports: Vec<u16>,
	pub env_variables: BTreeMap<String, String>,
	/// Names looked up in the user and orchestrator environments
	pub env_variables_inherit: Vec<String>,
	pub scope: BTreeSet<SessionKind>,
}

impl ServiceSpec {
	/// Whether the service takes part in sessions of `kind`.
	pub fn in_scope(&self, kind: SessionKind) -> bool {
		self.scope.contains(&kind)
	}
}

/// Validated description of what a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	pub project_uuid: String,
	pub pipeline_uuid: String,
	pub project_dir: Option<String>,
	pub host_userdir: Option<String>,
	/// Environment id to built image reference
	pub env_uuid_docker_id_mappings: BTreeMap<String, String>,
	pub user_env_variables: BTreeMap<String, String>,
	/// User services in declared order
	pub services: Vec<ServiceSpec>,
}

impl SessionConfig {
	/// Parse and validate a JSON session configuration.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let layer: SessionConfigLayer = serde_json::from_str(json)?;
		layer.resolve()
	}

	/// Parse and validate an already decoded JSON value.
	pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
		let layer: SessionConfigLayer = serde_json::from_value(value)?;
		layer.resolve()
	}

	pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
		self.services.iter().find(|s| s.name == name)
	}

	/// Services taking part in sessions of `kind`, in declared order.
	pub fn services_in_scope(&self, kind: SessionKind) -> impl Iterator<Item = &ServiceSpec> {
		self.services.iter().filter(move |s| s.in_scope(kind))
	}

	/// Expand a bind source into a host path.
	pub fn host_path(&self, source: &str) -> Result<String, ConfigError> {
		match source {
			DATA_DIR_ALIAS => self
				.host_userdir
				.as_deref()
				.map(|dir| format!("{}/data", dir.trim_end_matches('/')))
				.ok_or_else(|| missing("host_userdir")),
			PROJECT_DIR_ALIAS => self
				.project_dir
				.clone()
				.ok_or_else(|| missing("project_dir")),
			other => Ok(other.to_string()),
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		for service in &self.services {
			service.image.resolve(&self.env_uuid_docker_id_mappings)?;
			for source in service.binds.keys() {
				self.host_path(source)?;
			}
		}
		Ok(())
	}
}

/// Wire form of [`SessionConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfigLayer {
	pub project_uuid: Option<String>,
	pub pipeline_uuid: Option<String>,
	pub project_dir: Option<String>,
	pub host_userdir: Option<String>,
	#[serde(default)]
	pub env_uuid_docker_id_mappings: BTreeMap<String, String>,
	#[serde(default)]
	pub user_env_variables: BTreeMap<String, String>,
	#[serde(default, deserialize_with = "ordered_services")]
	pub services: Vec<(String, ServiceSpecLayer)>,
}

impl SessionConfigLayer {
	pub fn resolve(self) -> Result<SessionConfig, ConfigError> {
		let project_uuid = self.project_uuid.ok_or_else(|| missing("project_uuid"))?;
		let pipeline_uuid = self.pipeline_uuid.ok_or_else(|| missing("pipeline_uuid"))?;

		let mut seen = BTreeSet::new();
		let mut services = Vec::with_capacity(self.services.len());
		for (key, layer) in self.services {
			if !seen.insert(key.clone()) {
				return Err(ConfigError::InvalidServiceName(key));
			}
			services.push(layer.resolve(&key)?);
		}

		let config = SessionConfig {
			project_uuid,
			pipeline_uuid,
			project_dir: self.project_dir,
			host_userdir: self.host_userdir,
			env_uuid_docker_id_mappings: self.env_uuid_docker_id_mappings,
			user_env_variables: self.user_env_variables,
			services,
		};
		config.validate()?;
		Ok(config)
	}
}

/// Wire form of [`ServiceSpec`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSpecLayer {
	pub name: Option<String>,
	pub image: Option<String>,
	pub command: Option<String>,
	pub entrypoint: Option<String>,
	#[serde(default)]
	pub binds: BTreeMap<String, String>,
	#[serde(default)]
	pub ports: Vec<u16>,
	#[serde(default)]
	pub env_variables: BTreeMap<String, String>,
	#[serde(default)]
	pub env_variables_inherit: Vec<String>,
	pub scope: Option<Vec<String>>,
}

impl ServiceSpecLayer {
	/// Resolve the service declared under `key`.
	pub fn resolve(self, key: &str) -> Result<ServiceSpec, ConfigError> {
		let name = self.name.unwrap_or_else(|| key.to_string());
		if name != key || !is_service_name(&name) {
			return Err(ConfigError::InvalidServiceName(name));
		}
		if RESERVED_WORKLOAD_NAMES.contains(&name.as_str()) {
			return Err(ConfigError::ReservedServiceName(name));
		}

		let image = self
			.image
			.filter(|i| !i.trim().is_empty())
			.ok_or_else(|| missing(&format!("services.{name}.image")))?;

		let scope = self
			.scope
			.ok_or_else(|| missing(&format!("services.{name}.scope")))?
			.iter()
			.map(|s| s.parse::<SessionKind>())
			.collect::<Result<BTreeSet<_>, _>>()?;

		if let Some(port) = self.ports.iter().copied().find(|p| *p == 0) {
			return Err(ConfigError::InvalidPort {
				service: name,
				port,
			});
		}
		let mut declared = BTreeSet::new();
		if let Some(port) = self.ports.iter().copied().find(|p| !declared.insert(*p)) {
			return Err(ConfigError::DuplicatePort {
				service: name,
				port,
			});
		}

		Ok(ServiceSpec {
			image: ImageRef::parse(&image),
			command: self.command.filter(|c| !c.trim().is_empty()),
			entrypoint: self.entrypoint.filter(|e| !e.trim().is_empty()),
			binds: self.binds,
			ports: self.ports,
			env_variables: self.env_variables,
			env_variables_inherit: self.env_variables_inherit,
			scope,
			name,
		})
	}
}

fn missing(field: &str) -> ConfigError {
	ConfigError::MissingField {
		field: field.to_string(),
	}
}

/// RFC 1123 label: lowercase alphanumerics and dashes, alphanumeric at both
/// ends, at most 63 characters.
pub fn is_dns_label(name: &str) -> bool {
	let bytes = name.as_bytes();
	let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
		return false;
	};
	bytes.len() <= MAX_SERVICE_NAME_LENGTH
		&& (first.is_ascii_lowercase() || first.is_ascii_digit())
		&& (last.is_ascii_lowercase() || last.is_ascii_digit())
		&& bytes
			.iter()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// RFC 1035 label, as required for service names: an RFC 1123 label that
/// starts with a letter.
pub fn is_service_name(name: &str) -> bool {
	name.as_bytes().first().is_some_and(u8::is_ascii_lowercase) && is_dns_label(name)
}

/// Deserialize the `services` object keeping declaration order. A JSON
/// `null` is treated like an absent field.
fn ordered_services<'de, D>(deserializer: D) -> Result<Vec<(String, ServiceSpecLayer)>, D::Error>
where
	D: Deserializer<'de>,
{
	struct OrderedServices;

	impl<'de> Visitor<'de> for OrderedServices {
		type Value = Vec<(String, ServiceSpecLayer)>;

		fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
			f.write_str("a map of service name to service definition")
		}

		fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
			Ok(Vec::new())
		}

		fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
			Ok(Vec::new())
		}

		fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
			let mut services = Vec::with_capacity(map.size_hint().unwrap_or(0));
			while let Some((name, spec)) = map.next_entry::<String, ServiceSpecLayer>()? {
				services.push((name, spec));
			}
			Ok(services)
		}
	}

	deserializer.deserialize_any(OrderedServices)
}
