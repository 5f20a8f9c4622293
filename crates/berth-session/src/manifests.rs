// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compilation of a session configuration into deployments and services.
//!
//! Compilation is pure: the orchestrator environment that services may
//! inherit from is captured once when the compiler is built, so identical
//! inputs always produce identical output.

use std::collections::BTreeMap;

use berth_config::WorkloadsConfig;
use berth_k8s::{
	Container, ContainerPort, Deployment, DeploymentSpec, EnvVar, HostPathVolumeSource,
	IntOrString, LabelSelector, LocalObjectReference, ObjectMeta, PodSpec, PodTemplateSpec,
	Service, ServicePort, ServiceSpec as K8sServiceSpec, Volume, VolumeMount,
};

use crate::error::ConfigError;
use crate::labels::{workload_labels, workload_selector};
use crate::types::{ServiceSpec, SessionConfig, SessionIdentity, SessionKind};

pub const MEMORY_SERVER: &str = "memory-server";
pub const SESSION_SIDECAR: &str = "session-sidecar";
pub const JUPYTER_GATEWAY: &str = "jupyter-eg";
pub const JUPYTER_SERVER: &str = "jupyter-server";

/// Names user services may not take.
pub const RESERVED_WORKLOAD_NAMES: [&str; 4] =
	[MEMORY_SERVER, SESSION_SIDECAR, JUPYTER_GATEWAY, JUPYTER_SERVER];

const JUPYTER_PORT: u16 = 8888;
const SESSION_SIDECAR_PORT: u16 = 1111;
const WORKLOAD_REPLICAS: i32 = 1;

/// One workload of a session: its deployment and, if it is reachable over
/// the network, the service in front of it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadDescriptor {
	pub name: String,
	pub deployment: Deployment,
	pub service: Option<Service>,
}

/// Turns session configuration into workload descriptors.
#[derive(Debug, Clone)]
pub struct ManifestCompiler {
	workloads: WorkloadsConfig,
	env: BTreeMap<String, String>,
}

impl ManifestCompiler {
	/// Compiler inheriting from the current process environment.
	pub fn new(workloads: WorkloadsConfig) -> Self {
		let env = std::env::vars_os()
			.filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
			.collect();
		Self::with_env(workloads, env)
	}

	/// Compiler inheriting from a fixed environment snapshot.
	pub fn with_env(workloads: WorkloadsConfig, env: BTreeMap<String, String>) -> Self {
		Self { workloads, env }
	}

	/// Compile the workloads of a session.
	///
	/// Order: `memory-server` (no service), `session-sidecar` (only with user
	/// services), the notebook gateway and server (interactive only), then
	/// the user services in scope in declared order. Fails without partial
	/// output.
	pub fn compile(
		&self,
		identity: &SessionIdentity,
		config: &SessionConfig,
	) -> Result<Vec<WorkloadDescriptor>, ConfigError> {
		let kind = identity.kind;
		let mut descriptors = vec![self.internal(
			identity,
			config,
			MEMORY_SERVER,
			&self.workloads.memory_server_image,
			BTreeMap::new(),
			&[],
		)];

		if !config.services.is_empty() {
			let in_scope: Vec<&str> = config
				.services_in_scope(kind)
				.map(|s| s.name.as_str())
				.collect();
			descriptors.push(self.internal(
				identity,
				config,
				SESSION_SIDECAR,
				&self.workloads.session_sidecar_image,
				BTreeMap::from([("USER_SERVICES".to_string(), in_scope.join(","))]),
				&[SESSION_SIDECAR_PORT],
			));
		}

		if kind == SessionKind::Interactive {
			descriptors.push(self.internal(
				identity,
				config,
				JUPYTER_GATEWAY,
				&self.workloads.jupyter_gateway_image,
				BTreeMap::new(),
				&[JUPYTER_PORT],
			));
			descriptors.push(self.internal(
				identity,
				config,
				JUPYTER_SERVER,
				&self.workloads.jupyter_server_image,
				BTreeMap::new(),
				&[JUPYTER_PORT],
			));
		}

		for service in config.services_in_scope(kind) {
			descriptors.push(self.user(identity, config, service)?);
		}

		Ok(descriptors)
	}

	fn internal(
		&self,
		identity: &SessionIdentity,
		config: &SessionConfig,
		name: &str,
		image: &str,
		extra_env: BTreeMap<String, String>,
		ports: &[u16],
	) -> WorkloadDescriptor {
		let mut env = BTreeMap::from([
			("SESSION_UUID".to_string(), identity.uuid.to_string()),
			("PROJECT_UUID".to_string(), config.project_uuid.clone()),
			("PIPELINE_UUID".to_string(), config.pipeline_uuid.clone()),
			("SESSION_KIND".to_string(), identity.kind.to_string()),
		]);
		env.extend(extra_env);

		let container = Container {
			name: name.to_string(),
			image: Some(image.to_string()),
			image_pull_policy: Some(self.workloads.image_pull_policy.clone()),
			env: Some(env_vars(env)),
			ports: container_ports(ports),
			..Default::default()
		};

		let service = (!ports.is_empty()).then(|| build_service(identity, config, name, ports));
		WorkloadDescriptor {
			name: name.to_string(),
			deployment: self.build_deployment(identity, config, name, container, Vec::new()),
			service,
		}
	}

	fn user(
		&self,
		identity: &SessionIdentity,
		config: &SessionConfig,
		spec: &ServiceSpec,
	) -> Result<WorkloadDescriptor, ConfigError> {
		let image = spec.image.resolve(&config.env_uuid_docker_id_mappings)?;

		let mut env = spec.env_variables.clone();
		for name in &spec.env_variables_inherit {
			let inherited = config
				.user_env_variables
				.get(name)
				.or_else(|| self.env.get(name));
			if let Some(value) = inherited {
				env.insert(name.clone(), value.clone());
			}
		}

		let mut volumes = Vec::with_capacity(spec.binds.len());
		let mut mounts = Vec::with_capacity(spec.binds.len());
		for (n, (source, target)) in spec.binds.iter().enumerate() {
			let volume_name = format!("bind-{n}");
			volumes.push(Volume {
				name: volume_name.clone(),
				host_path: Some(HostPathVolumeSource {
					path: config.host_path(source)?,
					type_: None,
				}),
				..Default::default()
			});
			mounts.push(VolumeMount {
				name: volume_name,
				mount_path: target.clone(),
				..Default::default()
			});
		}

		let container = Container {
			name: spec.name.clone(),
			image: Some(image),
			image_pull_policy: Some(self.workloads.image_pull_policy.clone()),
			command: spec.entrypoint.as_deref().map(split_words),
			args: spec.command.as_deref().map(split_words),
			env: (!env.is_empty()).then(|| env_vars(env)),
			ports: container_ports(&spec.ports),
			volume_mounts: (!mounts.is_empty()).then_some(mounts),
			..Default::default()
		};

		Ok(WorkloadDescriptor {
			name: spec.name.clone(),
			deployment: self.build_deployment(identity, config, &spec.name, container, volumes),
			service: Some(build_service(identity, config, &spec.name, &spec.ports)),
		})
	}

	fn build_deployment(
		&self,
		identity: &SessionIdentity,
		config: &SessionConfig,
		name: &str,
		container: Container,
		volumes: Vec<Volume>,
	) -> Deployment {
		let labels = workload_labels(identity, config, name);
		let image_pull_secrets = if self.workloads.image_pull_secrets.is_empty() {
			None
		} else {
			Some(
				self
					.workloads
					.image_pull_secrets
					.iter()
					.map(|name| LocalObjectReference { name: name.clone() })
					.collect(),
			)
		};

		Deployment {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				labels: Some(labels.clone()),
				..Default::default()
			},
			spec: Some(DeploymentSpec {
				replicas: Some(WORKLOAD_REPLICAS),
				selector: LabelSelector {
					match_labels: Some(workload_selector(identity, name)),
					..Default::default()
				},
				template: PodTemplateSpec {
					metadata: Some(ObjectMeta {
						labels: Some(labels),
						..Default::default()
					}),
					spec: Some(PodSpec {
						containers: vec![container],
						volumes: (!volumes.is_empty()).then_some(volumes),
						image_pull_secrets,
						..Default::default()
					}),
				},
				..Default::default()
			}),
			status: None,
		}
	}
}

fn build_service(
	identity: &SessionIdentity,
	config: &SessionConfig,
	name: &str,
	ports: &[u16],
) -> Service {
	let service_ports: Vec<ServicePort> = ports
		.iter()
		.map(|port| ServicePort {
			name: Some(format!("port-{port}")),
			port: i32::from(*port),
			target_port: Some(IntOrString::Int(i32::from(*port))),
			protocol: Some("TCP".to_string()),
			..Default::default()
		})
		.collect();

	// A service without ports is only accepted by the API server as headless.
	let cluster_ip = service_ports.is_empty().then(|| "None".to_string());

	Service {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			labels: Some(workload_labels(identity, config, name)),
			..Default::default()
		},
		spec: Some(K8sServiceSpec {
			selector: Some(workload_selector(identity, name)),
			ports: Some(service_ports),
			cluster_ip,
			..Default::default()
		}),
		status: None,
	}
}

fn container_ports(ports: &[u16]) -> Option<Vec<ContainerPort>> {
	if ports.is_empty() {
		return None;
	}
	Some(
		ports
			.iter()
			.map(|port| ContainerPort {
				container_port: i32::from(*port),
				protocol: Some("TCP".to_string()),
				..Default::default()
			})
			.collect(),
	)
}

fn env_vars(env: BTreeMap<String, String>) -> Vec<EnvVar> {
	env.into_iter()
		.map(|(name, value)| EnvVar {
			name,
			value: Some(value),
			value_from: None,
		})
		.collect()
}

fn split_words(s: &str) -> Vec<String> {
	s.split_whitespace().map(str::to_string).collect()
}
