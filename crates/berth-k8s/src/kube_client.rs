// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use kube::{
	api::{Api, DeleteParams, Patch, PatchParams, PostParams},
	Client,
};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{Deployment, Namespace, Service};

/// Production K8s client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self { client }
	}
}

fn is_api_code(err: &kube::Error, code: u16) -> bool {
	matches!(err, kube::Error::Api(resp) if resp.code == code)
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, namespace), fields(name = ?namespace.metadata.name))]
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		let name = namespace.metadata.name.clone().unwrap_or_default();
		match namespaces.create(&PostParams::default(), &namespace).await {
			Ok(ns) => Ok(ns),
			Err(e) if is_api_code(&e, 409) => Err(K8sError::AlreadyExists {
				kind: "Namespace".to_string(),
				name,
			}),
			Err(e) => Err(e.into()),
		}
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.get(name).await {
			Ok(ns) => Ok(ns),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::NamespaceNotFound { name: name.into() }),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.delete(name, &DeleteParams::default()).await {
			Ok(_) => Ok(()),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::NamespaceNotFound { name: name.into() }),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, deployment), fields(name = ?deployment.metadata.name))]
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError> {
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		let name = deployment.metadata.name.clone().unwrap_or_default();
		match deployments.create(&PostParams::default(), &deployment).await {
			Ok(d) => Ok(d),
			Err(e) if is_api_code(&e, 409) => Err(K8sError::AlreadyExists {
				kind: "Deployment".to_string(),
				name,
			}),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::NamespaceNotFound {
				name: namespace.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, K8sError> {
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		match deployments.get_status(name).await {
			Ok(d) => Ok(d),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::DeploymentNotFound {
				namespace: namespace.into(),
				name: name.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn scale_deployment(
		&self,
		name: &str,
		namespace: &str,
		replicas: i32,
	) -> Result<(), K8sError> {
		let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		let patch = serde_json::json!({ "spec": { "replicas": replicas } });
		match deployments
			.patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch))
			.await
		{
			Ok(_) => Ok(()),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::DeploymentNotFound {
				namespace: namespace.into(),
				name: name.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, service), fields(name = ?service.metadata.name))]
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError> {
		let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		let name = service.metadata.name.clone().unwrap_or_default();
		match services.create(&PostParams::default(), &service).await {
			Ok(s) => Ok(s),
			Err(e) if is_api_code(&e, 409) => Err(K8sError::AlreadyExists {
				kind: "Service".to_string(),
				name,
			}),
			Err(e) if is_api_code(&e, 404) => Err(K8sError::NamespaceNotFound {
				name: namespace.into(),
			}),
			Err(e) => Err(e.into()),
		}
	}
}
