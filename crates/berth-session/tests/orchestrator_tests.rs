// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the session orchestrator against the mock cluster.
//!
//! Tests cover:
//! - Interactive and noninteractive launch contents
//! - Cooperative abort through closures and cancellation tokens
//! - Configuration errors leaving the cluster untouched
//! - Shutdown with and without waiting, including absent sessions
//! - Service restart and the busy-kernel query
//! - Scoped noninteractive sessions torn down on return, error and drop

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use berth_config::{OrchestratorConfig, WorkloadsConfig};
use berth_k8s::{K8sClient, K8sError, MockCall, MockK8sClient};
use berth_session::{
	ConfigError, KernelQuery, LaunchOutcome, ManifestCompiler, NamespaceNamer, NeverAbort,
	QueryError, SessionConfig, SessionError, SessionIdentity, SessionOrchestrator,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const SESSION: u128 = 0x5e55_1011;

/// Kernel query answering a fixed value and recording the namespaces asked.
#[derive(Default)]
struct FixedKernels {
	busy: bool,
	asked: Mutex<Vec<String>>,
}

#[async_trait]
impl KernelQuery for FixedKernels {
	async fn query_busy(&self, namespace: &str) -> Result<bool, QueryError> {
		self.asked.lock().unwrap().push(namespace.to_string());
		Ok(self.busy)
	}
}

struct RunNamer;

impl NamespaceNamer for RunNamer {
	fn namespace_for(&self, session: &Uuid) -> String {
		format!("run-{}", session.simple())
	}
}

fn session_config() -> SessionConfig {
	SessionConfig::from_value(serde_json::json!({
		"project_uuid": "project-1",
		"pipeline_uuid": "pipeline-1",
		"project_dir": "/userdir/projects/p1",
		"host_userdir": "/userdir",
		"env_uuid_docker_id_mappings": {"env-1": "registry.local/env-1:7"},
		"services": {
			"svc-a": {
				"name": "svc-a",
				"image": "environment@env-1",
				"scope": ["interactive", "noninteractive"],
				"ports": [8080],
				"binds": {"/data": "/data"}
			},
			"svc-b": {
				"image": "nginx:1.25",
				"scope": ["interactive"],
				"ports": [80]
			}
		}
	}))
	.unwrap()
}

fn single_service_config() -> SessionConfig {
	SessionConfig::from_json(
		r#"{
			"project_uuid": "project-1",
			"pipeline_uuid": "pipeline-1",
			"services": {"svc-a": {"image": "nginx", "scope": ["interactive", "noninteractive"], "ports": [80]}}
		}"#,
	)
	.unwrap()
}

fn orchestrator_with(mock: &MockK8sClient, kernels: Arc<FixedKernels>) -> SessionOrchestrator {
	let client: Arc<dyn K8sClient> = Arc::new(mock.clone());
	SessionOrchestrator::new(client, kernels, &OrchestratorConfig::default())
		.with_compiler(ManifestCompiler::with_env(WorkloadsConfig::default(), BTreeMap::new()))
}

fn orchestrator(mock: &MockK8sClient) -> SessionOrchestrator {
	orchestrator_with(mock, Arc::new(FixedKernels::default()))
}

fn namespace() -> String {
	format!("session-{}", Uuid::from_u128(SESSION))
}

fn deletes(mock: &MockK8sClient) -> usize {
	mock.calls()
		.iter()
		.filter(|c| matches!(c, MockCall::DeleteNamespace(_)))
		.count()
}

// ============================================================================
// Launch
// ============================================================================

#[tokio::test(start_paused = true)]
async fn interactive_launch_runs_internal_and_user_workloads() {
	let mock = MockK8sClient::new()
		.with_namespace_missing_reads(1)
		.with_deployment_unready_reads(1);
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));

	let outcome = orchestrator(&mock)
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap();

	assert_eq!(outcome, LaunchOutcome::Ready);
	let ns = namespace();
	assert!(mock.namespace_exists(&ns));
	assert_eq!(mock.deployment_names(&ns).len(), 5);
	assert_eq!(
		mock.service_names(&ns),
		vec![
			"jupyter-eg".to_string(),
			"jupyter-server".to_string(),
			"session-sidecar".to_string(),
			"svc-a".to_string(),
		]
	);
	assert!(!mock.service_names(&ns).contains(&"memory-server".to_string()));
}

#[tokio::test(start_paused = true)]
async fn noninteractive_launch_skips_notebook_workloads_and_out_of_scope_services() {
	let mock = MockK8sClient::new();
	let identity = SessionIdentity::noninteractive(Uuid::from_u128(SESSION));

	let outcome = orchestrator(&mock)
		.launch(&identity, &session_config(), &NeverAbort)
		.await
		.unwrap();

	assert_eq!(outcome, LaunchOutcome::Ready);
	let deployments = mock.deployment_names(&namespace());
	assert_eq!(
		deployments,
		vec![
			"memory-server".to_string(),
			"session-sidecar".to_string(),
			"svc-a".to_string(),
		]
	);
}

#[tokio::test(start_paused = true)]
async fn immediate_abort_returns_aborted_and_deletes_nothing() {
	let mock = MockK8sClient::new().with_deployment_unready_reads(u32::MAX);
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));

	let outcome = orchestrator(&mock)
		.launch(&identity, &single_service_config(), &|| true)
		.await
		.unwrap();

	assert_eq!(outcome, LaunchOutcome::Aborted);
	assert!(mock.namespace_exists(&namespace()));
	assert_eq!(mock.deployment_names(&namespace()).len(), 5);
	assert_eq!(deletes(&mock), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_token_aborts_a_pending_rollout() {
	let mock = MockK8sClient::new().with_deployment_unready_reads(u32::MAX);
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));
	let token = CancellationToken::new();
	let canceller = token.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_secs(10)).await;
		canceller.cancel();
	});

	let outcome = orchestrator(&mock)
		.launch(&identity, &single_service_config(), &token)
		.await
		.unwrap();

	assert_eq!(outcome, LaunchOutcome::Aborted);
}

#[tokio::test(start_paused = true)]
async fn unresolved_environment_leaves_the_cluster_untouched() {
	let mock = MockK8sClient::new();
	let mut config = session_config();
	config.env_uuid_docker_id_mappings.clear();
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));

	let err = orchestrator(&mock)
		.launch(&identity, &config, &NeverAbort)
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		SessionError::Config(ConfigError::UnresolvedEnvironment(ref id)) if id == "env-1"
	));
	assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn existing_namespace_is_reported_to_the_caller() {
	let mock = MockK8sClient::new();
	mock.seed_namespace(&namespace());
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));

	let err = orchestrator(&mock)
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap_err();

	assert!(matches!(
		err,
		SessionError::Provision(berth_session::ProvisionError::PlatformRejected(
			K8sError::AlreadyExists { .. }
		))
	));
}

#[tokio::test(start_paused = true)]
async fn failed_submission_is_left_for_cleanup() {
	let mock = MockK8sClient::new().with_failing_deployment("svc-a");
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));
	let orchestrator = orchestrator(&mock);

	let err = orchestrator
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap_err();
	assert!(matches!(err, SessionError::Rollout(_)));
	assert_eq!(mock.deployment_names(&namespace()).len(), 4);

	orchestrator.cleanup_resources(&identity, true).await.unwrap();
	assert!(!mock.namespace_exists(&namespace()));
}

#[tokio::test(start_paused = true)]
async fn custom_namer_decides_the_namespace() {
	let mock = MockK8sClient::new();
	let orchestrator = orchestrator(&mock).with_namer(Arc::new(RunNamer));
	let identity = SessionIdentity::noninteractive(Uuid::from_u128(SESSION));

	orchestrator
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap();

	let expected = format!("run-{}", Uuid::from_u128(SESSION).simple());
	assert_eq!(orchestrator.namespace_for(&identity), expected);
	assert!(mock.namespace_exists(&expected));
}

// ============================================================================
// Shutdown, restart, kernels
// ============================================================================

#[tokio::test(start_paused = true)]
async fn shutting_down_an_absent_session_succeeds() {
	let mock = MockK8sClient::new();
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));
	let orchestrator = orchestrator(&mock);

	orchestrator.shutdown(&identity, false).await.unwrap();
	orchestrator.shutdown(&identity, true).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_until_the_namespace_is_gone() {
	let mock = MockK8sClient::new().with_deletion_reads(2);
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));
	let orchestrator = orchestrator(&mock);
	orchestrator
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap();

	orchestrator.shutdown(&identity, true).await.unwrap();

	assert!(!mock.namespace_exists(&namespace()));
	assert!(mock.deployment_names(&namespace()).is_empty());
	assert!(mock.service_names(&namespace()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn restart_scales_to_zero_and_back() {
	let mock = MockK8sClient::new();
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));
	let orchestrator = orchestrator(&mock);
	orchestrator
		.launch(&identity, &single_service_config(), &NeverAbort)
		.await
		.unwrap();

	for wait in [false, true] {
		let before = mock.calls().len();
		orchestrator
			.restart_service(&identity, "memory-server", wait)
			.await
			.unwrap();

		let scales: Vec<i32> = mock.calls()[before..]
			.iter()
			.filter_map(|c| match c {
				MockCall::ScaleDeployment { name, replicas, .. } if name == "memory-server" => {
					Some(*replicas)
				}
				_ => None,
			})
			.collect();
		assert_eq!(scales, vec![0, 1], "wait = {wait}");
	}
	assert_eq!(mock.desired_replicas(&namespace(), "memory-server"), Some(1));
}

#[tokio::test]
async fn busy_kernels_are_queried_in_the_session_namespace() {
	let mock = MockK8sClient::new();
	let kernels = Arc::new(FixedKernels {
		busy: true,
		..Default::default()
	});
	let orchestrator = orchestrator_with(&mock, Arc::clone(&kernels));
	let identity = SessionIdentity::interactive(Uuid::from_u128(SESSION));

	assert!(orchestrator.has_busy_kernels(&identity).await.unwrap());
	assert_eq!(*kernels.asked.lock().unwrap(), vec![namespace()]);
}

// ============================================================================
// Scoped noninteractive sessions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scoped_session_is_torn_down_after_the_body() {
	let mock = MockK8sClient::new();
	let orchestrator = orchestrator(&mock);
	let observer = mock.clone();
	let ns = namespace();

	let value = orchestrator
		.with_noninteractive_session(
			Uuid::from_u128(SESSION),
			&single_service_config(),
			&NeverAbort,
			|outcome| async move {
				assert_eq!(outcome, LaunchOutcome::Ready);
				assert!(observer.namespace_exists(&ns));
				42
			},
		)
		.await
		.unwrap();

	assert_eq!(value, 42);
	assert_eq!(deletes(&mock), 1);
	assert!(!mock.namespace_exists(&namespace()));
}

#[tokio::test(start_paused = true)]
async fn scoped_session_is_torn_down_when_launch_fails() {
	let mock = MockK8sClient::new().with_failing_service("svc-a");
	let orchestrator = orchestrator(&mock);

	let err = orchestrator
		.launch_noninteractive(Uuid::from_u128(SESSION), &single_service_config(), &NeverAbort)
		.await
		.err()
		.unwrap();

	assert!(matches!(err, SessionError::Rollout(_)));
	assert_eq!(deletes(&mock), 1);
	assert!(!mock.namespace_exists(&namespace()));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_guard_spawns_teardown() {
	let mock = MockK8sClient::new();
	let orchestrator = orchestrator(&mock);

	let guard = orchestrator
		.launch_noninteractive(Uuid::from_u128(SESSION), &single_service_config(), &NeverAbort)
		.await
		.unwrap();
	assert_eq!(guard.namespace(), namespace());
	assert!(mock.namespace_exists(&namespace()));

	drop(guard);
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert_eq!(deletes(&mock), 1);
	assert!(!mock.namespace_exists(&namespace()));
}

#[tokio::test(start_paused = true)]
async fn explicit_guard_shutdown_tears_down_once() {
	let mock = MockK8sClient::new();
	let orchestrator = orchestrator(&mock);

	let guard = orchestrator
		.launch_noninteractive(Uuid::from_u128(SESSION), &single_service_config(), &NeverAbort)
		.await
		.unwrap();
	guard.shutdown(true).await.unwrap();
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert_eq!(deletes(&mock), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_pending_launch_tears_the_session_down() {
	let mock = MockK8sClient::new().with_deployment_unready_reads(u32::MAX);
	let orchestrator = orchestrator(&mock);
	let config = single_service_config();

	let pending = orchestrator.launch_noninteractive(Uuid::from_u128(SESSION), &config, &NeverAbort);
	let timed_out = tokio::time::timeout(Duration::from_secs(30), pending).await;
	assert!(timed_out.is_err());
	tokio::time::sleep(Duration::from_millis(10)).await;

	assert_eq!(deletes(&mock), 1);
	assert!(!mock.namespace_exists(&namespace()));
}
