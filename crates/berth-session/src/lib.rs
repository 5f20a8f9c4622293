// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle orchestration for berth.
//!
//! A session is one namespace holding the internal workloads (`memory-server`,
//! `session-sidecar`, and for interactive sessions the notebook gateway and
//! server) plus the user services in scope. This crate provides:
//! - Typed, validated session configuration
//! - Pure compilation of configuration into deployments and services
//! - Namespace provisioning, two-wave rollout with cooperative abort,
//!   teardown and the scale-to-zero restart
//! - The busy-kernel query
//! - [`SessionOrchestrator`], tying these to a session identity
//!
//! # Usage
//!
//! ```ignore
//! use berth_session::{NeverAbort, SessionIdentity, SessionOrchestrator};
//!
//! let orchestrator = SessionOrchestrator::new(client, kernels, &config);
//! let identity = SessionIdentity::interactive(uuid);
//! orchestrator.launch(&identity, &session_config, &NeverAbort).await?;
//! ```

pub mod error;
pub mod kernels;
pub mod labels;
pub mod manifests;
pub mod namespace;
pub mod naming;
pub mod orchestrator;
pub mod phase;
pub mod poll;
pub mod restart;
pub mod rollout;
pub mod teardown;
pub mod types;

pub use error::{
	ConfigError, ProvisionError, QueryError, RestartError, RolloutError, SessionError,
	TeardownError,
};
pub use kernels::{HttpKernelQuery, KernelQuery, KernelRecord};
pub use manifests::{ManifestCompiler, WorkloadDescriptor};
pub use namespace::NamespaceProvisioner;
pub use naming::{NamespaceNamer, PrefixNamer};
pub use orchestrator::{LaunchOutcome, SessionGuard, SessionOrchestrator};
pub use phase::SessionPhase;
pub use poll::{AbortSignal, NeverAbort, PollOutcome, PollPolicy};
pub use restart::ServiceRestarter;
pub use rollout::RolloutSequencer;
pub use teardown::TeardownCoordinator;
pub use types::{ImageRef, ServiceSpec, SessionConfig, SessionIdentity, SessionKind};
