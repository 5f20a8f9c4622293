// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! berth - session lifecycle orchestrator.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use berth_config::{load_config, load_config_with_file, LogFormat, LoggingConfig};
use berth_k8s::KubeClient;
use berth_session::{
	HttpKernelQuery, LaunchOutcome, SessionConfig, SessionIdentity, SessionKind,
	SessionOrchestrator,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "berth", version, about, long_about = None)]
struct Args {
	/// Path to orchestrator configuration file
	#[arg(short, long, env = "BERTH_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct SessionArg {
	/// Session UUID
	#[arg(long)]
	session: Uuid,

	/// Session kind
	#[arg(long, default_value = "interactive")]
	kind: SessionKind,
}

impl SessionArg {
	fn identity(&self) -> SessionIdentity {
		SessionIdentity::new(self.session, self.kind)
	}
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Launch a session and wait until every workload is available
	Launch {
		#[command(flatten)]
		session: SessionArg,
		/// Session configuration (JSON)
		#[arg(long)]
		spec: PathBuf,
	},
	/// Shut a session down
	Shutdown {
		#[command(flatten)]
		session: SessionArg,
		/// Wait until the namespace is gone
		#[arg(long)]
		wait: bool,
	},
	/// Remove whatever a failed or aborted launch left behind
	Cleanup {
		#[command(flatten)]
		session: SessionArg,
		/// Wait until the namespace is gone
		#[arg(long)]
		wait: bool,
	},
	/// Restart one workload of a session
	Restart {
		#[command(flatten)]
		session: SessionArg,
		/// Workload name, e.g. memory-server
		#[arg(long)]
		service: String,
		/// Return as soon as the scale updates are accepted
		#[arg(long)]
		no_wait: bool,
	},
	/// Report whether any notebook kernel is executing
	Busy {
		#[command(flatten)]
		session: SessionArg,
	},
	/// Run a local command inside the lifetime of a noninteractive session
	Run {
		/// Session UUID
		#[arg(long)]
		session: Uuid,
		/// Session configuration (JSON)
		#[arg(long)]
		spec: PathBuf,
		/// Command and arguments
		#[arg(last = true, required = true)]
		cmd: Vec<String>,
	},
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Text => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

async fn read_session_config(path: &Path) -> Result<SessionConfig> {
	let json = tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("failed to read session configuration {}", path.display()))?;
	SessionConfig::from_json(&json)
		.with_context(|| format!("invalid session configuration {}", path.display()))
}

/// Token cancelled on the first Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
	let token = CancellationToken::new();
	let cancel = token.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("interrupt received, aborting");
			cancel.cancel();
		}
	});
	token
}

fn print_json(value: serde_json::Value) {
	println!("{value}");
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let args = Args::parse();

	let mut config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	if let Some(level) = args.log_level {
		config.logging.level = level;
	}
	if args.json_logs {
		config.logging.format = LogFormat::Json;
	}
	init_tracing(&config.logging);

	let client = Arc::new(
		KubeClient::new()
			.await
			.context("failed to connect to the cluster")?,
	);
	let kernels = Arc::new(
		HttpKernelQuery::new(config.kernels.clone()).context("failed to build HTTP client")?,
	);
	let orchestrator = SessionOrchestrator::new(client, kernels, &config);

	match args.command {
		Command::Launch { session, spec } => {
			let identity = session.identity();
			let session_config = read_session_config(&spec).await?;
			let abort = ctrl_c_token();

			let outcome = orchestrator
				.launch(&identity, &session_config, &abort)
				.await?;
			print_json(serde_json::json!({
				"session": identity.uuid,
				"namespace": orchestrator.namespace_for(&identity),
				"outcome": outcome,
			}));
			if outcome == LaunchOutcome::Aborted {
				return Ok(ExitCode::from(130));
			}
		}
		Command::Shutdown { session, wait } => {
			orchestrator.shutdown(&session.identity(), wait).await?;
		}
		Command::Cleanup { session, wait } => {
			orchestrator
				.cleanup_resources(&session.identity(), wait)
				.await?;
		}
		Command::Restart {
			session,
			service,
			no_wait,
		} => {
			orchestrator
				.restart_service(&session.identity(), &service, !no_wait)
				.await?;
		}
		Command::Busy { session } => {
			let busy = orchestrator.has_busy_kernels(&session.identity()).await?;
			print_json(serde_json::json!({ "busy": busy }));
		}
		Command::Run { session, spec, cmd } => {
			let session_config = read_session_config(&spec).await?;
			let abort = ctrl_c_token();

			let status = orchestrator
				.with_noninteractive_session(session, &session_config, &abort, |outcome| async move {
					if outcome == LaunchOutcome::Aborted {
						return Ok::<_, anyhow::Error>(None);
					}
					let (program, rest) = cmd.split_first().context("empty command")?;
					info!(program = %program, "running command in session");
					let status = tokio::process::Command::new(program)
						.args(rest)
						.status()
						.await
						.with_context(|| format!("failed to run {program}"))?;
					Ok(Some(status))
				})
				.await??;

			return Ok(match status.and_then(|s| s.code()) {
				Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
				None => ExitCode::from(130),
			});
		}
	}

	Ok(ExitCode::SUCCESS)
}
