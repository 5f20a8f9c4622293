// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Busy-kernel query against the session's notebook server.

use async_trait::async_trait;
use berth_config::KernelsConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::QueryError;

/// Execution state reported by a kernel that is running code.
pub const BUSY: &str = "busy";

/// One kernel as listed by the notebook server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelRecord {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub last_activity: Option<String>,
	#[serde(default)]
	pub execution_state: Option<String>,
	#[serde(default)]
	pub connections: Option<u32>,
}

impl KernelRecord {
	pub fn is_busy(&self) -> bool {
		self.execution_state.as_deref() == Some(BUSY)
	}
}

#[async_trait]
pub trait KernelQuery: Send + Sync {
	/// Whether any kernel in the session is executing. Never retried.
	async fn query_busy(&self, namespace: &str) -> Result<bool, QueryError>;
}

/// [`KernelQuery`] over HTTP.
#[derive(Clone)]
pub struct HttpKernelQuery {
	client: Client,
	config: KernelsConfig,
}

impl HttpKernelQuery {
	pub fn new(config: KernelsConfig) -> Result<Self, reqwest::Error> {
		let client = Client::builder()
			.user_agent(user_agent())
			.timeout(config.timeout())
			.build()?;
		Ok(Self::with_client(client, config))
	}

	pub fn with_client(client: Client, config: KernelsConfig) -> Self {
		Self { client, config }
	}
}

/// Format: `berth/{version}`
pub fn user_agent() -> String {
	format!("berth/{}", env!("CARGO_PKG_VERSION"))
}

#[async_trait]
impl KernelQuery for HttpKernelQuery {
	#[instrument(skip(self))]
	async fn query_busy(&self, namespace: &str) -> Result<bool, QueryError> {
		let url = self.config.url_for(namespace);
		let transport = |source| QueryError::Transport {
			url: url.clone(),
			source,
		};

		let body = self
			.client
			.get(&url)
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(transport)?
			.text()
			.await
			.map_err(transport)?;

		let kernels: Vec<KernelRecord> =
			serde_json::from_str(&body).map_err(|source| QueryError::Parse {
				url: url.clone(),
				source,
			})?;

		let busy = kernels.iter().any(KernelRecord::is_busy);
		debug!(namespace = %namespace, kernels = kernels.len(), busy, "queried kernels");
		Ok(busy)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const KERNELS_PATH: &str = "/session-a/api/kernels";

	async fn query_for(server: &MockServer, timeout_ms: u64) -> HttpKernelQuery {
		let config = KernelsConfig {
			url_template: format!("{}/{{namespace}}/api/kernels", server.uri()),
			timeout_ms,
		};
		HttpKernelQuery::new(config).unwrap()
	}

	async fn serve(server: &MockServer, response: ResponseTemplate) {
		Mock::given(method("GET"))
			.and(path(KERNELS_PATH))
			.respond_with(response)
			.expect(1)
			.mount(server)
			.await;
	}

	#[tokio::test]
	async fn any_busy_kernel_means_busy() {
		let server = MockServer::start().await;
		serve(
			&server,
			ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{
					"id": "3af6f3b9-4358-43b9-b2dd-03b51c4f7881",
					"name": "python3",
					"last_activity": "2021-11-10T09:04:10.508031Z",
					"execution_state": "idle",
					"connections": 2
				},
				{"id": "k2", "name": "python3", "execution_state": "busy", "connections": 1}
			])),
		)
		.await;

		let busy = query_for(&server, 2000).await.query_busy("session-a").await;
		assert!(busy.unwrap());
	}

	#[tokio::test]
	async fn idle_or_empty_is_not_busy() {
		let server = MockServer::start().await;
		serve(
			&server,
			ResponseTemplate::new(200)
				.set_body_json(serde_json::json!([{"id": "k1", "execution_state": "starting"}])),
		)
		.await;
		assert!(!query_for(&server, 2000)
			.await
			.query_busy("session-a")
			.await
			.unwrap());

		let empty = MockServer::start().await;
		serve(&empty, ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).await;
		assert!(!query_for(&empty, 2000)
			.await
			.query_busy("session-a")
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn server_error_is_transport_failure() {
		let server = MockServer::start().await;
		serve(&server, ResponseTemplate::new(500)).await;

		let err = query_for(&server, 2000)
			.await
			.query_busy("session-a")
			.await
			.unwrap_err();
		assert!(matches!(err, QueryError::Transport { ref url, .. } if url.ends_with(KERNELS_PATH)));
	}

	#[tokio::test]
	async fn non_list_body_is_parse_failure() {
		let server = MockServer::start().await;
		serve(
			&server,
			ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "nope"})),
		)
		.await;

		let err = query_for(&server, 2000)
			.await
			.query_busy("session-a")
			.await
			.unwrap_err();
		assert!(matches!(err, QueryError::Parse { .. }));
	}

	#[tokio::test]
	async fn slow_server_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(KERNELS_PATH))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(serde_json::json!([]))
					.set_delay(Duration::from_secs(5)),
			)
			.mount(&server)
			.await;

		let err = query_for(&server, 100)
			.await
			.query_busy("session-a")
			.await
			.unwrap_err();
		assert!(matches!(err, QueryError::Transport { ref source, .. } if source.is_timeout()));
	}

	#[test]
	fn missing_fields_are_tolerated() {
		let record: KernelRecord = serde_json::from_str(r#"{"execution_state": "busy"}"#).unwrap();
		assert!(record.is_busy());
		assert_eq!(record.id, None);
	}
}
