// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Labels binding cluster objects to their session.

use std::collections::BTreeMap;

use crate::types::{SessionConfig, SessionIdentity};

pub const MANAGED_LABEL: &str = "berth.dev/managed";
pub const SESSION_UUID_LABEL: &str = "berth.dev/session-uuid";
pub const PROJECT_UUID_LABEL: &str = "berth.dev/project-uuid";
pub const PIPELINE_UUID_LABEL: &str = "berth.dev/pipeline-uuid";
pub const SESSION_KIND_LABEL: &str = "berth.dev/session-kind";
pub const APP_LABEL: &str = "app";
const MAX_LABEL_LENGTH: usize = 63;

/// Sanitize a string to be a valid Kubernetes label value.
///
/// K8s label values must:
/// - Be 63 characters or less
/// - Begin and end with an alphanumeric character
/// - Contain only alphanumeric characters, dashes, underscores, and dots
pub fn sanitize_label_value(value: &str) -> String {
	let sanitized: String = value
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
				c
			} else {
				'_'
			}
		})
		.collect();

	let trimmed = sanitized
		.trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
		.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());

	if trimmed.len() > MAX_LABEL_LENGTH {
		trimmed[..MAX_LABEL_LENGTH]
			.trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
			.to_string()
	} else {
		trimmed.to_string()
	}
}

/// Labels every object of a session carries, the namespace included.
pub fn session_labels(identity: &SessionIdentity, config: &SessionConfig) -> BTreeMap<String, String> {
	BTreeMap::from([
		(MANAGED_LABEL.to_string(), "true".to_string()),
		(
			SESSION_UUID_LABEL.to_string(),
			sanitize_label_value(&identity.uuid.to_string()),
		),
		(
			PROJECT_UUID_LABEL.to_string(),
			sanitize_label_value(&config.project_uuid),
		),
		(
			PIPELINE_UUID_LABEL.to_string(),
			sanitize_label_value(&config.pipeline_uuid),
		),
		(
			SESSION_KIND_LABEL.to_string(),
			identity.kind.as_str().to_string(),
		),
	])
}

/// Labels of one workload: the session labels plus `app=<name>`.
pub fn workload_labels(
	identity: &SessionIdentity,
	config: &SessionConfig,
	name: &str,
) -> BTreeMap<String, String> {
	let mut labels = session_labels(identity, config);
	labels.insert(APP_LABEL.to_string(), sanitize_label_value(name));
	labels
}

/// Selector matching the pods of one workload within its session.
pub fn workload_selector(identity: &SessionIdentity, name: &str) -> BTreeMap<String, String> {
	BTreeMap::from([
		(APP_LABEL.to_string(), sanitize_label_value(name)),
		(
			SESSION_UUID_LABEL.to_string(),
			sanitize_label_value(&identity.uuid.to_string()),
		),
	])
}
