// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use uuid::Uuid;

/// Default prefix of session namespaces.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "session-";

/// Maps a session UUID to the name of its namespace.
///
/// Implementations must be pure and injective: the same UUID always yields
/// the same name and two UUIDs never share one.
pub trait NamespaceNamer: Send + Sync {
	fn namespace_for(&self, session: &Uuid) -> String;
}

/// Names namespaces `<prefix><uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixNamer {
	prefix: String,
}

impl PrefixNamer {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}
}

impl Default for PrefixNamer {
	fn default() -> Self {
		Self::new(DEFAULT_NAMESPACE_PREFIX)
	}
}

impl NamespaceNamer for PrefixNamer {
	fn namespace_for(&self, session: &Uuid) -> String {
		format!("{}{}", self.prefix, session.hyphenated())
	}
}
