// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Top-level configuration layer.

use serde::{Deserialize, Serialize};

use crate::sections::{
	KernelsConfigLayer, LoggingConfigLayer, PollingConfigLayer, WorkloadsConfigLayer,
};

/// One source's view of the orchestrator configuration. Sections absent from
/// a source stay `None` and do not override lower-precedence sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfigLayer {
	pub polling: Option<PollingConfigLayer>,
	pub workloads: Option<WorkloadsConfigLayer>,
	pub kernels: Option<KernelsConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T: Default>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(other) = other {
		merge(base.get_or_insert_with(T::default), other);
	}
}

impl OrchestratorConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: OrchestratorConfigLayer) {
		merge_section(&mut self.polling, other.polling, PollingConfigLayer::merge);
		merge_section(&mut self.workloads, other.workloads, WorkloadsConfigLayer::merge);
		merge_section(&mut self.kernels, other.kernels, KernelsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
