// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod kernels;
mod logging;
mod polling;
mod workloads;

pub use kernels::{KernelsConfig, KernelsConfigLayer, NAMESPACE_PLACEHOLDER};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use polling::{PollingConfig, PollingConfigLayer};
pub use workloads::{WorkloadsConfig, WorkloadsConfigLayer};
