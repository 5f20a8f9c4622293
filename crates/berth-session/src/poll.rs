// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Status re-check loop shared by every wait in the session lifecycle.
//!
//! A loop reads a status through a probe, and between reads checks the
//! attempt ceiling, samples the abort signal and sleeps one interval. Sleeping
//! goes through `tokio::time`, so tests can drive loops with a paused clock.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cooperative abort, sampled between status reads.
pub trait AbortSignal: Send + Sync {
	fn should_abort(&self) -> bool;
}

impl<F> AbortSignal for F
where
	F: Fn() -> bool + Send + Sync,
{
	fn should_abort(&self) -> bool {
		self()
	}
}

impl AbortSignal for CancellationToken {
	fn should_abort(&self) -> bool {
		self.is_cancelled()
	}
}

/// Signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverAbort;

impl AbortSignal for NeverAbort {
	fn should_abort(&self) -> bool {
		false
	}
}

/// Interval and attempt ceiling of one loop. `None` polls until the status
/// converges or the caller aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
	pub interval: Duration,
	pub max_attempts: Option<u32>,
}

impl PollPolicy {
	pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
		Self {
			interval,
			max_attempts: Some(max_attempts),
		}
	}

	pub fn unbounded(interval: Duration) -> Self {
		Self {
			interval,
			max_attempts: None,
		}
	}
}

/// Result of one status read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
	Ready(T),
	Pending,
}

/// How a loop ended, with the number of status reads it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
	Ready { value: T, attempts: u32 },
	TimedOut { attempts: u32 },
	Aborted { attempts: u32 },
}

/// Read through `probe` until it reports ready, the ceiling is reached or
/// `abort` fires. A probe error ends the loop immediately.
pub async fn poll<T, E, F, Fut>(
	policy: PollPolicy,
	abort: &dyn AbortSignal,
	mut probe: F,
) -> Result<PollOutcome<T>, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<Probe<T>, E>>,
{
	let mut attempts: u32 = 0;
	loop {
		attempts = attempts.saturating_add(1);
		if let Probe::Ready(value) = probe().await? {
			return Ok(PollOutcome::Ready { value, attempts });
		}

		if policy.max_attempts.is_some_and(|max| attempts >= max) {
			return Ok(PollOutcome::TimedOut { attempts });
		}
		if abort.should_abort() {
			return Ok(PollOutcome::Aborted { attempts });
		}

		debug!(attempt = attempts, interval_ms = policy.interval.as_millis() as u64, "not ready");
		tokio::time::sleep(policy.interval).await;
	}
}
