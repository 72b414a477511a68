// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Leader-liveness tracking: if no block has been published within the
//! timeout window, the round is considered stalled and the leader queue
//! should rotate. Takes an explicit `now_ms` everywhere instead of reading
//! the clock internally, so the stall/no-stall boundary is a plain value
//! comparison a test can hit exactly.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default liveness timeout: no block published within this window rotates
/// the leader.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Tracks the last time a block was observed and whether the current
/// leader has stalled.
pub struct LivenessController {
    last_block_at_ms: AtomicU64,
    timeout_ms: u64,
}

impl LivenessController {
    /// A controller with the given timeout, considered alive as of `now_ms`.
    pub fn new(timeout_ms: u64, now_ms: u64) -> Self {
        Self { last_block_at_ms: AtomicU64::new(now_ms), timeout_ms }
    }

    /// A controller using [`DEFAULT_TIMEOUT_MS`].
    pub fn with_default_timeout(now_ms: u64) -> Self {
        Self::new(DEFAULT_TIMEOUT_MS, now_ms)
    }

    /// Record that a block was published at `now_ms`, resetting the timer.
    pub fn record_block(&self, now_ms: u64) {
        self.last_block_at_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Whether the leader has gone silent for longer than the timeout, as
    /// observed at `now_ms`.
    pub fn is_stalled(&self, now_ms: u64) -> bool {
        let last = self.last_block_at_ms.load(Ordering::SeqCst);
        now_ms.saturating_sub(last) >= self.timeout_ms
    }

    /// Milliseconds since the last recorded block, as of `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_block_at_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_stalled_before_timeout() {
        let l = LivenessController::new(1_000, 0);
        assert!(!l.is_stalled(999));
    }

    #[test]
    fn stalled_exactly_at_timeout() {
        let l = LivenessController::new(1_000, 0);
        assert!(l.is_stalled(1_000));
    }

    #[test]
    fn record_block_resets_the_timer() {
        let l = LivenessController::new(1_000, 0);
        l.record_block(500);
        assert!(!l.is_stalled(1_400));
        assert!(l.is_stalled(1_500));
    }

    #[test]
    fn elapsed_ms_tracks_last_block() {
        let l = LivenessController::new(1_000, 100);
        assert_eq!(l.elapsed_ms(300), 200);
    }
}
