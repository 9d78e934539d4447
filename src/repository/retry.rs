// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use retry::delay::{Exponential, jitter};
use retry::{OperationResult, retry_with_index};
use std::time::Duration;

use crate::error::SyncError;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    fn delays(&self) -> Box<dyn Iterator<Item = Duration>> {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let backoff = Exponential::from_millis_with_factor(base_ms, self.multiplier)
            .take(self.max_attempts.saturating_sub(1));
        if self.jitter {
            Box::new(backoff.map(jitter))
        } else {
            Box::new(backoff)
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempts
    /// run out. The closure receives the zero-based attempt number and
    /// returns `Retry` for transient failures.
    pub fn run<T, F>(&self, operation: F) -> Result<T, SyncError>
    where
        F: FnMut(u64) -> OperationResult<T, SyncError>,
    {
        retry_with_index(self.delays(), operation).map_err(|e| e.error)
    }

    pub fn is_last_attempt(&self, attempt: u64) -> bool {
        attempt + 1 >= self.max_attempts as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(3).run(|attempt| {
            calls.set(calls.get() + 1);
            if attempt < 2 {
                OperationResult::Retry(SyncError::NetworkError("reset".to_string()))
            } else {
                OperationResult::Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(4).run(|_| {
            calls.set(calls.get() + 1);
            OperationResult::Retry(SyncError::NetworkError("timeout".to_string()))
        });

        assert!(matches!(result, Err(SyncError::NetworkError(_))));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_permanent_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5).run(|_| {
            calls.set(calls.get() + 1);
            OperationResult::Err(SyncError::Cache("bad".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_delays_grow_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: false,
        };
        let delays: Vec<_> = policy.delays().collect();

        assert_eq!(delays.len(), 3);
        assert!(delays[0] < delays[1] && delays[1] < delays[2]);
    }

    #[test]
    fn test_last_attempt() {
        let policy = RetryPolicy::immediate(3);
        assert!(!policy.is_last_attempt(1));
        assert!(policy.is_last_attempt(2));
    }
}
