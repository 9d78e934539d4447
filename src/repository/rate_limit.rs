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

//! Client-side throttling for API repositories: a token bucket caps the
//! request rate and a counting limiter caps requests in flight. Callers
//! block until both allow them through.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::config::RateLimits;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    state: Mutex<BucketState>,
    refill_per_sec: f64,
    capacity: f64,
}

impl TokenBucket {
    /// A bucket refilled at `requests_per_minute` holding at most `burst`
    /// tokens. It starts full.
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self::new_at(requests_per_minute, burst, Instant::now())
    }

    fn new_at(requests_per_minute: u32, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
            refill_per_sec: f64::from(requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take a token if one is available at `now`; otherwise report how long
    /// until the next one.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.lock();

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = state.last_refill.max(now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now()).is_ok()
    }

    /// Block until a token is available.
    pub fn acquire(&self) {
        while let Err(wait) = self.try_acquire_at(Instant::now()) {
            log::trace!("Rate limit reached, waiting {wait:?}");
            thread::sleep(wait);
        }
    }
}

/// Counting semaphore limiting concurrent requests.
pub struct ConcurrencyLimiter {
    in_flight: Mutex<usize>,
    released: Condvar,
    max: usize,
}

/// Held while a request is in flight; releases its slot when dropped.
pub struct Permit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl ConcurrencyLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            in_flight: Mutex::new(0),
            released: Condvar::new(),
            max: max.max(1),
        }
    }

    pub fn acquire(&self) -> Permit<'_> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while *in_flight >= self.max {
            in_flight = self
                .released
                .wait(in_flight)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *in_flight += 1;
        Permit { limiter: self }
    }

    pub fn in_flight(&self) -> usize {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .limiter
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *in_flight = in_flight.saturating_sub(1);
        self.limiter.released.notify_one();
    }
}

/// Per-repository throttle combining both limits.
pub struct RequestThrottle {
    bucket: TokenBucket,
    limiter: ConcurrencyLimiter,
}

impl RequestThrottle {
    pub fn new(limits: &RateLimits) -> Self {
        let burst = u32::try_from(limits.max_concurrency).unwrap_or(u32::MAX);
        Self {
            bucket: TokenBucket::new(limits.requests_per_minute, burst),
            limiter: ConcurrencyLimiter::new(limits.max_concurrency),
        }
    }

    /// Wait for a concurrency slot, then for a rate token.
    pub fn acquire(&self) -> Permit<'_> {
        let permit = self.limiter.acquire();
        self.bucket.acquire();
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_bucket_burst_then_refill() {
        let start = Instant::now();
        // 60 per minute is one token per second
        let bucket = TokenBucket::new_at(60, 2, start);

        assert!(bucket.try_acquire_at(start).is_ok());
        assert!(bucket.try_acquire_at(start).is_ok());

        let wait = bucket.try_acquire_at(start).unwrap_err();
        assert!(wait > Duration::from_millis(900) && wait <= Duration::from_secs(1));

        assert!(bucket.try_acquire_at(start + Duration::from_millis(500)).is_err());
        assert!(bucket.try_acquire_at(start + Duration::from_millis(1000)).is_ok());
    }

    #[test]
    fn test_bucket_does_not_exceed_capacity() {
        let start = Instant::now();
        let bucket = TokenBucket::new_at(600, 3, start);
        let later = start + Duration::from_secs(3600);

        for _ in 0..3 {
            assert!(bucket.try_acquire_at(later).is_ok());
        }
        assert!(bucket.try_acquire_at(later).is_err());
    }

    #[test]
    fn test_acquire_waits_instead_of_failing() {
        // 6000 per minute is one token every 10ms
        let bucket = TokenBucket::new(6000, 1);
        let start = Instant::now();
        bucket.acquire();
        bucket.acquire();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_limiter_caps_in_flight() {
        let limiter = Arc::new(ConcurrencyLimiter::new(2));
        let peak = Arc::new(AtomicUsize::new(0));

        thread::scope(|scope| {
            for _ in 0..6 {
                let limiter = Arc::clone(&limiter);
                let peak = Arc::clone(&peak);
                scope.spawn(move || {
                    let _permit = limiter.acquire();
                    peak.fetch_max(limiter.in_flight(), Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_permit_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(1);
        {
            let _permit = limiter.acquire();
            assert_eq!(limiter.in_flight(), 1);
        }
        assert_eq!(limiter.in_flight(), 0);
        let _again = limiter.acquire();
    }
}
