//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Pluggable time source.
//!
//! Message-history timings and default timestamps read the process-wide
//! [`Clock`]. Production uses [`SystemClock`]; deterministic tests install
//! a [`SettableClock`] that starts at a fixed instant and advances by one
//! microsecond per read, so captured output is identical run to run.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time in nanoseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// The current time in nanoseconds.
    fn current_time_nanos(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_time_nanos(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

/// A deterministic clock that self-advances on every read.
///
/// # Examples
///
/// ```rust
/// use tapewire::clock::{Clock, SettableClock};
///
/// let clock = SettableClock::new(1_000_000_000);
/// assert_eq!(clock.current_time_nanos(), 1_000_000_000);
/// assert_eq!(clock.current_time_nanos(), 1_000_001_000);
/// ```
#[derive(Debug)]
pub struct SettableClock {
    nanos: AtomicI64,
    advance_by: i64,
}

impl SettableClock {
    /// A clock starting at `start_nanos`, advancing 1 µs per read.
    #[must_use]
    pub fn new(start_nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(start_nanos),
            advance_by: 1_000,
        }
    }

    /// Overrides the per-read advance.
    #[must_use]
    pub fn advancing_by(mut self, nanos: i64) -> Self {
        self.advance_by = nanos;
        self
    }

    /// Jumps the clock to an absolute instant.
    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for SettableClock {
    fn current_time_nanos(&self) -> i64 {
        self.nanos.fetch_add(self.advance_by, Ordering::SeqCst)
    }
}

static INSTALLED: RwLock<Option<Arc<dyn Clock>>> = RwLock::new(None);

/// Reads the process-wide clock.
#[must_use]
pub fn now_nanos() -> i64 {
    if let Some(clock) = INSTALLED.read().as_ref() {
        return clock.current_time_nanos();
    }
    SystemClock.current_time_nanos()
}

/// Installs a process-wide clock, replacing any previous one.
pub fn install(clock: Arc<dyn Clock>) {
    *INSTALLED.write() = Some(clock);
}

/// Restores the system clock.
pub fn reset() {
    *INSTALLED.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settable_clock_advances_per_read() {
        let clock = SettableClock::new(100).advancing_by(10);
        assert_eq!(clock.current_time_nanos(), 100);
        assert_eq!(clock.current_time_nanos(), 110);
        clock.set(5);
        assert_eq!(clock.current_time_nanos(), 5);
    }

    #[test]
    fn test_system_clock_is_monotone_enough() {
        let a = SystemClock.current_time_nanos();
        let b = SystemClock.current_time_nanos();
        assert!(b >= a);
    }
}
