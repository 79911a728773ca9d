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

//! Message-history stamping.
//!
//! When history recording is enabled, every event is preceded by a
//! `history` entry carrying where the message came from and when it
//! passed each hop. The record is thread-associated: writers stamp the
//! current thread's history, readers repopulate it, and the process-wide
//! accessor is [`MessageHistory::get`]. Timings come from the
//! process-wide [`clock`](crate::clock).

use crate::clock;
use crate::error::WireResult;
use crate::marshal::Marshallable;
use crate::wire::{MappingOut, ValueIn};
use std::cell::RefCell;

/// The reserved event name of the leading history entry.
pub const HISTORY_EVENT: &str = "history";

/// Provenance and timing of a message as it crosses components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHistory {
    source_id: i32,
    source_index: u64,
    timings: Vec<i64>,
}

thread_local! {
    static CURRENT: RefCell<MessageHistory> = RefCell::new(MessageHistory::default());
}

impl MessageHistory {
    /// A history rooted at a source component.
    #[must_use]
    pub fn new(source_id: i32, source_index: u64) -> Self {
        Self {
            source_id,
            source_index,
            timings: Vec::new(),
        }
    }

    /// Identifier of the originating component.
    #[must_use]
    pub fn source_id(&self) -> i32 {
        self.source_id
    }

    /// Document index at the originating component.
    #[must_use]
    pub fn source_index(&self) -> u64 {
        self.source_index
    }

    /// Nanosecond timestamps, one per hop.
    #[must_use]
    pub fn timings(&self) -> &[i64] {
        &self.timings
    }

    /// Appends a hop timing read from the process clock.
    pub fn stamp(&mut self) {
        self.timings.push(clock::now_nanos());
    }

    /// Clears the record back to its defaults.
    pub fn reset(&mut self) {
        self.source_id = 0;
        self.source_index = 0;
        self.timings.clear();
    }

    /// A snapshot of the current thread's history.
    #[must_use]
    pub fn get() -> MessageHistory {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Replaces the current thread's history.
    pub fn set(history: MessageHistory) {
        CURRENT.with(|current| *current.borrow_mut() = history);
    }

    /// Runs `f` against the current thread's history in place.
    pub fn with_current<R>(f: impl FnOnce(&mut MessageHistory) -> R) -> R {
        CURRENT.with(|current| f(&mut current.borrow_mut()))
    }
}

impl Marshallable for MessageHistory {
    fn type_name(&self) -> &'static str {
        "MessageHistory"
    }

    fn write_fields(&self, out: &mut dyn MappingOut) -> WireResult<()> {
        out.field("sourceId")?.write_i32(self.source_id)?;
        out.field("sourceIndex")?.write_i64(self.source_index as i64)?;
        let timings = self.timings.clone();
        out.field("timings")?.write_sequence(&mut |seq| {
            for timing in &timings {
                seq.write_i64(*timing)?;
            }
            Ok(())
        })
    }

    fn read_field(&mut self, name: &str, input: &mut ValueIn) -> WireResult<bool> {
        match name {
            "sourceId" => self.source_id = input.read_i32()?,
            "sourceIndex" => self.source_index = input.read_i64()? as u64,
            "timings" => {
                self.timings.clear();
                let count = input.begin_sequence()?;
                for _ in 0..count {
                    self.timings.push(input.read_i64()?);
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn reset_to_default(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SettableClock;
    use std::sync::Arc;

    #[test]
    fn test_thread_local_accessor() {
        MessageHistory::set(MessageHistory::new(3, 17));
        let history = MessageHistory::get();
        assert_eq!(history.source_id(), 3);
        assert_eq!(history.source_index(), 17);
        MessageHistory::set(MessageHistory::default());
    }

    #[test]
    fn test_stamp_uses_installed_clock() {
        crate::clock::install(Arc::new(SettableClock::new(1_000)));
        let mut history = MessageHistory::new(1, 0);
        history.stamp();
        history.stamp();
        assert_eq!(history.timings(), &[1_000, 2_000]);
        crate::clock::reset();
    }

    #[test]
    fn test_begin_sequence_count_roundtrip() {
        let mut history = MessageHistory::new(2, 5);
        history.timings = vec![10, 20, 30];

        let mut copy = MessageHistory::default();
        let mut input = ValueIn::default();
        input.load_scalar(crate::value::WireValue::Sequence(vec![
            crate::value::WireValue::int(10),
            crate::value::WireValue::int(20),
            crate::value::WireValue::int(30),
        ]));
        assert!(copy.read_field("timings", &mut input).unwrap());
        assert_eq!(copy.timings, history.timings);
    }
}
