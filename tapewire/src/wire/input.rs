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

//! The reading cursor shared by every dialect.
//!
//! Each dialect decodes a document payload into the logical tree once,
//! when the document is opened for reading; [`ValueIn`] then walks that
//! tree. This is what makes unknown binary fields skippable and keeps
//! the tag stream stateless across documents: skipping is dropping a
//! subtree, and nothing survives [`ValueIn::clear`] between documents.

use crate::error::{ProtocolError, WireError, WireResult};
use crate::marshal::{ClassLookup, LongConverter, Marshallable};
use crate::value::{MapKey, WireValue};
use crate::wire::EventKey;
use std::collections::VecDeque;

/// A decoded document payload: an event mapping, or one bare value.
pub(crate) enum DocPayload {
    /// Top-level mapping entries, i.e. the document's events.
    Events(Vec<(MapKey, WireValue)>),
    /// A payload that is a single value with no event keys.
    Scalar(WireValue),
}

/// Reading cursor over the decoded document tree.
///
/// Top-level mapping entries are the document's events, consumed through
/// [`read_event`](ValueIn::read_event); each consumed event pushes its
/// value for the typed `read_*` accessors. A document whose payload is a
/// bare value (no events) is read directly through the accessors.
#[derive(Default)]
pub struct ValueIn {
    events: VecDeque<(MapKey, WireValue)>,
    stack: Vec<WireValue>,
    events_consumed: usize,
}

impl ValueIn {
    /// Loads the cursor with a decoded document payload.
    pub(crate) fn load(&mut self, payload: DocPayload) {
        match payload {
            DocPayload::Events(entries) => self.load_events(entries),
            DocPayload::Scalar(value) => self.load_scalar(value),
        }
    }

    /// Loads the cursor with a document whose payload is a mapping.
    pub(crate) fn load_events(&mut self, entries: Vec<(MapKey, WireValue)>) {
        self.clear();
        self.events = entries.into();
    }

    /// Loads the cursor with a document whose payload is a bare value.
    pub(crate) fn load_scalar(&mut self, value: WireValue) {
        self.clear();
        self.stack.push(value);
    }

    /// Drops everything; called when the document closes.
    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.stack.clear();
        self.events_consumed = 0;
    }

    /// Consumes the next event, staging its value for reading.
    pub fn read_event(&mut self) -> Option<EventKey> {
        let (key, value) = self.events.pop_front()?;
        self.events_consumed += 1;
        self.stack.push(value);
        Some(match key {
            MapKey::Name(name) => EventKey::Name(name),
            MapKey::Id(id) => EventKey::Id(id),
        })
    }

    /// Events not yet consumed in the open document.
    #[must_use]
    pub fn remaining_events(&self) -> usize {
        self.events.len()
    }

    /// Events consumed so far; the parser's progress measure.
    #[must_use]
    pub fn events_consumed(&self) -> usize {
        self.events_consumed
    }

    /// Skips everything left in the document (the field-id fallback).
    pub fn drain(&mut self) {
        self.events_consumed += self.events.len();
        self.events.clear();
        self.stack.clear();
    }

    /// Takes the next pending value as a tree.
    pub fn read_value(&mut self) -> WireResult<WireValue> {
        self.stack.pop().ok_or_else(|| {
            ProtocolError::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            }
            .into()
        })
    }

    /// Discards the next pending value.
    pub fn skip_value(&mut self) -> WireResult<()> {
        self.read_value().map(drop)
    }

    /// `true` while a value is staged for reading.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.stack.is_empty()
    }

    /// `true` when the next staged value is an explicit null.
    #[must_use]
    pub fn next_is_null(&self) -> bool {
        matches!(self.stack.last(), Some(WireValue::Null))
    }

    fn mismatch(expected: &'static str, found: &WireValue) -> WireError {
        ProtocolError::TypeMismatch {
            expected,
            found: found.kind().to_owned(),
        }
        .into()
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> WireResult<bool> {
        match self.read_value()? {
            WireValue::Bool(b) => Ok(b),
            other => Err(Self::mismatch("bool", &other)),
        }
    }

    fn read_int_ranged(&mut self, expected: &'static str, min: i64, max: i64) -> WireResult<i64> {
        match self.read_value()? {
            WireValue::Int { value, .. } if (min..=max).contains(&value) => Ok(value),
            other => Err(Self::mismatch(expected, &other)),
        }
    }

    /// Reads an integer that must fit 8 bits.
    pub fn read_i8(&mut self) -> WireResult<i8> {
        Ok(self.read_int_ranged("i8", i64::from(i8::MIN), i64::from(i8::MAX))? as i8)
    }

    /// Reads an integer that must fit 16 bits.
    pub fn read_i16(&mut self) -> WireResult<i16> {
        Ok(self.read_int_ranged("i16", i64::from(i16::MIN), i64::from(i16::MAX))? as i16)
    }

    /// Reads an integer that must fit 32 bits.
    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(self.read_int_ranged("i32", i64::from(i32::MIN), i64::from(i32::MAX))? as i32)
    }

    /// Reads a 64-bit integer.
    pub fn read_i64(&mut self) -> WireResult<i64> {
        self.read_int_ranged("i64", i64::MIN, i64::MAX)
    }

    /// Reads a 32-bit float (a stored f64 or integer is narrowed).
    pub fn read_f32(&mut self) -> WireResult<f32> {
        match self.read_value()? {
            WireValue::F32(f) => Ok(f),
            WireValue::F64(f) => Ok(f as f32),
            WireValue::Int { value, .. } => Ok(value as f32),
            other => Err(Self::mismatch("f32", &other)),
        }
    }

    /// Reads a 64-bit float (a stored f32 or integer is widened).
    pub fn read_f64(&mut self) -> WireResult<f64> {
        match self.read_value()? {
            WireValue::F64(f) => Ok(f),
            WireValue::F32(f) => Ok(f64::from(f)),
            WireValue::Int { value, .. } => Ok(value as f64),
            other => Err(Self::mismatch("f64", &other)),
        }
    }

    /// Reads text.
    pub fn read_text(&mut self) -> WireResult<String> {
        match self.read_value()? {
            WireValue::Text(s) | WireValue::RawText(s) => Ok(s),
            other => Err(Self::mismatch("text", &other)),
        }
    }

    /// Reads a byte blob.
    pub fn read_bytes_blob(&mut self) -> WireResult<Vec<u8>> {
        match self.read_value()? {
            WireValue::Bytes(b) => Ok(b),
            other => Err(Self::mismatch("bytes", &other)),
        }
    }

    /// Reads a nanosecond timestamp: a native timestamp, an ISO-8601
    /// string, or a raw integer.
    pub fn read_timestamp_nanos(&mut self) -> WireResult<i64> {
        match self.read_value()? {
            WireValue::TimestampNanos(n) => Ok(n),
            WireValue::Int { value, .. } => Ok(value),
            WireValue::Text(s) => crate::marshal::parse_timestamp_nanos(&s),
            other => Err(Self::mismatch("timestamp", &other)),
        }
    }

    /// Reads a converter field: its text form in the character dialects,
    /// the raw integer in binary.
    pub fn read_converted(&mut self, converter: &dyn LongConverter) -> WireResult<i64> {
        match self.read_value()? {
            WireValue::Int { value, .. } => Ok(value),
            WireValue::Text(s) | WireValue::RawText(s) => converter.parse(&s),
            other => Err(Self::mismatch("converted long", &other)),
        }
    }

    /// Opens the next pending value as a sequence, staging its elements
    /// in order; returns the element count.
    pub fn begin_sequence(&mut self) -> WireResult<usize> {
        match self.read_value()? {
            WireValue::Sequence(elements) => {
                let count = elements.len();
                for element in elements.into_iter().rev() {
                    self.stack.push(element);
                }
                Ok(count)
            }
            other => Err(Self::mismatch("sequence", &other)),
        }
    }

    /// Populates `destination` from the next pending mapping.
    ///
    /// Configuration subtypes are reset to post-construction defaults
    /// first; unknown fields are skipped; missing fields keep their
    /// defaults. A stored null leaves the destination untouched.
    pub fn read_marshallable(&mut self, destination: &mut dyn Marshallable) -> WireResult<()> {
        let entries = match self.read_value()? {
            WireValue::Mapping(entries) => entries,
            WireValue::TypedObject { fields, .. } => fields,
            WireValue::Null => return Ok(()),
            other => return Err(Self::mismatch("mapping", &other)),
        };
        if destination.reset_on_read() {
            destination.reset_to_default();
        }
        self.populate(destination, entries)
    }

    /// Populates `destination` from the document's remaining top-level
    /// entries, treating the whole document as one mapping.
    ///
    /// The reset-on-read rule applies exactly as in
    /// [`read_marshallable`](ValueIn::read_marshallable).
    pub fn read_document_as(&mut self, destination: &mut dyn Marshallable) -> WireResult<()> {
        let entries: Vec<(MapKey, WireValue)> = self.events.drain(..).collect();
        self.events_consumed += entries.len();
        if destination.reset_on_read() {
            destination.reset_to_default();
        }
        self.populate(destination, entries)
    }

    /// Resolves the next pending typed object through `lookup` and
    /// populates a fresh instance.
    pub fn read_object(&mut self, lookup: &ClassLookup) -> WireResult<Box<dyn Marshallable>> {
        match self.read_value()? {
            WireValue::TypedObject { alias, fields } => {
                let mut instance = lookup.new_instance(&alias)?;
                if instance.reset_on_read() {
                    instance.reset_to_default();
                }
                self.populate(instance.as_mut(), fields)?;
                Ok(instance)
            }
            other => Err(Self::mismatch("typed-object", &other)),
        }
    }

    fn populate(
        &mut self,
        destination: &mut dyn Marshallable,
        entries: Vec<(MapKey, WireValue)>,
    ) -> WireResult<()> {
        for (key, value) in entries {
            let name = match key {
                MapKey::Name(name) => name,
                // Integer-keyed fields inside objects have no name to
                // match; they are skipped like unknown fields.
                MapKey::Id(_) => continue,
            };
            let depth = self.stack.len();
            self.stack.push(value);
            let matched = destination.read_field(&name, self)?;
            if !matched || self.stack.len() > depth {
                self.stack.truncate(depth);
            }
        }
        Ok(())
    }
}
