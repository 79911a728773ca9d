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

//! The logical document tree shared by every wire dialect.
//!
//! A document payload is a [`WireValue`] tree. The same tree reads and
//! writes across the text, JSON, and binary dialects; dialects differ
//! only in physical rendering. Structural equality is deliberately
//! width-insensitive for integers (a value written as `i8` and read back
//! as `i64` is the same value) and bitwise after NaN canonicalization for
//! floats, which is the equality the roundtrip guarantees are stated in.

/// Width hint for integer values.
///
/// The hint controls the physical encoding in the binary dialect and is
/// advisory elsewhere. Reading recovers the smallest width that fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// 8-bit.
    I8,
    /// 16-bit.
    I16,
    /// 32-bit.
    I32,
    /// 64-bit.
    I64,
}

impl IntWidth {
    /// The smallest width that exactly represents `value`.
    #[must_use]
    pub fn fitting(value: i64) -> Self {
        if i64::from(value as i8) == value {
            Self::I8
        } else if i64::from(value as i16) == value {
            Self::I16
        } else if i64::from(value as i32) == value {
            Self::I32
        } else {
            Self::I64
        }
    }
}

/// A mapping key: event/field name, or an event id in the binary dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    /// Text key.
    Name(String),
    /// Integer event id (binary dialect only).
    Id(i64),
}

impl From<&str> for MapKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<i64> for MapKey {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

/// One node of the logical document tree.
#[derive(Debug, Clone)]
pub enum WireValue {
    /// Explicit null, present in all encodings.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer with a width hint.
    Int {
        /// The value.
        value: i64,
        /// Preferred physical width.
        width: IntWidth,
    },
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque pre-encoded text, emitted verbatim in character dialects.
    RawText(String),
    /// Byte blob.
    Bytes(Vec<u8>),
    /// Nanosecond timestamp, rendered ISO-8601 in character dialects.
    TimestampNanos(i64),
    /// Ordered key/value pairs.
    Mapping(Vec<(MapKey, WireValue)>),
    /// Ordered list.
    Sequence(Vec<WireValue>),
    /// Mapping tagged with a type alias.
    TypedObject {
        /// The registered alias.
        alias: String,
        /// The object's fields, in declaration order.
        fields: Vec<(MapKey, WireValue)>,
    },
}

impl WireValue {
    /// An integer with the smallest fitting width hint.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Int {
            value,
            width: IntWidth::fitting(value),
        }
    }

    /// A text node.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Short name of the node kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int { .. } => "int",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::RawText(_) => "raw-text",
            Self::Bytes(_) => "bytes",
            Self::TimestampNanos(_) => "timestamp",
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::TypedObject { .. } => "typed-object",
        }
    }

    /// The integer value, if this node is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The text content, if this node is text or raw text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::RawText(s) => Some(s),
            _ => None,
        }
    }

    /// The entries, if this node is a mapping or typed object.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&[(MapKey, WireValue)]> {
        match self {
            Self::Mapping(entries) | Self::TypedObject { fields: entries, .. } => Some(entries),
            _ => None,
        }
    }
}

fn canonical_bits_f32(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

fn canonical_bits_f64(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for WireValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int { value: a, .. }, Self::Int { value: b, .. }) => a == b,
            (Self::F32(a), Self::F32(b)) => canonical_bits_f32(*a) == canonical_bits_f32(*b),
            (Self::F64(a), Self::F64(b)) => canonical_bits_f64(*a) == canonical_bits_f64(*b),
            // Character dialects cannot record float width, so a value
            // written as f32 may read back as f64. Equal iff the exact
            // f64 promotion matches.
            (Self::F32(a), Self::F64(b)) | (Self::F64(b), Self::F32(a)) => {
                canonical_bits_f64(f64::from(*a)) == canonical_bits_f64(*b)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::RawText(a), Self::RawText(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::TimestampNanos(a), Self::TimestampNanos(b)) => a == b,
            (Self::Mapping(a), Self::Mapping(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (
                Self::TypedObject { alias: a, fields: af },
                Self::TypedObject { alias: b, fields: bf },
            ) => a == b && af == bf,
            _ => false,
        }
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for WireValue {
    fn from(value: i32) -> Self {
        Self::Int {
            value: i64::from(value),
            width: IntWidth::I32,
        }
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        Self::Int {
            value,
            width: IntWidth::I64,
        }
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}
