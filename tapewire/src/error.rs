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

//! Top-level error types for tapewire.
//!
//! Errors are layered by how the caller is expected to react:
//!
//! - **Validation** ([`WireError::InvalidMarshallable`],
//!   [`WireError::WriterValidation`], [`WireError::ClassNotFound`]):
//!   surfaced at the call site; a write in flight is rolled back first.
//! - **Protocol** ([`WireError::Protocol`]): the byte stream violated the
//!   wire format; the caller may resynchronize at the next document
//!   boundary.
//! - **Fatal** ([`WireError::UnrecoverableTimeout`]): the wire instance
//!   must be discarded.
//! - **Transient I/O** ([`WireError::Io`]): backing buffer or transport
//!   failure, propagated as-is.
//!
//! Rollback and history stamping are best-effort and never mask the
//! original cause.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type WireResult<T> = Result<T, WireError>;

/// Violations of the physical wire format.
///
/// Protocol errors mean the bytes on the wire do not form a valid
/// document. The wire itself is still usable; the caller may skip to the
/// next document boundary and retry.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A document header did not parse as a valid length/flags word.
    #[error("malformed document header {header:#010x} at position {position}")]
    MalformedHeader {
        /// The raw 4-byte header value.
        header: u32,
        /// Byte offset of the header in the stream.
        position: u64,
    },

    /// A value carried a type tag this reader does not understand.
    #[error("unknown type tag {tag:#04x} at position {position}")]
    UnknownTag {
        /// The offending tag byte.
        tag: u8,
        /// Byte offset of the tag in the stream.
        position: u64,
    },

    /// The reader consumed no bytes while an event was expected.
    #[error("reader failed to progress with {remaining} bytes left")]
    FailedToProgress {
        /// Readable bytes left in the document.
        remaining: u64,
    },

    /// A value was truncated mid-payload.
    #[error("unexpected end of document: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd {
        /// Bytes the decoder still required.
        needed: u64,
        /// Bytes actually remaining.
        remaining: u64,
    },

    /// The stored value does not have the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the caller asked for.
        expected: &'static str,
        /// What the document holds.
        found: String,
    },

    /// The text dialect failed to parse.
    #[error("text syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based line within the document payload.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The JSON dialect failed to parse.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 in text payload: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Top-level error type for tapewire operations.
///
/// The variants map one-to-one onto the reaction the caller should have;
/// the [`is_recoverable`](WireError::is_recoverable) and
/// [`should_discard_wire`](WireError::should_discard_wire) predicates
/// encode that policy so call sites do not have to.
#[derive(Debug)]
pub enum WireError {
    /// A field failed validation during read or write.
    ///
    /// On write the enclosing document has already been rolled back when
    /// this surfaces; the cursor is safe for the next attempt.
    InvalidMarshallable {
        /// Description of the failing field or constraint.
        message: String,
    },

    /// Document acquisition could not complete within the deadline.
    ///
    /// Fatal for the wire: the instance must be discarded.
    UnrecoverableTimeout {
        /// The operation that timed out.
        operation: &'static str,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A type alias on the wire resolved to no registered factory.
    ClassNotFound {
        /// The alias as it appeared in the document.
        alias: String,
    },

    /// Method-writer construction failed.
    ///
    /// Raised at build time for duplicate event ids or unsupported
    /// method signatures, never during a call.
    WriterValidation {
        /// Description of the invalid interface set.
        message: String,
    },

    /// The byte stream violated the wire format.
    Protocol(ProtocolError),

    /// Backing buffer or transport failure.
    Io(std::io::Error),
}

impl WireError {
    /// Creates an [`WireError::InvalidMarshallable`] from any message.
    pub fn invalid_marshallable(message: impl Into<String>) -> Self {
        Self::InvalidMarshallable {
            message: message.into(),
        }
    }

    /// Creates a [`WireError::WriterValidation`] from any message.
    pub fn writer_validation(message: impl Into<String>) -> Self {
        Self::WriterValidation {
            message: message.into(),
        }
    }

    /// Creates a [`WireError::ClassNotFound`] for an alias.
    pub fn class_not_found(alias: impl Into<String>) -> Self {
        Self::ClassNotFound {
            alias: alias.into(),
        }
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMarshallable { .. } | Self::WriterValidation { .. }
        )
    }

    /// Returns `true` if this is a protocol violation.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns `true` if the caller may retry after resynchronizing.
    ///
    /// Protocol violations are recoverable from the next document
    /// boundary, and a missing alias may resolve after registration;
    /// timeouts and validation failures are not retryable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::ClassNotFound { .. })
    }

    /// Returns `true` if the wire instance must be discarded.
    #[must_use]
    pub const fn should_discard_wire(&self) -> bool {
        matches!(self, Self::UnrecoverableTimeout { .. })
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMarshallable { message } => {
                write!(f, "invalid marshallable: {}", message)
            }
            Self::UnrecoverableTimeout { operation, waited } => {
                write!(
                    f,
                    "unrecoverable timeout: {} did not complete within {:?}",
                    operation, waited
                )
            }
            Self::ClassNotFound { alias } => {
                write!(f, "class not found for alias {:?}", alias)
            }
            Self::WriterValidation { message } => {
                write!(f, "method writer validation: {}", message)
            }
            Self::Protocol(e) => write!(f, "protocol violation: {}", e),
            Self::Io(e) => write!(f, "i/o failure: {}", e),
        }
    }
}

impl StdError for WireError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for WireError {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }
}

impl From<std::io::Error> for WireError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for WireError {
    fn from(error: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::Json(error))
    }
}

impl From<std::str::Utf8Error> for WireError {
    fn from(error: std::str::Utf8Error) -> Self {
        Self::Protocol(ProtocolError::Utf8(error))
    }
}
