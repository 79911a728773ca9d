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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Architecture
//!
//! Tapewire is organized in layers, leaves first:
//!
//! - **[`buffer`]**: the elastic byte buffer every wire borrows, plus a
//!   size-classed pool.
//! - **[`value`]**: the logical document tree shared by all dialects.
//! - **[`document`]**: length-prefixed framing with ready/not-ready
//!   visibility and rollback.
//! - **[`wire`]**: the three dialects (text, JSON, binary) over one
//!   [`Wire`](wire::Wire) contract.
//! - **[`marshal`]**: declared-field mapping of user structs, the alias
//!   registry, converters.
//! - **[`method`]**: typed method calls as framed events, and back.
//! - **[`dump`]**: annotated text rendering of any framed stream.
//! - **[`harness`]**: the `in.yaml`/`out.yaml` replay harness
//!   (feature `harness`).
//!
//! Writing flows user call → method writer → dialect → framer → buffer;
//! reading flows buffer → framer → dialect → parser → user handler.

pub mod buffer;
pub mod clock;
pub mod document;
pub mod dump;
pub mod error;
pub mod marshal;
pub mod method;
pub mod value;
pub mod wire;

#[cfg(feature = "harness")]
pub mod harness;

pub use error::{ProtocolError, WireError, WireResult};
pub use tapewire_macros::{event_interface, Marshallable};

/// Names re-exported for generated code; not part of the public API.
#[doc(hidden)]
pub mod __generated {
    pub use crate::document::WritingDocument;
    pub use crate::error::{WireError, WireResult};
    pub use crate::marshal::{FromWire, Marshallable, ToWire};
    pub use crate::method::{
        MethodWriterBuilder, MethodWriterCore, WireHolder, WireParser, WireSink,
    };
    pub use crate::wire::{MappingOut, ValueIn, ValueOut, Wire};
}
