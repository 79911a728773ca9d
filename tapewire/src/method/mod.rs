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

//! Method-event streaming.
//!
//! Typed method calls become event records on the wire
//! ([`MethodWriterCore`] behind the generated writers) and come back as
//! invocations on a receiver ([`WireParser`] behind the generated
//! readers). [`MessageHistory`] stamps provenance when history recording
//! is on.
//!
//! The typed surface is generated from a trait:
//!
//! ```ignore
//! #[tapewire::event_interface]
//! pub trait TradeEvents {
//!     #[event(id = 42)]
//!     fn price(&mut self, p: Price);
//!     fn say(&mut self, text: &str);
//! }
//! ```
//!
//! which expands to `TradeEventsWriter<S>` / `TradeEventsChain<'_, S>`
//! over this runtime and a `register_trade_events` reader hook.

mod history;
mod parser;
mod writer;

pub use history::{MessageHistory, HISTORY_EVENT};
pub use parser::{FieldNumberParselet, Parselet, WireParser};
pub use writer::{
    MethodWriterBuilder, MethodWriterCore, SharedWire, UpdateInterceptor, WireHolder, WireSink,
};
