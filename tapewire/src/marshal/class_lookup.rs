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

//! Bidirectional alias↔type registry.
//!
//! Aliases resolve textual type tags in documents to concrete object
//! factories and back. The registry is concurrent: a process-wide pool is
//! shared by every wire unless a wire is constructed with its own, adds
//! are idempotent, and racing adds of the same alias are allowed. Lookup
//! failures surface as [`WireError::ClassNotFound`] unless a fallback
//! recovers them.

use crate::error::{WireError, WireResult};
use crate::marshal::Marshallable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

type Factory = Arc<dyn Fn() -> Box<dyn Marshallable> + Send + Sync>;
type Fallback = Arc<dyn Fn(&str) -> Option<Box<dyn Marshallable>> + Send + Sync>;

struct Registration {
    factory: Factory,
    type_name: &'static str,
    /// The alias emitted on write; differs for lenient old-name aliases.
    canonical: String,
}

/// Concurrent name↔factory registry for typed objects on the wire.
///
/// # Examples
///
/// ```rust
/// use tapewire::marshal::{ClassLookup, Marshallable};
/// use tapewire::wire::{MappingOut, ValueIn};
/// use tapewire::WireResult;
///
/// #[derive(Default)]
/// struct Ping;
///
/// impl Marshallable for Ping {
///     fn type_name(&self) -> &'static str { "Ping" }
///     fn write_fields(&self, _out: &mut dyn MappingOut) -> WireResult<()> { Ok(()) }
///     fn read_field(&mut self, _name: &str, _input: &mut ValueIn) -> WireResult<bool> {
///         Ok(false)
///     }
///     fn reset_to_default(&mut self) {}
/// }
///
/// let lookup = ClassLookup::new();
/// lookup.add_alias::<Ping>("net.Ping");
/// assert_eq!(lookup.alias_for("Ping").as_deref(), Some("net.Ping"));
/// assert!(lookup.new_instance("net.Ping").is_ok());
/// assert!(lookup.new_instance("net.Pong").is_err());
/// ```
#[derive(Default)]
pub struct ClassLookup {
    by_alias: RwLock<HashMap<String, Registration>>,
    by_type: RwLock<HashMap<&'static str, String>>,
    fallback: RwLock<Option<Fallback>>,
}

impl ClassLookup {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry shared by wires without their own.
    pub fn global() -> Arc<ClassLookup> {
        static GLOBAL: OnceLock<Arc<ClassLookup>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ClassLookup::new())))
    }

    /// Registers `alias` for `M`.
    ///
    /// Idempotent: re-adding the same alias for the same type is a no-op.
    /// An alias already bound to a different type keeps its first binding
    /// and the conflicting add is reported.
    pub fn add_alias<M>(&self, alias: &str)
    where
        M: Marshallable + Default + 'static,
    {
        let type_name = M::default().type_name();
        let mut by_alias = self.by_alias.write();
        if let Some(existing) = by_alias.get(alias) {
            if existing.type_name != type_name {
                #[cfg(feature = "observability")]
                tracing::warn!(
                    alias,
                    bound = existing.type_name,
                    requested = type_name,
                    "alias already bound to a different type, keeping the first binding"
                );
            }
            return;
        }
        by_alias.insert(
            alias.to_owned(),
            Registration {
                factory: Arc::new(|| Box::new(M::default()) as Box<dyn Marshallable>),
                type_name,
                canonical: alias.to_owned(),
            },
        );
        self.by_type.write().insert(type_name, alias.to_owned());
    }

    /// Accepts `old` on read for the type currently registered under
    /// `current`, still emitting `current` on write.
    pub fn add_old_alias(&self, old: &str, current: &str) {
        let mut by_alias = self.by_alias.write();
        if let Some(registration) = by_alias.get(current) {
            let lenient = Registration {
                factory: Arc::clone(&registration.factory),
                type_name: registration.type_name,
                canonical: registration.canonical.clone(),
            };
            by_alias.insert(old.to_owned(), lenient);
        } else {
            #[cfg(feature = "observability")]
            tracing::warn!(old, current, "old alias registered before its current alias");
        }
    }

    /// Installs a recovery hook consulted when an alias is unknown.
    pub fn set_fallback<F>(&self, fallback: F)
    where
        F: Fn(&str) -> Option<Box<dyn Marshallable>> + Send + Sync + 'static,
    {
        *self.fallback.write() = Some(Arc::new(fallback));
    }

    /// Builds a fresh instance for the type tagged `alias`.
    pub fn new_instance(&self, alias: &str) -> WireResult<Box<dyn Marshallable>> {
        if let Some(registration) = self.by_alias.read().get(alias) {
            return Ok((registration.factory)());
        }
        let fallback = self.fallback.read().clone();
        if let Some(fallback) = fallback {
            if let Some(instance) = fallback(alias) {
                #[cfg(feature = "observability")]
                tracing::warn!(alias, "alias resolved through the fallback");
                return Ok(instance);
            }
        }
        Err(WireError::class_not_found(alias))
    }

    /// The alias emitted for `type_name`, if one is registered.
    #[must_use]
    pub fn alias_for(&self, type_name: &str) -> Option<String> {
        self.by_type.read().get(type_name).cloned()
    }

    /// The canonical (current) alias for a possibly-old alias.
    #[must_use]
    pub fn canonical_alias(&self, alias: &str) -> Option<String> {
        self.by_alias.read().get(alias).map(|r| r.canonical.clone())
    }
}
