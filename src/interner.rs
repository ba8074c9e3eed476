/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Interned identifier names.
//!
//! Scope analysis never compares identifier text; every name is interned
//! once and referred to by its `Name` handle. Two handles are equal if and
//! only if they were produced from the same string, so `Name` equality is
//! the authoritative identity for variable-map keys and hashes by the
//! handle value alone.
//!
//! The production interner lives in the front end that owns the AST; this
//! table is the same interface, kept in-crate so the analysis is testable
//! standalone. Names used internally by the analysis (`this`,
//! `.new.target`, ...) are pre-interned so they can be compared without a
//! table in hand.

use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::u32_from_usize;

/// Handle to an interned string. Equal handles mean equal strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Name(u32);

impl Name {
    /// The empty string is always interned at slot 0.
    pub const EMPTY: Name = Name(0);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// Intern table mapping strings to `Name` handles.
///
/// A single allocation per string is shared between the lookup map and the
/// reverse table. The table outlives the `ScopeArena`s that hold `Name`
/// handles into it.
pub struct StringInterner {
    map: FxHashMap<Rc<str>, Name>,
    names: Vec<Rc<str>>,
    this: Name,
    arguments: Name,
    new_target: Name,
    this_function: Name,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    pub fn new() -> Self {
        let mut interner = Self {
            map: FxHashMap::default(),
            names: Vec::new(),
            this: Name::EMPTY,
            arguments: Name::EMPTY,
            new_target: Name::EMPTY,
            this_function: Name::EMPTY,
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Name::EMPTY);
        interner.this = interner.intern("this");
        interner.arguments = interner.intern("arguments");
        // The dotted names cannot collide with source identifiers.
        interner.new_target = interner.intern(".new.target");
        interner.this_function = interner.intern(".this.function");
        interner
    }

    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(&name) = self.map.get(text) {
            return name;
        }
        let name = Name(u32_from_usize(self.names.len()));
        let shared: Rc<str> = Rc::from(text);
        self.names.push(shared.clone());
        self.map.insert(shared, name);
        name
    }

    /// Resolve a handle back to its text.
    pub fn resolve(&self, name: Name) -> &str {
        &self.names[name.0 as usize]
    }

    pub fn this_string(&self) -> Name {
        self.this
    }

    pub fn arguments_string(&self) -> Name {
        self.arguments
    }

    pub fn new_target_string(&self) -> Name {
        self.new_target
    }

    pub fn this_function_string(&self) -> Name {
        self.this_function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = StringInterner::new();
        let a = interner.intern("x");
        let b = interner.intern("x");
        let c = interner.intern("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "x");
        assert_eq!(interner.resolve(c), "y");
    }

    #[test]
    fn empty_string_is_the_empty_name() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.intern(""), Name::EMPTY);
        assert!(Name::EMPTY.is_empty());
        assert!(!interner.intern("x").is_empty());
    }

    #[test]
    fn well_known_names_are_pre_interned() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.intern("this"), interner.this_string());
        assert_eq!(interner.intern("arguments"), interner.arguments_string());
        assert_eq!(interner.intern(".new.target"), interner.new_target_string());
    }
}
