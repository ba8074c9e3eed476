/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! The slice of the AST that scope analysis consumes.
//!
//! The parser owns the full program tree; the analysis only ever sees
//! identifier references and declaration nodes. Both use `Cell` fields for
//! the results that are written back after parsing, so the parser can hold
//! plain shared references to its own nodes while the analysis annotates
//! them.
//!
//! `VariableProxy` doubles as the node of the per-scope unresolved list:
//! the `next_unresolved` link is threaded through the proxies themselves
//! rather than through separately allocated list nodes, and a proxy is on
//! at most one such list at a time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::interner::Name;
use crate::scope::{FunctionKind, ScopeId};
use crate::variable::VariableId;

/// Source offset used for positions that are not known (hidden scopes,
/// synthesized nodes).
pub const NO_SOURCE_POSITION: u32 = u32::MAX;

/// An identifier reference awaiting (or holding) a binding.
pub struct VariableProxy {
    name: Name,
    position: u32,
    /// Whether the reference appears as an assignment target.
    is_assigned: Cell<bool>,
    /// The resolved binding, written once by the analysis (or eagerly by
    /// the parser for names it can bind itself).
    binding: Cell<Option<VariableId>>,
    /// Intrusive link for the owning scope's unresolved list.
    pub(crate) next_unresolved: RefCell<Option<Rc<VariableProxy>>>,
}

impl VariableProxy {
    pub fn name(&self) -> Name {
        self.name
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn is_assigned(&self) -> bool {
        self.is_assigned.get()
    }

    pub fn set_is_assigned(&self) {
        self.is_assigned.set(true);
    }

    pub fn is_resolved(&self) -> bool {
        self.binding.get().is_some()
    }

    pub fn binding(&self) -> Option<VariableId> {
        self.binding.get()
    }

    /// Record the resolved binding. Re-binding to a different variable is
    /// a caller bug.
    pub(crate) fn bind_to(&self, variable: VariableId) {
        debug_assert!(
            self.binding.get().is_none() || self.binding.get() == Some(variable),
            "proxy bound twice to different variables"
        );
        self.binding.set(Some(variable));
    }
}

impl std::fmt::Debug for VariableProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableProxy")
            .field("name", &self.name)
            .field("is_assigned", &self.is_assigned.get())
            .field("binding", &self.binding.get())
            .finish()
    }
}

/// A `var` / `let` / `const` / `function` declaration as seen by the
/// analysis: the declared name plus the scope the declaration appeared in
/// syntactically. The latter is where conflict checks start walking, which
/// is not necessarily the scope that ends up owning the binding (`var`
/// hoists).
pub struct Declaration {
    proxy: Rc<VariableProxy>,
    scope: ScopeId,
    /// `Some` for function declarations.
    function_kind: Option<FunctionKind>,
    position: u32,
}

impl Declaration {
    pub fn proxy(&self) -> &Rc<VariableProxy> {
        &self.proxy
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn is_function_declaration(&self) -> bool {
        self.function_kind.is_some()
    }

    pub fn function_kind(&self) -> Option<FunctionKind> {
        self.function_kind
    }

    pub fn position(&self) -> u32 {
        self.position
    }
}

/// A sloppy-mode function declaration statement recorded for web-compat
/// hoisting. The parser enumerates these after analysis to inject the
/// hoisted `var` assignments.
pub struct SloppyBlockFunction {
    pub name: Name,
    pub function_kind: FunctionKind,
    pub position: u32,
}

/// Factory for the AST nodes above. The production front end allocates
/// these in its AST arena; here they are plain `Rc`s with the same
/// sharing behavior.
#[derive(Default)]
pub struct AstNodeFactory;

impl AstNodeFactory {
    pub fn new_variable_proxy(&self, name: Name, position: u32) -> Rc<VariableProxy> {
        Rc::new(VariableProxy {
            name,
            position,
            is_assigned: Cell::new(false),
            binding: Cell::new(None),
            next_unresolved: RefCell::new(None),
        })
    }

    /// A fresh, unbound copy of a proxy. Used by partial analysis to hand
    /// an outer scope its own reference without sharing the inner one's
    /// list link or binding.
    pub fn copy_variable_proxy(&self, proxy: &VariableProxy) -> Rc<VariableProxy> {
        let copy = self.new_variable_proxy(proxy.name(), proxy.position());
        if proxy.is_assigned() {
            copy.set_is_assigned();
        }
        copy
    }

    pub fn new_variable_declaration(
        &self,
        proxy: Rc<VariableProxy>,
        scope: ScopeId,
        position: u32,
    ) -> Rc<Declaration> {
        Rc::new(Declaration {
            proxy,
            scope,
            function_kind: None,
            position,
        })
    }

    pub fn new_function_declaration(
        &self,
        proxy: Rc<VariableProxy>,
        scope: ScopeId,
        function_kind: FunctionKind,
        position: u32,
    ) -> Rc<Declaration> {
        Rc::new(Declaration {
            proxy,
            scope,
            function_kind: Some(function_kind),
            position,
        })
    }

    pub fn new_sloppy_block_function(
        &self,
        name: Name,
        function_kind: FunctionKind,
        position: u32,
    ) -> Rc<SloppyBlockFunction> {
        Rc::new(SloppyBlockFunction {
            name,
            function_kind,
            position,
        })
    }
}
