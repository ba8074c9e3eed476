/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Variables and the per-scope name map.
//!
//! A `Variable` is the value object a binding resolves to: its name, how
//! it was declared, and (after allocation) where it lives at runtime. All
//! variables of one compilation unit are stored in the `ScopeArena` and
//! referred to by `VariableId`; the back-reference to the owning scope is
//! an id as well, so the whole structure is index-linked and freed
//! collectively with the arena.
//!
//! `VariableMap` is the name → variable map of one scope, keyed by
//! interned-name identity.

use rustc_hash::FxHashMap;

use crate::interner::Name;
use crate::scope::ScopeId;
use crate::u32_from_usize;

/// Handle to a `Variable` in the `ScopeArena`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VariableId(pub(crate) u32);

impl VariableId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a binding was introduced, which determines its scoping and
/// initialization behavior.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableMode {
    Var,
    /// `const` in sloppy pre-ES2015 code: function-scoped, silently
    /// ignores writes.
    ConstLegacy,
    Let,
    Const,
    /// Compiler-introduced, never user-visible, always stack-allocated
    /// unless the whole scope is forced into a context.
    Temporary,
    /// Runtime lookup that may hit any object on the scope chain.
    Dynamic,
    /// Runtime lookup known to hit the global object if anything.
    DynamicGlobal,
    /// Runtime lookup with a known shadowed local to fall back to.
    DynamicLocal,
}

impl VariableMode {
    /// `let` / `const`: block-scoped, temporal-dead-zone observing.
    pub fn is_lexical(self) -> bool {
        matches!(self, Self::Let | Self::Const)
    }

    /// A mode the parser may declare directly (as opposed to modes the
    /// analysis introduces itself).
    pub fn is_declared(self) -> bool {
        matches!(self, Self::Var | Self::ConstLegacy | Self::Let | Self::Const)
    }

    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic | Self::DynamicGlobal | Self::DynamicLocal)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableKind {
    Normal,
    Function,
    This,
    Arguments,
}

/// Whether reads before the initializing assignment must be caught
/// (temporal dead zone) or the binding is born initialized.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InitializationFlag {
    NeedsInitialization,
    CreatedInitialized,
}

/// Runtime storage assigned by the allocator. `Unallocated` is the
/// initial state; once a variable leaves it, the location never changes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableLocation {
    Unallocated,
    /// Argument slot; `-1` is the receiver.
    Parameter(i32),
    /// Stack frame slot of the nearest enclosing non-block declaration
    /// scope.
    Local(u32),
    /// Heap context slot of the owning scope.
    Context(u32),
    /// Property of the global object.
    Global,
    /// Dynamic name-keyed lookup at runtime.
    Lookup,
    /// Module cell.
    Module(u32),
}

pub struct Variable {
    name: Name,
    scope: ScopeId,
    mode: VariableMode,
    kind: VariableKind,
    initialization_flag: InitializationFlag,
    // All three flags are monotone: once set they stay set.
    maybe_assigned: bool,
    is_used: bool,
    force_context_allocation: bool,
    location: VariableLocation,
    /// For `DynamicLocal` bindings: the statically visible variable the
    /// runtime lookup falls back to when the eval introduced nothing.
    local_if_not_shadowed: Option<VariableId>,
}

impl Variable {
    pub(crate) fn new(
        name: Name,
        scope: ScopeId,
        mode: VariableMode,
        kind: VariableKind,
        initialization_flag: InitializationFlag,
        maybe_assigned: bool,
    ) -> Self {
        Self {
            name,
            scope,
            mode,
            kind,
            initialization_flag,
            maybe_assigned,
            is_used: false,
            force_context_allocation: false,
            location: VariableLocation::Unallocated,
            local_if_not_shadowed: None,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// The scope that owns this variable. Moved only by `reparent`.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: ScopeId) {
        self.scope = scope;
    }

    pub fn mode(&self) -> VariableMode {
        self.mode
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn initialization_flag(&self) -> InitializationFlag {
        self.initialization_flag
    }

    pub fn is_this(&self) -> bool {
        self.kind == VariableKind::This
    }

    pub fn is_function(&self) -> bool {
        self.kind == VariableKind::Function
    }

    pub fn is_dynamic(&self) -> bool {
        self.mode.is_dynamic()
    }

    pub fn maybe_assigned(&self) -> bool {
        self.maybe_assigned
    }

    pub fn set_maybe_assigned(&mut self) {
        self.maybe_assigned = true;
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn set_is_used(&mut self) {
        self.is_used = true;
    }

    pub fn has_forced_context_allocation(&self) -> bool {
        self.force_context_allocation
    }

    pub fn force_context_allocation(&mut self) {
        self.force_context_allocation = true;
    }

    pub fn location(&self) -> VariableLocation {
        self.location
    }

    pub fn is_unallocated(&self) -> bool {
        self.location == VariableLocation::Unallocated
    }

    pub fn is_context_slot(&self) -> bool {
        matches!(self.location, VariableLocation::Context(_))
    }

    pub fn is_stack_local(&self) -> bool {
        matches!(self.location, VariableLocation::Local(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.location, VariableLocation::Parameter(_))
    }

    pub(crate) fn allocate_to(&mut self, location: VariableLocation) {
        debug_assert!(
            self.is_unallocated() || self.location == location,
            "variable location assigned twice: {:?} -> {:?}",
            self.location,
            location
        );
        self.location = location;
    }

    pub fn local_if_not_shadowed(&self) -> Option<VariableId> {
        self.local_if_not_shadowed
    }

    pub(crate) fn set_local_if_not_shadowed(&mut self, local: VariableId) {
        self.local_if_not_shadowed = Some(local);
    }
}

/// Name → variable map of one scope. Keys are interned-name handles, so
/// hashing and equality are by identity.
#[derive(Default)]
pub struct VariableMap {
    map: FxHashMap<Name, VariableId>,
}

impl VariableMap {
    /// Insert-or-get: if the name is already present, the existing
    /// variable is returned unchanged and the requested mode/kind/flags
    /// are ignored. The `bool` reports whether a new variable was
    /// inserted.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn declare(
        &mut self,
        variables: &mut Vec<Variable>,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        kind: VariableKind,
        initialization_flag: InitializationFlag,
        maybe_assigned: bool,
    ) -> (VariableId, bool) {
        if let Some(&existing) = self.map.get(&name) {
            return (existing, false);
        }
        let id = VariableId(u32_from_usize(variables.len()));
        variables.push(Variable::new(
            name,
            scope,
            mode,
            kind,
            initialization_flag,
            maybe_assigned,
        ));
        self.map.insert(name, id);
        (id, true)
    }

    /// Insert a variable that must not already be present.
    pub(crate) fn add(&mut self, name: Name, variable: VariableId) {
        let previous = self.map.insert(name, variable);
        debug_assert!(previous.is_none(), "variable added over an existing binding");
    }

    /// Remove by name. Removing an absent name is a no-op.
    pub(crate) fn remove(&mut self, name: Name) {
        self.map.remove(&name);
    }

    pub fn lookup(&self, name: Name) -> Option<VariableId> {
        self.map.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, VariableId)> + '_ {
        self.map.iter().map(|(&name, &id)| (name, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_scope() -> ScopeId {
        ScopeId(0)
    }

    #[test]
    fn declare_is_insert_or_get() {
        let mut variables = Vec::new();
        let mut map = VariableMap::default();
        let name = Name::EMPTY;
        let (first, inserted) = map.declare(
            &mut variables,
            dummy_scope(),
            name,
            VariableMode::Var,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
            false,
        );
        assert!(inserted);
        // A second declaration with a different mode returns the original
        // variable untouched.
        let (second, inserted) = map.declare(
            &mut variables,
            dummy_scope(),
            name,
            VariableMode::Let,
            VariableKind::Normal,
            InitializationFlag::NeedsInitialization,
            true,
        );
        assert!(!inserted);
        assert_eq!(first, second);
        assert_eq!(variables[first.index()].mode(), VariableMode::Var);
        assert!(!variables[first.index()].maybe_assigned());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut variables = Vec::new();
        let mut map = VariableMap::default();
        let name = Name::EMPTY;
        let (id, _) = map.declare(
            &mut variables,
            dummy_scope(),
            name,
            VariableMode::Let,
            VariableKind::Normal,
            InitializationFlag::NeedsInitialization,
            false,
        );
        assert_eq!(map.lookup(name), Some(id));
        map.remove(name);
        assert_eq!(map.lookup(name), None);
        map.remove(name);
        assert_eq!(map.lookup(name), None);
    }

    #[test]
    fn location_is_assigned_once() {
        let mut variable = Variable::new(
            Name::EMPTY,
            dummy_scope(),
            VariableMode::Var,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
            false,
        );
        assert!(variable.is_unallocated());
        variable.allocate_to(VariableLocation::Local(3));
        assert_eq!(variable.location(), VariableLocation::Local(3));
        // Same location again is tolerated (idempotent), different would
        // assert in debug builds.
        variable.allocate_to(VariableLocation::Local(3));
    }

    #[test]
    fn mode_predicates() {
        assert!(VariableMode::Let.is_lexical());
        assert!(VariableMode::Const.is_lexical());
        assert!(!VariableMode::Var.is_lexical());
        assert!(!VariableMode::ConstLegacy.is_lexical());
        assert!(VariableMode::ConstLegacy.is_declared());
        assert!(!VariableMode::Temporary.is_declared());
        assert!(VariableMode::DynamicLocal.is_dynamic());
        assert!(!VariableMode::Var.is_dynamic());
    }
}
