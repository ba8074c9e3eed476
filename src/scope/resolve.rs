/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Reference resolution.
//!
//! Every unresolved reference is bound by an upward walk over the scope
//! tree. The walk itself is purely lexical; `with`, sloppy `eval` and
//! debug-evaluate rewrite its result on the way back down, replacing a
//! statically found binding with a dynamic lookup where runtime objects
//! can shadow it.

use std::rc::Rc;

use crate::ast::VariableProxy;
use crate::interner::Name;
use crate::scope::{AnalysisInfo, ScopeArena, ScopeError, ScopeId};
use crate::variable::{InitializationFlag, VariableId, VariableKind, VariableLocation, VariableMode};

impl ScopeArena {
    /// Drain and resolve this scope's unresolved list, then recurse into
    /// inner scopes.
    pub(crate) fn resolve_variables_recursively(
        &mut self,
        scope: ScopeId,
        info: &AnalysisInfo,
    ) -> Result<(), ScopeError> {
        let mut next = self.scopes_mut(scope).unresolved.take();
        while let Some(proxy) = next {
            next = proxy.next_unresolved.borrow_mut().take();
            self.resolve_variable(scope, &proxy, info)?;
        }
        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            self.resolve_variables_recursively(inner, info)?;
        }
        Ok(())
    }

    /// Bind one reference held at `scope`.
    pub(crate) fn resolve_variable(
        &mut self,
        scope: ScopeId,
        proxy: &Rc<VariableProxy>,
        info: &AnalysisInfo,
    ) -> Result<(), ScopeError> {
        // Functions and consts may be resolved by the parser already.
        if proxy.is_resolved() {
            return Ok(());
        }
        let variable = self
            .lookup_recursive(scope, proxy, true, None)
            .expect("declare_free lookup always produces a binding");
        self.resolve_to(info, proxy, variable)
    }

    pub(crate) fn resolve_to(
        &mut self,
        info: &AnalysisInfo,
        proxy: &Rc<VariableProxy>,
        variable: VariableId,
    ) -> Result<(), ScopeError> {
        if info.script_is_native {
            // Native scripts must not pollute the global object: every
            // reference has to bind locally or stay unallocated.
            if self.is_global_object_property(variable) {
                return Err(ScopeError::NativeUnbound);
            }
            match self.variable(variable).location() {
                VariableLocation::Local(_)
                | VariableLocation::Context(_)
                | VariableLocation::Parameter(_)
                | VariableLocation::Unallocated => {}
                _ => return Err(ScopeError::NativeUnbound),
            }
        }

        if proxy.is_assigned() {
            self.variable_mut(variable).set_maybe_assigned();
        }
        proxy.bind_to(variable);
        self.variable_mut(variable).set_is_used();
        Ok(())
    }

    /// The single arbiter of name binding. Walks outward from `scope`
    /// until `outer_end` (exclusive; `None` walks the whole chain) and
    /// applies the dynamic-binding rewrites on the way back.
    ///
    /// With `declare_free` the walk always produces a binding, declaring
    /// a dynamic global on the script scope as the last resort; without
    /// it, an unfound name yields `None` (partial analysis).
    pub(crate) fn lookup_recursive(
        &mut self,
        scope: ScopeId,
        proxy: &Rc<VariableProxy>,
        declare_free: bool,
        outer_end: Option<ScopeId>,
    ) -> Option<VariableId> {
        debug_assert_ne!(outer_end, Some(scope));
        let name = proxy.name();

        // Debug-evaluate does not create scope records for the scopes it
        // evaluates in, so anything looked up through one must go through
        // the runtime.
        if self.scope(scope).is_debug_evaluate_scope() {
            if !declare_free {
                return None;
            }
            return Some(self.non_local(scope, name, VariableMode::Dynamic));
        }

        // A local binding wins even when this scope calls eval: an
        // eval-introduced binding cannot shadow an already-declared
        // local.
        if let Some(variable) = self.lookup_local(scope, name) {
            return Some(variable);
        }

        // The name binding of a named function expression.
        if self.scope(scope).is_function_scope()
            && let Some(function) = self.lookup_function_var(scope, name)
        {
            if self.scope(scope).calls_sloppy_eval() {
                return Some(self.non_local(scope, name, VariableMode::Dynamic));
            }
            return Some(function);
        }

        if self.scope(scope).outer() == outer_end {
            if !declare_free {
                return None;
            }
            debug_assert!(self.scope(scope).is_script_scope());
            // Nothing found anywhere: the name is a property of the
            // global object.
            return Some(self.declare_dynamic_global(scope, name, VariableKind::Normal));
        }
        debug_assert!(!self.scope(scope).is_script_scope());

        let outer = self.scope(scope).outer().expect("non-script scope has an outer");
        let variable = self.lookup_recursive(outer, proxy, declare_free, outer_end)?;

        // Crossing a function boundary: inner functions close over the
        // binding, so it cannot live on the outer frame's stack.
        if self.scope(scope).is_function_scope() && !self.variable(variable).is_dynamic() {
            self.variable_mut(variable).force_context_allocation();
        }

        // `this` cannot be shadowed by eval-introduced bindings or with
        // scopes.
        if self.variable(variable).is_this() {
            return Some(variable);
        }

        if self.scope(scope).is_with_scope() {
            // The binding cannot be resolved statically: the with object
            // may or may not shadow it. The outer lookup was still
            // necessary, because an existing outer binding must stay
            // addressable from inside the with scope.
            if !self.variable(variable).is_dynamic() && self.variable(variable).is_unallocated() {
                self.variable_mut(variable).set_is_used();
                self.variable_mut(variable).force_context_allocation();
                if proxy.is_assigned() {
                    self.variable_mut(variable).set_maybe_assigned();
                }
            }
            return Some(self.non_local(scope, name, VariableMode::Dynamic));
        }

        if self.scope(scope).calls_sloppy_eval() && self.scope(scope).is_declaration_scope() {
            // The eval may introduce a binding with the same name, so the
            // statically found one may be the wrong answer. Only
            // declaration scopes can host eval-introduced vars; block
            // and catch scopes pass the result through untouched.
            if self.is_global_object_property(variable) {
                return Some(self.non_local(scope, name, VariableMode::DynamicGlobal));
            }
            if self.variable(variable).is_dynamic() {
                return Some(variable);
            }
            let invalidated = variable;
            let dynamic = self.non_local(scope, name, VariableMode::DynamicLocal);
            self.variable_mut(dynamic).set_local_if_not_shadowed(invalidated);
            return Some(dynamic);
        }

        Some(variable)
    }

    /// Declare a dynamic-mode variable owned by `scope`, living in its
    /// name map with a runtime-lookup location.
    pub(crate) fn non_local(&mut self, scope: ScopeId, name: Name, mode: VariableMode) -> VariableId {
        debug_assert!(mode.is_dynamic());
        let variable = self.declare_in_map_only(
            scope,
            name,
            mode,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
        );
        self.variable_mut(variable).allocate_to(VariableLocation::Lookup);
        variable
    }

    /// Partial-analysis resolution: bind what resolves within
    /// `max_outer`'s chain and return the rest as a linked stack.
    ///
    /// Every visited scope's `unresolved` list is left cleared whether or
    /// not its references resolved; repeated partial analyses rely on
    /// starting from an empty list.
    pub fn fetch_free_variables(
        &mut self,
        scope: ScopeId,
        max_outer: ScopeId,
        info: Option<&AnalysisInfo>,
    ) -> Result<Option<Rc<VariableProxy>>, ScopeError> {
        self.fetch_free_variables_into(scope, max_outer, info, None)
    }

    fn fetch_free_variables_into(
        &mut self,
        scope: ScopeId,
        max_outer: ScopeId,
        info: Option<&AnalysisInfo>,
        mut stack: Option<Rc<VariableProxy>>,
    ) -> Result<Option<Rc<VariableProxy>>, ScopeError> {
        let outer_end = self.scope(max_outer).outer();
        let mut next = self.scopes_mut(scope).unresolved.take();
        while let Some(proxy) = next {
            next = proxy.next_unresolved.borrow_mut().take();
            if proxy.is_resolved() {
                continue;
            }
            match self.lookup_recursive(scope, &proxy, false, outer_end) {
                None => {
                    *proxy.next_unresolved.borrow_mut() = stack.take();
                    stack = Some(proxy);
                }
                Some(variable) => {
                    if let Some(info) = info {
                        self.resolve_to(info, &proxy, variable)?;
                    }
                }
            }
        }

        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            stack = self.fetch_free_variables_into(inner, max_outer, info, stack)?;
        }
        Ok(stack)
    }
}
