/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Storage allocation.
//!
//! Runs bottom-up after resolution: a child's use of a name has already
//! forced context allocation on the owning scope's variable by the time
//! the owner allocates. Parameters are placed before other locals, the
//! receiver is parameter -1, and the function-name binding of a named
//! function expression is allocated last so that it occupies the last
//! context slot.

use std::rc::Rc;

use crate::context::MIN_CONTEXT_SLOTS;
use crate::scope::{LanguageMode, ScopeArena, ScopeId};
use crate::scope_info::ScopeInfo;
use crate::variable::{VariableId, VariableLocation, VariableMode};

impl ScopeArena {
    /// Whether `variable` needs a runtime slot at all, widening its use
    /// flags first: a visibly named variable in a catch scope, the script
    /// scope, or any scope with eval-calling inner scopes may be reached
    /// dynamically, so it counts as used (and, under inner eval, as
    /// possibly assigned).
    fn must_allocate(&mut self, scope: ScopeId, variable: VariableId) -> bool {
        let widen = {
            let s = self.scope(scope);
            s.inner_scope_calls_eval() || s.is_catch_scope() || s.is_script_scope()
        };
        let visible = self.variable(variable).is_this() || !self.variable(variable).name().is_empty();
        if visible && widen {
            self.variable_mut(variable).set_is_used();
            if self.scope(scope).inner_scope_calls_eval() {
                self.variable_mut(variable).set_maybe_assigned();
            }
        }
        // The global object provides storage for its own properties.
        !self.is_global_object_property(variable) && self.variable(variable).is_used()
    }

    /// Whether `variable` must live in the scope's heap context rather
    /// than on the stack.
    fn must_allocate_in_context(&self, scope: ScopeId, variable: VariableId) -> bool {
        let s = self.scope(scope);
        if s.has_forced_context_allocation() {
            return true;
        }
        if self.variable(variable).mode() == VariableMode::Temporary {
            return false;
        }
        if s.is_catch_scope() {
            return true;
        }
        if s.is_script_scope() && self.variable(variable).mode().is_lexical() {
            return true;
        }
        self.variable(variable).has_forced_context_allocation() || s.inner_scope_calls_eval()
    }

    /// Stack slots live on the nearest enclosing non-block declaration
    /// scope; blocks have no frame of their own.
    fn allocate_stack_slot(&mut self, scope: ScopeId, variable: VariableId) {
        if self.scope(scope).is_block_scope() {
            let outer = self.scope(scope).outer().expect("block scope has an outer scope");
            let target = self.get_declaration_scope(outer);
            self.allocate_stack_slot(target, variable);
        } else {
            let slot = self.scope(scope).num_stack_slots();
            self.scopes_mut(scope).num_stack_slots += 1;
            self.variable_mut(variable).allocate_to(VariableLocation::Local(slot));
        }
    }

    pub(crate) fn allocate_heap_slot(&mut self, scope: ScopeId, variable: VariableId) {
        let slot = self.scope(scope).num_heap_slots();
        self.scopes_mut(scope).num_heap_slots += 1;
        self.variable_mut(variable).allocate_to(VariableLocation::Context(slot));
    }

    fn allocate_parameter(&mut self, scope: ScopeId, variable: VariableId, index: i32) {
        if !self.must_allocate(scope, variable) {
            return;
        }
        if self.must_allocate_in_context(scope, variable) {
            debug_assert!(
                self.variable(variable).is_unallocated() || self.variable(variable).is_context_slot()
            );
            if self.variable(variable).is_unallocated() {
                self.allocate_heap_slot(scope, variable);
            }
        } else {
            debug_assert!(
                self.variable(variable).is_unallocated() || self.variable(variable).is_parameter()
            );
            if self.variable(variable).is_unallocated() {
                self.variable_mut(variable)
                    .allocate_to(VariableLocation::Parameter(index));
            }
        }
    }

    fn allocate_parameter_locals(&mut self, scope: ScopeId) {
        debug_assert!(self.scope(scope).is_function_scope());

        let mut uses_sloppy_arguments = false;
        let (arguments, has_arguments_parameter, has_simple_parameters) = {
            let fields = self.scope(scope).as_declaration().expect("function scope");
            (
                fields.arguments(),
                fields.has_arguments_parameter(),
                fields.has_simple_parameters(),
            )
        };
        if let Some(arguments) = arguments {
            if self.must_allocate(scope, arguments) && !has_arguments_parameter {
                // The arguments object aliases simple parameters in
                // sloppy mode, so every parameter must be addressable
                // through the context. With a parameter actually named
                // `arguments`, the object is never observable and none of
                // this applies. Strict mode and non-simple parameter
                // lists never alias.
                uses_sloppy_arguments = self.scope(scope).language_mode() == LanguageMode::Sloppy
                    && has_simple_parameters;
            } else {
                // Unused: the code generator need not materialize it.
                self.scopes_mut(scope).decl_take_arguments();
            }
        }

        // A repeated parameter name takes the highest index, so iterate
        // from last to first and let the first allocation win.
        let params: Vec<VariableId> = self
            .scope(scope)
            .as_declaration()
            .expect("function scope")
            .parameters()
            .to_vec();
        for (index, &variable) in params.iter().enumerate().rev() {
            debug_assert_eq!(self.variable(variable).scope(), scope);
            if uses_sloppy_arguments {
                self.variable_mut(variable).force_context_allocation();
            }
            self.allocate_parameter(scope, variable, index as i32);
        }
    }

    fn allocate_receiver(&mut self, scope: ScopeId) {
        if !self.has_this_declaration(scope) {
            return;
        }
        // The receiver only exists once declare_this has run.
        let Some(receiver) = self
            .scope(scope)
            .as_declaration()
            .expect("declaration scope")
            .receiver()
        else {
            return;
        };
        debug_assert_eq!(self.variable(receiver).scope(), scope);
        self.allocate_parameter(scope, receiver, -1);
    }

    fn allocate_non_parameter_local(&mut self, scope: ScopeId, variable: VariableId) {
        debug_assert_eq!(self.variable(variable).scope(), scope);
        if !self.variable(variable).is_unallocated() || !self.must_allocate(scope, variable) {
            return;
        }
        if self.must_allocate_in_context(scope, variable) {
            self.allocate_heap_slot(scope, variable);
        } else {
            self.allocate_stack_slot(scope, variable);
        }
    }

    fn allocate_non_parameter_locals_and_declared_globals(&mut self, scope: ScopeId) {
        let locals = self.scope(scope).locals().to_vec();
        for variable in locals {
            self.allocate_non_parameter_local(scope, variable);
        }
        if self.scope(scope).is_declaration_scope() {
            self.allocate_declaration_scope_locals(scope);
        }
    }

    fn allocate_declaration_scope_locals(&mut self, scope: ScopeId) {
        // The function-name binding comes after every local, so a
        // context-allocated one is the last slot of the context. The
        // serialized record format depends on that.
        let fields = self.scope(scope).as_declaration().expect("declaration scope");
        if let Some(function) = fields.function_var() {
            self.allocate_non_parameter_local(scope, function);
        }

        #[cfg(debug_assertions)]
        if self.scope(scope).as_declaration().is_some_and(|d| d.has_rest()) {
            let rest = self
                .rest_parameter(scope)
                .expect("has_rest implies a rest parameter");
            assert!(!self.must_allocate(scope, rest) || !self.variable(rest).is_unallocated());
        }

        // Unused implicit bindings are dropped so the code generator
        // does not initialize them.
        if let Some(new_target) = self.scope(scope).as_declaration().and_then(|d| d.new_target())
            && !self.must_allocate(scope, new_target)
        {
            self.scopes_mut(scope).decl_take_new_target();
        }
        if let Some(this_function) = self
            .scope(scope)
            .as_declaration()
            .and_then(|d| d.this_function())
            && !self.must_allocate(scope, this_function)
        {
            self.scopes_mut(scope).decl_take_this_function();
        }
    }

    fn allocate_module_variables(&mut self, scope: ScopeId) {
        let module = self
            .scope(scope)
            .as_declaration()
            .and_then(|d| d.module())
            .expect("module scope carries a descriptor");
        let mut cells: Vec<(crate::interner::Name, u32)> = Vec::new();
        for entry in module.regular_imports() {
            cells.push((entry.local_name, entry.cell_index));
        }
        for entry in module.regular_exports() {
            cells.push((entry.local_name, entry.cell_index));
        }
        for (name, cell_index) in cells {
            let variable = self
                .lookup_local(scope, name)
                .expect("module import/export names a declared binding");
            self.variable_mut(variable)
                .allocate_to(VariableLocation::Module(cell_index));
        }
    }

    /// Bottom-up storage assignment over the whole subtree.
    pub(crate) fn allocate_variables_recursively(&mut self, scope: ScopeId) {
        debug_assert!(!self.scope(scope).already_resolved);

        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            self.allocate_variables_recursively(inner);
        }

        debug_assert_eq!(self.scope(scope).num_stack_slots(), 0);
        debug_assert_eq!(self.scope(scope).num_heap_slots(), MIN_CONTEXT_SLOTS);

        // Parameters first, then the receiver, then everything else.
        if self.scope(scope).is_declaration_scope() {
            if self.scope(scope).is_module_scope() {
                self.allocate_module_variables(scope);
            } else if self.scope(scope).is_function_scope() {
                self.allocate_parameter_locals(scope);
            }
            self.allocate_receiver(scope);
        }
        self.allocate_non_parameter_locals_and_declared_globals(scope);

        // A with scope, a module, and any scope hosting a sloppy eval
        // call need a context at runtime even with no allocated slots.
        let s = self.scope(scope);
        let must_have_context = s.is_with_scope()
            || s.is_module_scope()
            || (s.is_function_scope() && s.calls_sloppy_eval())
            || (s.is_block_scope() && s.is_declaration_scope() && s.calls_sloppy_eval());

        if self.scope(scope).num_heap_slots() == MIN_CONTEXT_SLOTS && !must_have_context {
            self.scopes_mut(scope).num_heap_slots = 0;
        }
        debug_assert!(
            self.scope(scope).num_heap_slots() == 0
                || self.scope(scope).num_heap_slots() >= MIN_CONTEXT_SLOTS
        );
    }

    /// Emit a serialized record for every scope that will need one at
    /// runtime (all of them, for the debugger) and freeze the subtree.
    pub(crate) fn allocate_scope_infos_recursively(&mut self, scope: ScopeId, for_debugger: bool) {
        if self.scope(scope).scope_info().is_none()
            && (for_debugger || self.scope(scope).needs_scope_info())
        {
            let info = ScopeInfo::create(self, scope);
            self.scopes_mut(scope).scope_info = Some(Rc::new(info));
        }
        self.scopes_mut(scope).already_resolved = true;

        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            self.allocate_scope_infos_recursively(inner, for_debugger);
        }
    }
}
