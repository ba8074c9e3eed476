/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Scope-chain reconstruction from runtime contexts.
//!
//! When an inner function is compiled lazily, its enclosing scopes no
//! longer exist as a tree — only their serialized records, riding on the
//! closure's context chain. This pass rebuilds one scope per context,
//! outermost last, and hangs the chain off the live script scope so that
//! resolution sees the correct enclosing bindings.
//!
//! Variables can be internalized eagerly (`IncludingVariables`, after
//! which the record is released) or materialized lazily and idempotently
//! on first `lookup_local` against the attached record.

use std::rc::Rc;

use tracing::debug;

use crate::context::{Context, MIN_CONTEXT_SLOTS};
use crate::interner::Name;
use crate::scope::{DeclarationFields, Scope, ScopeArena, ScopeId, ScopeType};
use crate::scope_info::ScopeInfo;
use crate::variable::{InitializationFlag, VariableId, VariableKind, VariableLocation, VariableMode};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeserializationMode {
    /// Internalize every record's variables up front and release the
    /// records.
    IncludingVariables,
    /// Keep the records attached; variables materialize on first lookup.
    ScopesOnly,
}

impl ScopeArena {
    /// Rebuild the outer scope chain of a closure from its context
    /// chain. Returns the innermost reconstituted scope (the one the
    /// lazily compiled function should be parented under), or
    /// `script_scope` when the chain holds nothing but the native
    /// context.
    pub fn deserialize_scope_chain(
        &mut self,
        context: &Rc<Context>,
        script_scope: ScopeId,
        mode: DeserializationMode,
    ) -> ScopeId {
        debug_assert!(self.scope(script_scope).is_script_scope());

        let mut context = context.clone();
        let mut current_scope: Option<ScopeId> = None;
        let mut innermost_scope: Option<ScopeId> = None;
        while !context.is_native() {
            let outer_scope = match &*context {
                // For scope analysis, debug-evaluate behaves like a with
                // scope: everything through it resolves dynamically.
                Context::With { .. } => self.reconstitute_with_scope(false),
                Context::DebugEvaluate { .. } => self.reconstitute_with_scope(true),
                Context::Script { scope_info, .. } => {
                    // The outermost record belongs on the existing script
                    // scope; nesting a second script scope would be
                    // wrong. The next context is the native one.
                    self.set_script_scope_info(script_scope, scope_info.clone());
                    debug_assert!(context.previous().is_some_and(|previous| previous.is_native()));
                    break;
                }
                Context::Function { closure, .. } => {
                    let info = closure.scope_info.clone();
                    // A direct eval's context is tagged FUNCTION on the
                    // chain; the record's own scope type tells the two
                    // apart.
                    debug_assert!(matches!(
                        info.scope_type(),
                        ScopeType::Function | ScopeType::Eval
                    ));
                    let scope_type = info.scope_type();
                    self.reconstitute_scope(scope_type, info)
                }
                Context::Eval { scope_info, .. } => {
                    debug_assert_eq!(scope_info.scope_type(), ScopeType::Eval);
                    self.reconstitute_scope(ScopeType::Eval, scope_info.clone())
                }
                Context::Block { scope_info, .. } => {
                    self.reconstitute_scope(ScopeType::Block, scope_info.clone())
                }
                Context::Catch { name, .. } => self.reconstitute_catch_scope(*name),
                Context::Native => unreachable!("loop guard excludes the native context"),
            };
            if let Some(current) = current_scope {
                self.add_inner_scope(outer_scope, current);
            }
            current_scope = Some(outer_scope);
            if mode == DeserializationMode::IncludingVariables {
                self.internalize_scope_info(outer_scope);
            }
            if innermost_scope.is_none() {
                innermost_scope = current_scope;
            }
            let previous = context
                .previous()
                .expect("non-native context has a previous context")
                .clone();
            context = previous;
        }

        let Some(innermost) = innermost_scope else {
            return script_scope;
        };
        self.add_inner_scope(
            script_scope,
            current_scope.expect("innermost implies a current scope"),
        );
        self.propagate_scope_flags(script_scope);
        debug!(
            innermost = innermost.0,
            "reconstituted scope chain from runtime contexts"
        );
        innermost
    }

    /// Attach the script context's record to the live script scope.
    pub fn set_script_scope_info(&mut self, script_scope: ScopeId, scope_info: Rc<ScopeInfo>) {
        debug_assert!(self.scope(script_scope).is_script_scope());
        self.scopes_mut(script_scope).scope_info = Some(scope_info);
    }

    fn reconstitute_with_scope(&mut self, debug_evaluate: bool) -> ScopeId {
        let mut scope = Scope::new(ScopeType::With, None);
        scope.already_resolved = true;
        scope.is_debug_evaluate_scope = debug_evaluate;
        self.push_scope(scope)
    }

    fn reconstitute_scope(&mut self, scope_type: ScopeType, info: Rc<ScopeInfo>) -> ScopeId {
        let declaration_flavored = match scope_type {
            ScopeType::Function | ScopeType::Eval => true,
            ScopeType::Block => info.is_declaration_scope(),
            _ => unreachable!("only function, eval and block contexts reconstitute this way"),
        };
        let fields = declaration_flavored.then(|| DeclarationFields::new(info.function_kind()));
        let mut scope = Scope::new(scope_type, fields);
        scope.already_resolved = true;
        scope.language_mode = info.language_mode();
        debug_assert!(info.context_length() >= MIN_CONTEXT_SLOTS);
        scope.num_heap_slots = info.context_length();
        scope.scope_info = Some(info.clone());
        let id = self.push_scope(scope);
        if info.calls_eval() {
            self.record_eval_call(id);
        }
        if declaration_flavored {
            if info.is_asm_module() {
                self.scopes_mut(id).decl_mut().asm_module = true;
            }
            if info.is_asm_function() {
                self.scopes_mut(id).decl_mut().asm_function = true;
            }
        }
        id
    }

    /// A catch context records only the exception binding; rebuild the
    /// scope with that one variable, heap allocated at the first slot.
    fn reconstitute_catch_scope(&mut self, name: Name) -> ScopeId {
        let mut scope = Scope::new(ScopeType::Catch, None);
        scope.already_resolved = true;
        let id = self.push_scope(scope);
        let variable = self.declare_in_scope(
            id,
            name,
            VariableMode::Var,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
            false,
        );
        self.allocate_heap_slot(id, variable);
        id
    }

    /// Materialize every recorded binding and release the record.
    /// Idempotent: already-materialized names are left as they are.
    pub(crate) fn internalize_scope_info(&mut self, scope: ScopeId) {
        let Some(info) = self.scope(scope).scope_info().cloned() else {
            return;
        };

        for (i, entry) in info.context_locals().iter().enumerate() {
            let slot = MIN_CONTEXT_SLOTS + i as u32;
            self.materialize_context_local(scope, &info, slot, entry.clone());
        }

        if let Some(entry) = info.function_name().cloned()
            && self.scope(scope).is_function_scope()
            && self
                .scope(scope)
                .as_declaration()
                .is_some_and(|d| d.function_var().is_none())
        {
            let variable = self.declare_function_var(scope, entry.name);
            debug_assert_eq!(entry.mode, self.variable(variable).mode());
            self.variable_mut(variable)
                .allocate_to(VariableLocation::Context(entry.slot));
        }

        self.scopes_mut(scope).scope_info = None;
    }

    fn materialize_context_local(
        &mut self,
        scope: ScopeId,
        info: &ScopeInfo,
        slot: u32,
        entry: crate::scope_info::ContextLocalEntry,
    ) -> VariableId {
        let kind = if Some(slot) == info.receiver_slot() {
            VariableKind::This
        } else {
            VariableKind::Normal
        };
        let variable =
            self.declare_in_map_only(scope, entry.name, entry.mode, kind, entry.initialization_flag);
        if entry.maybe_assigned {
            self.variable_mut(variable).set_maybe_assigned();
        }
        self.variable_mut(variable)
            .allocate_to(VariableLocation::Context(slot));
        if kind == VariableKind::This && self.scope(scope).is_declaration_scope() {
            self.scopes_mut(scope).decl_set_receiver(variable);
        }
        variable
    }

    /// Lazy counterpart of `internalize_scope_info`: materialize one
    /// name from the attached record, on a `lookup_local` miss.
    pub(crate) fn lookup_in_scope_info(&mut self, scope: ScopeId, name: Name) -> Option<VariableId> {
        let info = self.scope(scope).scope_info().cloned()?;

        if let Some((slot, entry)) = info.context_slot_index(name) {
            let entry = entry.clone();
            return Some(self.materialize_context_local(scope, &info, slot, entry));
        }

        if self.scope(scope).is_module_scope()
            && let Some(module) = info.module()
        {
            // The record does not carry modes for module cells; imports
            // are immutable bindings, exports read/write.
            if let Some(entry) = module.imports.iter().find(|entry| entry.local_name == name) {
                let cell_index = entry.cell_index;
                let variable = self.declare_in_map_only(
                    scope,
                    name,
                    VariableMode::Const,
                    VariableKind::Normal,
                    InitializationFlag::CreatedInitialized,
                );
                self.variable_mut(variable)
                    .allocate_to(VariableLocation::Module(cell_index));
                return Some(variable);
            }
            if let Some(entry) = module.exports.iter().find(|entry| entry.local_name == name) {
                let cell_index = entry.cell_index;
                let variable = self.declare_in_map_only(
                    scope,
                    name,
                    VariableMode::Let,
                    VariableKind::Normal,
                    InitializationFlag::NeedsInitialization,
                );
                self.variable_mut(variable)
                    .allocate_to(VariableLocation::Module(cell_index));
                return Some(variable);
            }
        }

        None
    }
}
