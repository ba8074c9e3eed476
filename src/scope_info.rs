/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Serialized scope records.
//!
//! A `ScopeInfo` captures everything a later compilation needs to know
//! about an already-analyzed scope: its type and modes, and the
//! context-allocated bindings with their slots. Records ride on runtime
//! contexts (and shared function infos) and are read back by
//! `deserialize_scope_chain` when an inner function is compiled lazily.
//!
//! Context-local slots start at `MIN_CONTEXT_SLOTS` and are dense. The
//! function-name binding of a named function expression, when context
//! allocated, is always the last slot — the allocator guarantees it, and
//! consumers rely on it.

use crate::context::MIN_CONTEXT_SLOTS;
use crate::interner::Name;
use crate::scope::{FunctionKind, LanguageMode, ModuleEntry, ScopeArena, ScopeId, ScopeType};
use crate::variable::{InitializationFlag, VariableLocation, VariableMode};

/// One context-allocated binding. Slot `MIN_CONTEXT_SLOTS + i` for the
/// record's `i`-th entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextLocalEntry {
    pub name: Name,
    pub mode: VariableMode,
    pub initialization_flag: InitializationFlag,
    pub maybe_assigned: bool,
}

/// The context-allocated function-name binding, occupying the last slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionNameEntry {
    pub name: Name,
    pub slot: u32,
    pub mode: VariableMode,
}

/// Module import/export cells.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ModuleInfo {
    pub imports: Vec<ModuleEntry>,
    pub exports: Vec<ModuleEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeInfo {
    scope_type: ScopeType,
    language_mode: LanguageMode,
    calls_eval: bool,
    is_declaration_scope: bool,
    function_kind: FunctionKind,
    asm_module: bool,
    asm_function: bool,
    /// Parser-side parameter count; informational, not reconstructed by
    /// internalization.
    parameter_count: usize,
    /// Total heap slots of the scope's context, reserved floor included.
    context_length: u32,
    context_locals: Vec<ContextLocalEntry>,
    function_name: Option<FunctionNameEntry>,
    /// Context slot of the receiver, if it is context allocated.
    receiver_slot: Option<u32>,
    module: Option<ModuleInfo>,
}

impl ScopeInfo {
    /// Serialize an analyzed scope.
    pub fn create(arena: &ScopeArena, scope: ScopeId) -> ScopeInfo {
        let s = arena.scope(scope);

        let mut slots: Vec<(u32, ContextLocalEntry)> = Vec::new();
        for (name, id) in s.variables().iter() {
            let variable = arena.variable(id);
            if let VariableLocation::Context(slot) = variable.location() {
                slots.push((
                    slot,
                    ContextLocalEntry {
                        name,
                        mode: variable.mode(),
                        initialization_flag: variable.initialization_flag(),
                        maybe_assigned: variable.maybe_assigned(),
                    },
                ));
            }
        }
        // Temporaries live outside the name map but may still be context
        // allocated when the whole scope is.
        for &id in s.locals() {
            let variable = arena.variable(id);
            if variable.mode() == VariableMode::Temporary
                && let VariableLocation::Context(slot) = variable.location()
            {
                slots.push((
                    slot,
                    ContextLocalEntry {
                        name: variable.name(),
                        mode: variable.mode(),
                        initialization_flag: variable.initialization_flag(),
                        maybe_assigned: variable.maybe_assigned(),
                    },
                ));
            }
        }
        slots.sort_by_key(|&(slot, _)| slot);
        #[cfg(debug_assertions)]
        for (i, &(slot, _)) in slots.iter().enumerate() {
            assert_eq!(slot, MIN_CONTEXT_SLOTS + i as u32, "context slots must be dense");
        }

        let fields = s.as_declaration();
        let function_name = fields.and_then(|d| d.function_var()).and_then(|function| {
            let variable = arena.variable(function);
            match variable.location() {
                VariableLocation::Context(slot) => {
                    debug_assert_eq!(slot, s.num_heap_slots() - 1);
                    Some(FunctionNameEntry {
                        name: variable.name(),
                        slot,
                        mode: variable.mode(),
                    })
                }
                _ => None,
            }
        });

        let receiver_slot = fields.and_then(|d| d.receiver()).and_then(|receiver| {
            match arena.variable(receiver).location() {
                VariableLocation::Context(slot) => Some(slot),
                _ => None,
            }
        });

        let module = fields.and_then(|d| d.module()).map(|descriptor| ModuleInfo {
            imports: descriptor.regular_imports().to_vec(),
            exports: descriptor.regular_exports().to_vec(),
        });

        ScopeInfo {
            scope_type: s.scope_type(),
            language_mode: s.language_mode(),
            calls_eval: s.calls_eval(),
            is_declaration_scope: s.is_declaration_scope(),
            function_kind: fields.map_or(FunctionKind::Normal, |d| d.function_kind()),
            asm_module: arena.is_asm_module(scope),
            asm_function: arena.is_asm_function(scope),
            parameter_count: fields.map_or(0, |d| d.parameters().len()),
            context_length: s.num_heap_slots(),
            context_locals: slots.into_iter().map(|(_, entry)| entry).collect(),
            function_name,
            receiver_slot,
            module,
        }
    }

    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    pub fn language_mode(&self) -> LanguageMode {
        self.language_mode
    }

    pub fn calls_eval(&self) -> bool {
        self.calls_eval
    }

    pub fn is_declaration_scope(&self) -> bool {
        self.is_declaration_scope
    }

    pub fn function_kind(&self) -> FunctionKind {
        self.function_kind
    }

    pub fn is_asm_module(&self) -> bool {
        self.asm_module
    }

    pub fn is_asm_function(&self) -> bool {
        self.asm_function
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn context_length(&self) -> u32 {
        self.context_length
    }

    pub fn context_local_count(&self) -> usize {
        self.context_locals.len()
    }

    pub fn context_locals(&self) -> &[ContextLocalEntry] {
        &self.context_locals
    }

    /// The context slot holding `name`, if it is a recorded context
    /// local.
    pub fn context_slot_index(&self, name: Name) -> Option<(u32, &ContextLocalEntry)> {
        self.context_locals
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name)
            .map(|(i, entry)| (MIN_CONTEXT_SLOTS + i as u32, entry))
    }

    pub fn function_name(&self) -> Option<&FunctionNameEntry> {
        self.function_name.as_ref()
    }

    pub fn receiver_slot(&self) -> Option<u32> {
        self.receiver_slot
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.module.as_ref()
    }
}
