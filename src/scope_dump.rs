/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Human-readable scope tree dump, for debugging the analysis.
//!
//! Renders each scope with its flags, slot counts and variables (with
//! resolved locations) into any `fmt::Write` sink.

use std::fmt::Write;

use crate::interner::{Name, StringInterner};
use crate::scope::{FunctionKind, LanguageMode, Scope, ScopeArena, ScopeId, ScopeType};
use crate::variable::{VariableId, VariableLocation, VariableMode};

fn header(scope: &Scope) -> &'static str {
    match scope.scope_type() {
        ScopeType::Eval => "eval",
        ScopeType::Function => match scope
            .as_declaration()
            .map_or(FunctionKind::Normal, |d| d.function_kind())
        {
            FunctionKind::Generator => "function*",
            FunctionKind::Async => "async function",
            FunctionKind::Arrow => "arrow",
            _ => "function",
        },
        ScopeType::Module => "module",
        ScopeType::Script => "global",
        ScopeType::Catch => "catch",
        ScopeType::Block => {
            if scope.is_declaration_scope() {
                "varblock"
            } else {
                "block"
            }
        }
        ScopeType::With => "with",
    }
}

fn mode_name(mode: VariableMode) -> &'static str {
    match mode {
        VariableMode::Var => "VAR",
        VariableMode::ConstLegacy => "CONST_LEGACY",
        VariableMode::Let => "LET",
        VariableMode::Const => "CONST",
        VariableMode::Temporary => "TEMPORARY",
        VariableMode::Dynamic => "DYNAMIC",
        VariableMode::DynamicGlobal => "DYNAMIC_GLOBAL",
        VariableMode::DynamicLocal => "DYNAMIC_LOCAL",
    }
}

fn location(variable_location: VariableLocation) -> String {
    match variable_location {
        VariableLocation::Unallocated => String::new(),
        VariableLocation::Parameter(i) => format!("parameter[{i}]"),
        VariableLocation::Local(i) => format!("local[{i}]"),
        VariableLocation::Context(i) => format!("context[{i}]"),
        VariableLocation::Global => "global".to_string(),
        VariableLocation::Lookup => "lookup".to_string(),
        VariableLocation::Module(i) => format!("module[{i}]"),
    }
}

fn indent(out: &mut impl Write, n: usize, text: &str) {
    let _ = write!(out, "{:n$}{text}", "");
}

fn print_variable(
    out: &mut impl Write,
    arena: &ScopeArena,
    interner: &StringInterner,
    n: usize,
    variable: VariableId,
) {
    let v = arena.variable(variable);
    if !v.is_used() && v.is_unallocated() {
        return;
    }
    indent(out, n, mode_name(v.mode()));
    // Nameless temporaries print by arena ordinal so distinct variables
    // stay distinguishable.
    let name = if v.name() == Name::EMPTY {
        format!(".{}", variable.0)
    } else {
        interner.resolve(v.name()).to_string()
    };
    let _ = write!(out, " {name};  // {}", location(v.location()));
    if v.has_forced_context_allocation() {
        let _ = write!(out, ", forced context allocation");
    }
    if v.maybe_assigned() {
        let _ = write!(out, ", maybe assigned");
    }
    let _ = writeln!(out);
}

fn print_scope(
    out: &mut impl Write,
    arena: &ScopeArena,
    interner: &StringInterner,
    scope: ScopeId,
    n: usize,
) {
    let s = arena.scope(scope);
    indent(out, n, header(s));

    if let Some(fields) = s.as_declaration()
        && s.is_function_scope()
    {
        let _ = write!(out, " (");
        for (i, &param) in fields.parameters().iter().enumerate() {
            if i > 0 {
                let _ = write!(out, ", ");
            }
            let _ = write!(out, "{}", interner.resolve(arena.variable(param).name()));
        }
        let _ = write!(out, ")");
    }
    let _ = writeln!(out, " {{ // ({}, {})", s.start_position(), s.end_position());

    let n1 = n + 2;
    if s.language_mode() == LanguageMode::Strict {
        indent(out, n1, "// strict mode scope\n");
    }
    if arena.is_asm_module(scope) {
        indent(out, n1, "// scope is an asm module\n");
    }
    if arena.is_asm_function(scope) {
        indent(out, n1, "// scope is an asm function\n");
    }
    if s.calls_eval() {
        indent(out, n1, "// scope calls 'eval'\n");
    }
    if s.as_declaration().is_some_and(|d| d.uses_super_property()) {
        indent(out, n1, "// scope uses 'super' property\n");
    }
    if s.inner_scope_calls_eval() {
        indent(out, n1, "// inner scope calls 'eval'\n");
    }
    if s.num_stack_slots() > 0 {
        indent(out, n1, "");
        let _ = writeln!(out, "// {} stack slots", s.num_stack_slots());
    }
    if s.num_heap_slots() > 0 {
        indent(out, n1, "");
        let _ = writeln!(out, "// {} heap slots", s.num_heap_slots());
    }

    if let Some(function) = s.as_declaration().and_then(|d| d.function_var()) {
        indent(out, n1, "// function var:\n");
        print_variable(out, arena, interner, n1, function);
    }

    if !s.variables().is_empty() {
        // Locals first, dynamics second, each sorted by name for a
        // stable dump.
        let mut named: Vec<(String, VariableId)> = s
            .variables()
            .iter()
            .map(|(name, id)| (interner.resolve(name).to_string(), id))
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        indent(out, n1, "// local vars:\n");
        for &(_, id) in named.iter().filter(|&&(_, id)| !arena.variable(id).is_dynamic()) {
            print_variable(out, arena, interner, n1, id);
        }
        indent(out, n1, "// dynamic vars:\n");
        for &(_, id) in named.iter().filter(|&&(_, id)| arena.variable(id).is_dynamic()) {
            print_variable(out, arena, interner, n1, id);
        }
    }

    let inner: Vec<ScopeId> = arena.inner_scopes(scope).collect();
    for inner_scope in inner {
        let _ = writeln!(out);
        print_scope(out, arena, interner, inner_scope, n1);
    }
    indent(out, n, "}\n");
}

/// Render the tree rooted at `scope`.
pub fn dump_scope_tree(arena: &ScopeArena, interner: &StringInterner, scope: ScopeId) -> String {
    let mut out = String::new();
    print_scope(&mut out, arena, interner, scope, 0);
    out
}
