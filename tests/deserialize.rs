/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! Scope-chain reconstruction from serialized records.

mod common;

use std::rc::Rc;

use common::Harness;
use js_scopes::{
    AnalysisInfo, Context, DeserializationMode, FunctionKind, Name, ScopeArena, ScopeInfo,
    ScopeType, SharedFunctionInfo, VariableLocation, MIN_CONTEXT_SLOTS,
};

/// Analyze `function f(){ var x; function g(){ x; } }` and return f's
/// and the script's records, plus the name of `x`.
fn analyzed_function_record(h: &mut Harness) -> (Rc<ScopeInfo>, Rc<ScopeInfo>, Name) {
    let script = h.arena.new_script_scope();
    let f = h.arena.new_function_scope(script, FunctionKind::Normal);
    h.declare_var(f, "x");
    let g = h.arena.new_function_scope(f, FunctionKind::Normal);
    h.reference(g, "x");
    h.analyze(script);

    let f_info = h.arena.scope(f).scope_info().unwrap().clone();
    let script_info = h.arena.scope(script).scope_info().unwrap().clone();
    (f_info, script_info, h.name("x"))
}

fn function_chain(f_info: Rc<ScopeInfo>, script_info: Rc<ScopeInfo>) -> Rc<Context> {
    let native = Rc::new(Context::Native);
    let script_context = Rc::new(Context::Script {
        scope_info: script_info,
        previous: native,
    });
    Rc::new(Context::Function {
        closure: Rc::new(SharedFunctionInfo { scope_info: f_info }),
        previous: script_context,
    })
}

#[test]
fn function_context_reconstitutes_a_function_scope() {
    let mut h = Harness::new();
    let (f_info, script_info, x) = analyzed_function_record(&mut h);

    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let chain = function_chain(f_info, script_info);
    let innermost = arena.deserialize_scope_chain(&chain, script, DeserializationMode::ScopesOnly);

    assert_eq!(arena.scope(innermost).scope_type(), ScopeType::Function);
    assert!(arena.scope(innermost).is_declaration_scope());
    assert_eq!(arena.scope(innermost).outer(), Some(script));
    // The script context's record landed on the live script scope.
    assert!(arena.scope(script).scope_info().is_some());

    // Lazy materialization from the attached record, idempotently.
    let first = arena.lookup_local(innermost, x).expect("x recorded");
    let second = arena.lookup_local(innermost, x).expect("x recorded");
    assert_eq!(first, second);
    assert_eq!(
        arena.variable(first).location(),
        VariableLocation::Context(MIN_CONTEXT_SLOTS)
    );
}

#[test]
fn including_variables_internalizes_and_releases_the_record() {
    let mut h = Harness::new();
    let (f_info, script_info, x) = analyzed_function_record(&mut h);

    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let chain = function_chain(f_info, script_info);
    let innermost =
        arena.deserialize_scope_chain(&chain, script, DeserializationMode::IncludingVariables);

    assert!(arena.scope(innermost).scope_info().is_none());
    let variable = arena
        .scope(innermost)
        .variables()
        .lookup(x)
        .expect("x internalized");
    assert_eq!(
        arena.variable(variable).location(),
        VariableLocation::Context(MIN_CONTEXT_SLOTS)
    );
}

/// Re-serializing a reconstituted scope reproduces the original record.
#[test]
fn deserialize_then_serialize_is_a_fixed_point() {
    let mut h = Harness::new();
    let (f_info, script_info, _) = analyzed_function_record(&mut h);

    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let chain = function_chain(f_info.clone(), script_info);
    let innermost =
        arena.deserialize_scope_chain(&chain, script, DeserializationMode::IncludingVariables);

    let reserialized = ScopeInfo::create(&arena, innermost);
    assert_eq!(reserialized, *f_info);
}

/// A FUNCTION-tagged context whose record says EVAL reconstitutes an
/// eval scope.
#[test]
fn eval_records_are_distinguished_from_functions() {
    let mut h = Harness::new();
    let script = h.arena.new_script_scope();
    let eval = h.arena.new_eval_scope(script);
    // A lexical binding captured by an inner function gives the eval
    // scope a context.
    h.declare_let(eval, "captured");
    let inner = h.arena.new_function_scope(eval, FunctionKind::Normal);
    h.reference(inner, "captured");
    h.analyze(script);
    let eval_info = h.arena.scope(eval).scope_info().unwrap().clone();
    assert_eq!(eval_info.scope_type(), ScopeType::Eval);
    let script_info = h.arena.scope(script).scope_info().unwrap().clone();

    let mut arena = ScopeArena::new();
    let script2 = arena.new_script_scope();
    let chain = function_chain(eval_info, script_info);
    let innermost = arena.deserialize_scope_chain(&chain, script2, DeserializationMode::ScopesOnly);
    assert_eq!(arena.scope(innermost).scope_type(), ScopeType::Eval);
    assert!(arena.scope(innermost).is_declaration_scope());
}

#[test]
fn with_catch_and_debug_evaluate_contexts() {
    let mut h = Harness::new();
    let (f_info, script_info, _) = analyzed_function_record(&mut h);
    let exception = h.name("e");

    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let function_context = function_chain(f_info, script_info);
    let debug_context = Rc::new(Context::DebugEvaluate {
        previous: function_context,
    });
    let with_context = Rc::new(Context::With {
        previous: debug_context,
    });
    let catch_context = Rc::new(Context::Catch {
        name: exception,
        previous: with_context,
    });

    let innermost =
        arena.deserialize_scope_chain(&catch_context, script, DeserializationMode::ScopesOnly);

    // Innermost is the catch scope with its binding heap allocated.
    assert_eq!(arena.scope(innermost).scope_type(), ScopeType::Catch);
    let caught = arena
        .scope(innermost)
        .variables()
        .lookup(exception)
        .expect("exception binding reconstituted");
    assert_eq!(
        arena.variable(caught).location(),
        VariableLocation::Context(MIN_CONTEXT_SLOTS)
    );

    let with = arena.scope(innermost).outer().unwrap();
    assert_eq!(arena.scope(with).scope_type(), ScopeType::With);
    assert!(!arena.scope(with).is_debug_evaluate_scope());

    let debug = arena.scope(with).outer().unwrap();
    assert_eq!(arena.scope(debug).scope_type(), ScopeType::With);
    assert!(arena.scope(debug).is_debug_evaluate_scope());

    let function = arena.scope(debug).outer().unwrap();
    assert_eq!(arena.scope(function).scope_type(), ScopeType::Function);
    assert_eq!(arena.scope(function).outer(), Some(script));
}

#[test]
fn native_only_chain_yields_the_script_scope() {
    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let native = Rc::new(Context::Native);
    let innermost = arena.deserialize_scope_chain(&native, script, DeserializationMode::ScopesOnly);
    assert_eq!(innermost, script);
}

/// The whole point: an inner function compiled lazily against the
/// reconstituted chain resolves its free variables into the recorded
/// context slots.
#[test]
fn lazy_compilation_resolves_into_recorded_slots() {
    let mut h = Harness::new();
    let (f_info, script_info, x) = analyzed_function_record(&mut h);

    let mut arena = ScopeArena::new();
    let script = arena.new_script_scope();
    let chain = function_chain(f_info, script_info);
    let innermost = arena.deserialize_scope_chain(&chain, script, DeserializationMode::ScopesOnly);

    let factory = js_scopes::AstNodeFactory;
    let lazy_function = arena.new_function_scope(innermost, FunctionKind::Normal);
    let proxy = factory.new_variable_proxy(x, 0);
    arena.add_unresolved(lazy_function, proxy.clone());
    arena
        .analyze(lazy_function, &AnalysisInfo::default())
        .expect("lazy analysis succeeds");

    let bound = proxy.binding().expect("x resolved through the chain");
    assert_eq!(
        arena.variable(bound).location(),
        VariableLocation::Context(MIN_CONTEXT_SLOTS)
    );
    assert_eq!(arena.variable(bound).scope(), innermost);
}
