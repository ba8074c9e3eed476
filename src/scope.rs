/*
 * Copyright (c) 2026-present, the Ladybird developers.
 *
 * SPDX-License-Identifier: BSD-2-Clause
 */

//! The lexical scope tree.
//!
//! Scopes form a parent/child/sibling tree mirroring the source nesting of
//! scripts, modules, functions, blocks, catch clauses and `with`
//! statements. The parser builds the tree and registers declarations and
//! identifier references; `analyze()` then resolves every reference,
//! decides storage for every variable, and emits serialized scope records.
//!
//! ## Storage
//!
//! All scopes and variables of one compilation unit live in a
//! `ScopeArena` (plain `Vec`s addressed by `ScopeId` / `VariableId`) and
//! are released together when the arena is dropped. Tree links and
//! variable back-references are ids, never owning pointers;
//! `finalize_block_scope` and `reparent` unlink nodes but nothing is
//! freed individually.
//!
//! ## Declaration-flavored scopes
//!
//! Script, module, eval, function and `var`-hosting block scopes carry
//! `DeclarationFields` (parameters, receiver, the special function
//! variables, the web-compat sloppy-block-function map, and for modules
//! the import/export descriptor). The fields are present iff the scope
//! can own `var` bindings; `with` and catch scopes never carry them.
//!
//! ## Passes
//!
//! - `scope/resolve.rs` — binds every unresolved reference (top-down)
//! - `scope/allocate.rs` — assigns storage locations (bottom-up)
//! - `scope/deserialize.rs` — reconstitutes outer scopes from serialized
//!   records attached to a runtime context chain

use rustc_hash::FxHashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{AstNodeFactory, Declaration, SloppyBlockFunction, VariableProxy, NO_SOURCE_POSITION};
use crate::context::MIN_CONTEXT_SLOTS;
use crate::interner::{Name, StringInterner};
use crate::scope_info::ScopeInfo;
use crate::u32_from_usize;
use crate::variable::{
    InitializationFlag, Variable, VariableId, VariableKind, VariableLocation, VariableMap,
    VariableMode,
};

mod allocate;
mod deserialize;
mod resolve;

pub use deserialize::DeserializationMode;

/// Handle to a `Scope` in the `ScopeArena`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeType {
    Script,
    Module,
    Eval,
    Function,
    Block,
    Catch,
    With,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LanguageMode {
    Sloppy,
    Strict,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Generator,
    Async,
    ConciseMethod,
    ClassConstructor,
    SubclassConstructor,
    AccessorFunction,
}

impl FunctionKind {
    pub fn is_arrow(self) -> bool {
        self == Self::Arrow
    }

    pub fn is_generator(self) -> bool {
        self == Self::Generator
    }

    pub fn is_async(self) -> bool {
        self == Self::Async
    }

    pub fn is_class_constructor(self) -> bool {
        matches!(self, Self::ClassConstructor | Self::SubclassConstructor)
    }

    pub fn is_subclass_constructor(self) -> bool {
        self == Self::SubclassConstructor
    }

    /// Kinds that bind `.this.function` for method shorthand / `super`
    /// support.
    pub fn binds_this_function(self) -> bool {
        matches!(
            self,
            Self::ConciseMethod
                | Self::ClassConstructor
                | Self::SubclassConstructor
                | Self::AccessorFunction
        )
    }
}

/// Structured error kinds surfaced to the caller. The caller maps kinds
/// to user-facing diagnostics; no message formatting happens here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    /// Conflicting lexical / `var` declarations of the same name.
    #[error("conflicting declarations of one name")]
    Redeclaration,
    /// A caller passed a variable mode an entry point does not accept.
    /// Indicates a parser bug.
    #[error("variable mode not accepted by this entry point")]
    InvalidMode,
    /// An identifier in a native script would have escaped to the global
    /// object.
    #[error("unbound variable in native script")]
    NativeUnbound,
}

/// Per-analysis configuration handed to `analyze()`.
#[derive(Default)]
pub struct AnalysisInfo {
    /// Native scripts must not touch the global object: any reference
    /// that fails to bind locally is an error instead of a dynamic
    /// global.
    pub script_is_native: bool,
}

/// Result of `declare_variable`: the binding, plus the web-compat flag
/// for a sloppy-mode function redeclaration that is tolerated rather than
/// reported.
#[derive(Debug)]
pub struct DeclaredVariable {
    pub variable: VariableId,
    pub sloppy_mode_block_scope_function_redefinition: bool,
}

/// Import/export registry of a module scope. Cell indices are assigned
/// densely at registration and read back by the allocator.
#[derive(Default)]
pub struct ModuleDescriptor {
    regular_imports: Vec<ModuleEntry>,
    regular_exports: Vec<ModuleEntry>,
    next_cell_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleEntry {
    pub local_name: Name,
    pub cell_index: u32,
}

impl ModuleDescriptor {
    pub fn add_regular_import(&mut self, local_name: Name) -> u32 {
        let cell_index = self.next_cell_index;
        self.next_cell_index += 1;
        self.regular_imports.push(ModuleEntry {
            local_name,
            cell_index,
        });
        cell_index
    }

    pub fn add_regular_export(&mut self, local_name: Name) -> u32 {
        let cell_index = self.next_cell_index;
        self.next_cell_index += 1;
        self.regular_exports.push(ModuleEntry {
            local_name,
            cell_index,
        });
        cell_index
    }

    pub fn regular_imports(&self) -> &[ModuleEntry] {
        &self.regular_imports
    }

    pub fn regular_exports(&self) -> &[ModuleEntry] {
        &self.regular_exports
    }
}

/// Extra state carried by declaration-flavored scopes.
pub struct DeclarationFields {
    function_kind: FunctionKind,
    /// Parameters in positional order. A name may repeat; the last
    /// occurrence takes the canonical slot.
    params: Vec<VariableId>,
    /// Parameter count before any optional or rest parameter.
    arity: usize,
    has_simple_parameters: bool,
    has_rest: bool,
    has_arguments_parameter: bool,
    asm_module: bool,
    asm_function: bool,
    uses_super_property: bool,
    force_eager_compilation: bool,
    receiver: Option<VariableId>,
    new_target: Option<VariableId>,
    arguments: Option<VariableId>,
    this_function: Option<VariableId>,
    /// Name binding of a named function expression.
    function: Option<VariableId>,
    /// Sloppy-mode block-level function declarations, per name, for
    /// web-compat hoisting.
    sloppy_block_functions: FxHashMap<Name, Vec<Rc<SloppyBlockFunction>>>,
    module: Option<ModuleDescriptor>,
}

impl DeclarationFields {
    fn new(function_kind: FunctionKind) -> Box<Self> {
        Box::new(Self {
            function_kind,
            params: Vec::new(),
            arity: 0,
            has_simple_parameters: true,
            has_rest: false,
            has_arguments_parameter: false,
            asm_module: false,
            asm_function: false,
            uses_super_property: false,
            force_eager_compilation: false,
            receiver: None,
            new_target: None,
            arguments: None,
            this_function: None,
            function: None,
            sloppy_block_functions: FxHashMap::default(),
            module: None,
        })
    }

    pub fn function_kind(&self) -> FunctionKind {
        self.function_kind
    }

    pub fn parameters(&self) -> &[VariableId] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn has_simple_parameters(&self) -> bool {
        self.has_simple_parameters
    }

    pub fn has_rest(&self) -> bool {
        self.has_rest
    }

    pub fn has_arguments_parameter(&self) -> bool {
        self.has_arguments_parameter
    }

    pub fn uses_super_property(&self) -> bool {
        self.uses_super_property
    }

    pub fn receiver(&self) -> Option<VariableId> {
        self.receiver
    }

    pub fn new_target(&self) -> Option<VariableId> {
        self.new_target
    }

    pub fn arguments(&self) -> Option<VariableId> {
        self.arguments
    }

    pub fn this_function(&self) -> Option<VariableId> {
        self.this_function
    }

    pub fn function_var(&self) -> Option<VariableId> {
        self.function
    }

    pub fn sloppy_block_functions(&self) -> &FxHashMap<Name, Vec<Rc<SloppyBlockFunction>>> {
        &self.sloppy_block_functions
    }

    pub fn module(&self) -> Option<&ModuleDescriptor> {
        self.module.as_ref()
    }
}

/// One node of the lexical tree.
pub struct Scope {
    scope_type: ScopeType,
    outer: Option<ScopeId>,
    /// Head of the inner-scope sibling list. New inner scopes are pushed
    /// at the front; `reparent` depends on that discipline.
    first_inner: Option<ScopeId>,
    next_sibling: Option<ScopeId>,
    pub(crate) variables: VariableMap,
    /// Variables requiring per-scope allocation, in declaration order.
    /// Includes temporaries, which are not in the name map.
    pub(crate) locals: Vec<VariableId>,
    /// Declaration nodes rooted here, for post-hoc conflict checks.
    pub(crate) declarations: Vec<Rc<Declaration>>,
    /// Head of the intrusive unresolved-reference list.
    pub(crate) unresolved: Option<Rc<VariableProxy>>,
    language_mode: LanguageMode,
    scope_calls_eval: bool,
    inner_scope_calls_eval: bool,
    force_context_allocation: bool,
    is_hidden: bool,
    is_debug_evaluate_scope: bool,
    pub(crate) already_resolved: bool,
    start_position: u32,
    end_position: u32,
    pub(crate) num_stack_slots: u32,
    pub(crate) num_heap_slots: u32,
    /// Serialized record this scope was reconstituted from, if any.
    /// Released once fully internalized.
    pub(crate) scope_info: Option<Rc<ScopeInfo>>,
    pub(crate) decl: Option<Box<DeclarationFields>>,
}

impl Scope {
    fn new(scope_type: ScopeType, decl: Option<Box<DeclarationFields>>) -> Self {
        Self {
            scope_type,
            outer: None,
            first_inner: None,
            next_sibling: None,
            variables: VariableMap::default(),
            locals: Vec::new(),
            declarations: Vec::new(),
            unresolved: None,
            language_mode: LanguageMode::Sloppy,
            scope_calls_eval: false,
            inner_scope_calls_eval: false,
            force_context_allocation: false,
            is_hidden: false,
            is_debug_evaluate_scope: false,
            already_resolved: false,
            start_position: NO_SOURCE_POSITION,
            end_position: NO_SOURCE_POSITION,
            num_stack_slots: 0,
            num_heap_slots: MIN_CONTEXT_SLOTS,
            scope_info: None,
            decl,
        }
    }

    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    pub fn outer(&self) -> Option<ScopeId> {
        self.outer
    }

    pub fn first_inner(&self) -> Option<ScopeId> {
        self.first_inner
    }

    pub fn next_sibling(&self) -> Option<ScopeId> {
        self.next_sibling
    }

    pub fn is_script_scope(&self) -> bool {
        self.scope_type == ScopeType::Script
    }

    pub fn is_module_scope(&self) -> bool {
        self.scope_type == ScopeType::Module
    }

    pub fn is_eval_scope(&self) -> bool {
        self.scope_type == ScopeType::Eval
    }

    pub fn is_function_scope(&self) -> bool {
        self.scope_type == ScopeType::Function
    }

    pub fn is_block_scope(&self) -> bool {
        self.scope_type == ScopeType::Block
    }

    pub fn is_catch_scope(&self) -> bool {
        self.scope_type == ScopeType::Catch
    }

    pub fn is_with_scope(&self) -> bool {
        self.scope_type == ScopeType::With
    }

    pub fn is_declaration_scope(&self) -> bool {
        self.decl.is_some()
    }

    pub fn is_arrow_scope(&self) -> bool {
        self.is_function_scope()
            && self.decl.as_ref().is_some_and(|d| d.function_kind.is_arrow())
    }

    pub fn as_declaration(&self) -> Option<&DeclarationFields> {
        self.decl.as_deref()
    }

    pub fn language_mode(&self) -> LanguageMode {
        self.language_mode
    }

    pub fn calls_eval(&self) -> bool {
        self.scope_calls_eval
    }

    pub fn calls_sloppy_eval(&self) -> bool {
        self.scope_calls_eval && self.language_mode == LanguageMode::Sloppy
    }

    pub fn inner_scope_calls_eval(&self) -> bool {
        self.inner_scope_calls_eval
    }

    pub fn has_forced_context_allocation(&self) -> bool {
        self.force_context_allocation
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn is_debug_evaluate_scope(&self) -> bool {
        self.is_debug_evaluate_scope
    }

    pub fn start_position(&self) -> u32 {
        self.start_position
    }

    pub fn end_position(&self) -> u32 {
        self.end_position
    }

    pub fn num_stack_slots(&self) -> u32 {
        self.num_stack_slots
    }

    pub fn num_heap_slots(&self) -> u32 {
        self.num_heap_slots
    }

    /// Zero heap slots means this scope needs no runtime context.
    pub fn needs_context(&self) -> bool {
        self.num_heap_slots > 0
    }

    /// Scopes that get a serialized record: anything with a context plus
    /// every scope a closure or lazy compilation may re-open.
    pub fn needs_scope_info(&self) -> bool {
        self.needs_context()
            || self.is_script_scope()
            || self.is_function_scope()
            || self.is_eval_scope()
            || self.is_module_scope()
    }

    pub fn scope_info(&self) -> Option<&Rc<ScopeInfo>> {
        self.scope_info.as_ref()
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn locals(&self) -> &[VariableId] {
        &self.locals
    }

    pub fn declarations(&self) -> &[Rc<Declaration>] {
        &self.declarations
    }

    /// Walk the unresolved-reference list.
    pub fn unresolved(&self) -> impl Iterator<Item = Rc<VariableProxy>> {
        std::iter::successors(self.unresolved.clone(), |proxy| {
            proxy.next_unresolved.borrow().clone()
        })
    }

    fn decl(&self) -> &DeclarationFields {
        self.decl.as_deref().expect("not a declaration scope")
    }

    fn decl_mut(&mut self) -> &mut DeclarationFields {
        self.decl.as_deref_mut().expect("not a declaration scope")
    }

    pub(crate) fn decl_take_arguments(&mut self) {
        self.decl_mut().arguments = None;
    }

    pub(crate) fn decl_set_receiver(&mut self, receiver: VariableId) {
        self.decl_mut().receiver = Some(receiver);
    }

    pub(crate) fn decl_take_new_target(&mut self) {
        self.decl_mut().new_target = None;
    }

    pub(crate) fn decl_take_this_function(&mut self) {
        self.decl_mut().this_function = None;
    }
}

/// A snapshot of a scope's mutable frontier, taken before speculative
/// parsing. `reparent` transplants everything registered after the
/// snapshot into a different parent; dropping the snapshot commits.
pub struct Snapshot {
    scope: ScopeId,
    top_inner_scope: Option<ScopeId>,
    top_unresolved: Option<Rc<VariableProxy>>,
    top_local: usize,
    top_decl: usize,
}

fn option_rc_ptr_eq<T>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Owns every scope and variable of one compilation unit.
pub struct ScopeArena {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub(crate) fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.index()]
    }

    pub(crate) fn scopes_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    // === Scope constructors ===

    fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(u32_from_usize(self.scopes.len()));
        self.scopes.push(scope);
        id
    }

    fn new_scope(
        &mut self,
        outer: ScopeId,
        scope_type: ScopeType,
        decl: Option<Box<DeclarationFields>>,
    ) -> ScopeId {
        let mut scope = Scope::new(scope_type, decl);
        scope.language_mode = self.scopes[outer.index()].language_mode;
        // A function establishes a fresh allocation domain; everything
        // else inherits forced context allocation from its parent.
        scope.force_context_allocation = scope_type != ScopeType::Function
            && self.scopes[outer.index()].force_context_allocation;
        let id = self.push_scope(scope);
        self.add_inner_scope(outer, id);
        id
    }

    pub fn new_script_scope(&mut self) -> ScopeId {
        self.push_scope(Scope::new(
            ScopeType::Script,
            Some(DeclarationFields::new(FunctionKind::Normal)),
        ))
    }

    pub fn new_function_scope(&mut self, outer: ScopeId, function_kind: FunctionKind) -> ScopeId {
        let id = self.new_scope(
            outer,
            ScopeType::Function,
            Some(DeclarationFields::new(function_kind)),
        );
        // Inner functions of an asm.js module are asm functions.
        if self.is_asm_module(outer) {
            self.scopes[id.index()].decl_mut().asm_function = true;
        }
        id
    }

    pub fn new_eval_scope(&mut self, outer: ScopeId) -> ScopeId {
        self.new_scope(
            outer,
            ScopeType::Eval,
            Some(DeclarationFields::new(FunctionKind::Normal)),
        )
    }

    pub fn new_module_scope(&mut self, script_scope: ScopeId, interner: &StringInterner) -> ScopeId {
        debug_assert!(self.scopes[script_scope.index()].is_script_scope());
        let mut fields = DeclarationFields::new(FunctionKind::Normal);
        fields.module = Some(ModuleDescriptor::default());
        let id = self.new_scope(script_scope, ScopeType::Module, Some(fields));
        self.scopes[id.index()].language_mode = LanguageMode::Strict;
        self.declare_this(id, interner);
        id
    }

    pub fn new_block_scope(&mut self, outer: ScopeId) -> ScopeId {
        self.new_scope(outer, ScopeType::Block, None)
    }

    /// A block scope that hosts `var` bindings (e.g. a function body
    /// separated from its parameter scope).
    pub fn new_declaration_block_scope(&mut self, outer: ScopeId) -> ScopeId {
        self.new_scope(
            outer,
            ScopeType::Block,
            Some(DeclarationFields::new(FunctionKind::Normal)),
        )
    }

    pub fn new_catch_scope(&mut self, outer: ScopeId) -> ScopeId {
        self.new_scope(outer, ScopeType::Catch, None)
    }

    pub fn new_with_scope(&mut self, outer: ScopeId) -> ScopeId {
        self.new_scope(outer, ScopeType::With, None)
    }

    // === Tree links ===

    pub(crate) fn add_inner_scope(&mut self, outer: ScopeId, inner: ScopeId) {
        self.scopes[inner.index()].next_sibling = self.scopes[outer.index()].first_inner;
        self.scopes[outer.index()].first_inner = Some(inner);
        self.scopes[inner.index()].outer = Some(outer);
    }

    pub(crate) fn remove_inner_scope(&mut self, outer: ScopeId, inner: ScopeId) {
        if self.scopes[outer.index()].first_inner == Some(inner) {
            self.scopes[outer.index()].first_inner = self.scopes[inner.index()].next_sibling;
            self.scopes[inner.index()].next_sibling = None;
            return;
        }
        let mut current = self.scopes[outer.index()].first_inner;
        while let Some(s) = current {
            if self.scopes[s.index()].next_sibling == Some(inner) {
                self.scopes[s.index()].next_sibling = self.scopes[inner.index()].next_sibling;
                self.scopes[inner.index()].next_sibling = None;
                return;
            }
            current = self.scopes[s.index()].next_sibling;
        }
    }

    /// Rewire a scope under a different outer scope. Only legal before
    /// resolution.
    pub fn replace_outer_scope(&mut self, scope: ScopeId, outer: ScopeId) {
        debug_assert!(!self.scopes[scope.index()].already_resolved);
        debug_assert!(!self.scopes[outer.index()].already_resolved);
        let old_outer = self.scopes[scope.index()]
            .outer
            .expect("scope has no outer scope");
        debug_assert!(!self.scopes[old_outer.index()].already_resolved);
        self.remove_inner_scope(old_outer, scope);
        self.add_inner_scope(outer, scope);
    }

    /// Inner scopes, in sibling-list order (most recently added first).
    pub fn inner_scopes(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(self.scopes[scope.index()].first_inner, move |&s| {
            self.scopes[s.index()].next_sibling
        })
    }

    /// Walk outward from `start` (inclusive) following `outer` links.
    pub fn scope_chain(&self, start: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(start), move |&s| self.scopes[s.index()].outer)
    }

    // === Chain queries ===

    /// The nearest enclosing scope (inclusive) that can own `var`
    /// bindings.
    pub fn get_declaration_scope(&self, start: ScopeId) -> ScopeId {
        self.scope_chain(start)
            .find(|&s| self.scopes[s.index()].is_declaration_scope())
            .expect("scope chain has no declaration scope")
    }

    /// The nearest enclosing declaration scope that is not a block:
    /// script, module, eval or function.
    pub fn get_closure_scope(&self, start: ScopeId) -> ScopeId {
        self.scope_chain(start)
            .find(|&s| {
                self.scopes[s.index()].is_declaration_scope()
                    && !self.scopes[s.index()].is_block_scope()
            })
            .expect("scope chain has no closure scope")
    }

    /// The scope whose receiver a `this` reference observes: the nearest
    /// non-arrow function scope, or the script scope.
    pub fn get_receiver_scope(&self, start: ScopeId) -> ScopeId {
        self.scope_chain(start)
            .find(|&s| {
                let scope = &self.scopes[s.index()];
                scope.is_script_scope()
                    || (scope.is_function_scope() && !scope.is_arrow_scope())
            })
            .expect("scope chain has no receiver scope")
    }

    /// Number of context-bearing scopes between `start` (inclusive) and
    /// `ancestor` (exclusive).
    pub fn context_chain_length(&self, start: ScopeId, ancestor: ScopeId) -> u32 {
        let mut n = 0;
        for s in self.scope_chain(start) {
            if s == ancestor {
                return n;
            }
            if self.scopes[s.index()].needs_context() {
                n += 1;
            }
        }
        unreachable!("ancestor not on the scope chain")
    }

    /// Distance (in contexts) to the outermost sloppy-eval-calling scope,
    /// or 0 if the chain has none.
    pub fn context_chain_length_until_outermost_sloppy_eval(&self, start: ScopeId) -> u32 {
        let mut result = 0;
        let mut length = 0;
        for s in self.scope_chain(start) {
            if !self.scopes[s.index()].needs_context() {
                continue;
            }
            length += 1;
            if self.scopes[s.index()].calls_sloppy_eval() {
                result = length;
            }
        }
        result
    }

    /// Depth of the deepest context chain rooted at this scope.
    pub fn max_nested_context_chain_length(&self, scope: ScopeId) -> u32 {
        let mut max = 0;
        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            max = max.max(self.max_nested_context_chain_length(inner));
        }
        if self.scopes[scope.index()].needs_context() {
            max += 1;
        }
        max
    }

    /// Inside a block scope declarations may not have been parsed yet, so
    /// lazy parsing cannot know how to allocate block-scoped variables.
    pub fn allows_lazy_parsing(&self, scope: ScopeId) -> bool {
        self.scope_chain(scope)
            .all(|s| !self.scopes[s.index()].is_block_scope())
    }

    pub fn allows_lazy_compilation(&self, scope: ScopeId) -> bool {
        !self.scopes[scope.index()].decl().force_eager_compilation
    }

    pub fn allows_lazy_compilation_without_context(&self, scope: ScopeId) -> bool {
        if self.scopes[scope.index()].decl().force_eager_compilation {
            return false;
        }
        let Some(outer) = self.scopes[scope.index()].outer else {
            return true;
        };
        self.scope_chain(outer)
            .all(|s| !self.scopes[s.index()].needs_context())
    }

    pub fn has_this_declaration(&self, scope: ScopeId) -> bool {
        let s = &self.scopes[scope.index()];
        (s.is_function_scope() && !s.is_arrow_scope()) || s.is_module_scope()
    }

    pub fn is_asm_module(&self, scope: ScopeId) -> bool {
        let s = &self.scopes[scope.index()];
        s.is_function_scope() && s.decl().asm_module
    }

    pub fn is_asm_function(&self, scope: ScopeId) -> bool {
        let s = &self.scopes[scope.index()];
        s.is_function_scope() && s.decl().asm_function
    }

    /// Whether the closure scope enclosing this scope has only simple
    /// parameters (no defaults, patterns or rest).
    pub fn has_simple_parameters(&self, scope: ScopeId) -> bool {
        let closure = self.get_closure_scope(scope);
        !self.scopes[closure.index()].is_function_scope()
            || self.scopes[closure.index()].decl().has_simple_parameters
    }

    pub fn num_parameters(&self, scope: ScopeId) -> usize {
        self.scopes[scope.index()]
            .as_declaration()
            .map_or(0, |d| d.params.len())
    }

    pub fn rest_parameter(&self, scope: ScopeId) -> Option<VariableId> {
        let d = self.scopes[scope.index()].decl();
        if d.has_rest {
            d.params.last().copied()
        } else {
            None
        }
    }

    /// Stack slots excluding the function-name binding, which the code
    /// generator initializes separately.
    pub fn stack_local_count(&self, scope: ScopeId) -> u32 {
        let s = &self.scopes[scope.index()];
        let function_on_stack = s.is_function_scope()
            && s.decl()
                .function
                .is_some_and(|f| self.variables[f.index()].is_stack_local());
        s.num_stack_slots - u32::from(function_on_stack)
    }

    /// Context slots above the reserved floor, excluding the
    /// function-name slot.
    pub fn context_local_count(&self, scope: ScopeId) -> u32 {
        let s = &self.scopes[scope.index()];
        if s.num_heap_slots == 0 {
            return 0;
        }
        let function_in_context = s.is_function_scope()
            && s.decl()
                .function
                .is_some_and(|f| self.variables[f.index()].is_context_slot());
        s.num_heap_slots - MIN_CONTEXT_SLOTS - u32::from(function_in_context)
    }

    /// Mutable access to a module scope's import/export registry, for
    /// the parser's module builder.
    pub fn module_descriptor_mut(&mut self, scope: ScopeId) -> &mut ModuleDescriptor {
        self.scopes[scope.index()]
            .decl_mut()
            .module
            .as_mut()
            .expect("not a module scope")
    }

    // === Flag recording ===

    pub fn set_language_mode(&mut self, scope: ScopeId, mode: LanguageMode) {
        debug_assert!(
            !(self.scopes[scope.index()].is_module_scope() && mode == LanguageMode::Sloppy),
            "module scopes are always strict"
        );
        self.scopes[scope.index()].language_mode = mode;
    }

    /// Record a direct `eval` call in this scope. Every enclosing scope
    /// observes `inner_scope_calls_eval`; a sloppy caller additionally
    /// poisons itself, since the eval code can address its own locals.
    pub fn record_eval_call(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].scope_calls_eval = true;
        if self.scopes[scope.index()].language_mode == LanguageMode::Sloppy {
            self.scopes[scope.index()].inner_scope_calls_eval = true;
        }
        let mut current = self.scopes[scope.index()].outer;
        while let Some(s) = current {
            self.scopes[s.index()].inner_scope_calls_eval = true;
            current = self.scopes[s.index()].outer;
        }
    }

    pub(crate) fn propagate_usage_flags_to_scope(&mut self, from: ScopeId, to: ScopeId) {
        debug_assert!(!self.scopes[from.index()].already_resolved);
        debug_assert!(!self.scopes[to.index()].already_resolved);
        if self.scopes[from.index()].scope_calls_eval {
            self.record_eval_call(to);
        }
    }

    pub fn set_force_context_allocation(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].force_context_allocation = true;
    }

    pub fn set_is_hidden(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].is_hidden = true;
    }

    pub fn set_is_debug_evaluate_scope(&mut self, scope: ScopeId) {
        debug_assert!(self.scopes[scope.index()].is_with_scope());
        self.scopes[scope.index()].is_debug_evaluate_scope = true;
    }

    pub fn set_start_position(&mut self, scope: ScopeId, position: u32) {
        self.scopes[scope.index()].start_position = position;
    }

    pub fn set_end_position(&mut self, scope: ScopeId, position: u32) {
        self.scopes[scope.index()].end_position = position;
    }

    pub fn set_asm_module(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].decl_mut().asm_module = true;
    }

    pub fn set_asm_function(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].decl_mut().asm_function = true;
    }

    pub fn set_force_eager_compilation(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].decl_mut().force_eager_compilation = true;
    }

    pub fn record_super_property_usage(&mut self, scope: ScopeId) {
        self.scopes[scope.index()].decl_mut().uses_super_property = true;
    }

    pub fn set_has_non_simple_parameters(&mut self, scope: ScopeId) {
        debug_assert!(self.scopes[scope.index()].is_function_scope());
        self.scopes[scope.index()].decl_mut().has_simple_parameters = false;
    }

    /// Positions are validated only for scopes that are visible in the
    /// source and childless; hidden scopes may have none.
    pub fn check_scope_positions(&self, scope: ScopeId) {
        let s = &self.scopes[scope.index()];
        if !s.is_hidden && s.first_inner.is_none() {
            debug_assert_ne!(s.start_position, NO_SOURCE_POSITION);
            debug_assert_ne!(s.end_position, NO_SOURCE_POSITION);
        }
        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            self.check_scope_positions(inner);
        }
    }

    // === Variable declaration ===

    /// Insert-or-get into this scope's map; newly created variables join
    /// the scope's allocation list.
    pub(crate) fn declare_in_scope(
        &mut self,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        kind: VariableKind,
        initialization_flag: InitializationFlag,
        maybe_assigned: bool,
    ) -> VariableId {
        let scope_data = &mut self.scopes[scope.index()];
        let (variable, inserted) = scope_data.variables.declare(
            &mut self.variables,
            scope,
            name,
            mode,
            kind,
            initialization_flag,
            maybe_assigned,
        );
        if inserted {
            scope_data.locals.push(variable);
        }
        variable
    }

    /// Insert-or-get into the name map without joining the allocation
    /// list. Dynamic non-locals and record-materialized variables are
    /// not allocated per-scope.
    pub(crate) fn declare_in_map_only(
        &mut self,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        kind: VariableKind,
        initialization_flag: InitializationFlag,
    ) -> VariableId {
        let scope_data = &mut self.scopes[scope.index()];
        let (variable, _) = scope_data.variables.declare(
            &mut self.variables,
            scope,
            name,
            mode,
            kind,
            initialization_flag,
            false,
        );
        variable
    }

    /// A variable outside any name map and allocation list.
    pub(crate) fn new_detached_variable(
        &mut self,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        kind: VariableKind,
        initialization_flag: InitializationFlag,
    ) -> VariableId {
        let id = VariableId(u32_from_usize(self.variables.len()));
        self.variables.push(Variable::new(
            name,
            scope,
            mode,
            kind,
            initialization_flag,
            false,
        ));
        id
    }

    /// Unchecked declaration of a parser-visible local. Idempotent on the
    /// same (name, scope).
    pub fn declare_local(
        &mut self,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        initialization_flag: InitializationFlag,
        kind: VariableKind,
        maybe_assigned: bool,
    ) -> Result<VariableId, ScopeError> {
        debug_assert!(!self.scopes[scope.index()].already_resolved);
        // Dynamic modes are introduced during resolution and temporaries
        // via new_temporary; neither may come in through this entry point.
        if !mode.is_declared() {
            return Err(ScopeError::InvalidMode);
        }
        Ok(self.declare_in_scope(scope, name, mode, kind, initialization_flag, maybe_assigned))
    }

    /// The checked declaration entry point used by the parser for
    /// `var` / `let` / `const` / `function`.
    pub fn declare_variable(
        &mut self,
        scope: ScopeId,
        declaration: &Rc<Declaration>,
        mode: VariableMode,
        initialization_flag: InitializationFlag,
        allow_harmony_restrictive_generators: bool,
    ) -> Result<DeclaredVariable, ScopeError> {
        if !mode.is_declared() || mode == VariableMode::ConstLegacy {
            return Err(ScopeError::InvalidMode);
        }
        debug_assert!(!self.scopes[scope.index()].already_resolved);

        if mode == VariableMode::Var && !self.scopes[scope.index()].is_declaration_scope() {
            let target = self.get_declaration_scope(scope);
            return self.declare_variable(
                target,
                declaration,
                mode,
                initialization_flag,
                allow_harmony_restrictive_generators,
            );
        }
        debug_assert!(!self.scopes[scope.index()].is_catch_scope());
        debug_assert!(!self.scopes[scope.index()].is_with_scope());
        debug_assert!(
            self.scopes[scope.index()].is_declaration_scope()
                || (mode.is_lexical() && self.scopes[scope.index()].is_block_scope())
        );

        let proxy = declaration.proxy().clone();
        let name = proxy.name();
        let is_function_declaration = declaration.is_function_declaration();
        let mut redefinition = false;

        let variable = if self.scopes[scope.index()].is_eval_scope()
            && self.scopes[scope.index()].language_mode() == LanguageMode::Sloppy
            && mode == VariableMode::Var
        {
            // A var binding in sloppy direct eval pollutes the enclosing
            // scope at runtime; bind the proxy to a lookup variable so
            // the declaration goes through the dynamic declare path.
            let id = self.new_detached_variable(
                scope,
                name,
                mode,
                VariableKind::Normal,
                initialization_flag,
            );
            self.variables[id.index()].allocate_to(VariableLocation::Lookup);
            id
        } else if let Some(existing) = self.lookup_local(scope, name) {
            let existing_mode = self.variables[existing.index()].mode();
            if mode.is_lexical() || existing_mode.is_lexical() {
                // Duplicate function declarations are allowed for web
                // compat in sloppy mode, when the name is also in the
                // sloppy-block-function map and the function is neither
                // async nor (under restrictive-generator semantics) a
                // generator.
                let mut duplicate_allowed = false;
                if self.scopes[scope.index()].language_mode() == LanguageMode::Sloppy
                    && is_function_declaration
                    && self.variables[existing.index()].is_function()
                {
                    debug_assert!(mode.is_lexical() && existing_mode.is_lexical());
                    let function_kind = declaration
                        .function_kind()
                        .expect("function declaration carries a function kind");
                    let declaration_scope = self.get_declaration_scope(scope);
                    duplicate_allowed = self.scopes[declaration_scope.index()]
                        .decl()
                        .sloppy_block_functions
                        .contains_key(&name)
                        && !function_kind.is_async()
                        && !(allow_harmony_restrictive_generators
                            && function_kind.is_generator());
                }
                if !duplicate_allowed {
                    return Err(ScopeError::Redeclaration);
                }
                redefinition = true;
                existing
            } else {
                if mode == VariableMode::Var {
                    self.variables[existing.index()].set_maybe_assigned();
                }
                existing
            }
        } else {
            let kind = if is_function_declaration {
                VariableKind::Function
            } else {
                VariableKind::Normal
            };
            self.declare_in_scope(scope, name, mode, kind, initialization_flag, false)
        };

        // Every declaration is recorded, even repeated ones for the same
        // name; the conflict checks and the code generator filter later.
        self.scopes[scope.index()].declarations.push(declaration.clone());
        proxy.bind_to(variable);
        Ok(DeclaredVariable {
            variable,
            sloppy_mode_block_scope_function_redefinition: redefinition,
        })
    }

    /// Append a parameter. Duplicates are detected by scanning the
    /// existing parameter list; the `bool` reports one.
    pub fn declare_parameter(
        &mut self,
        scope: ScopeId,
        name: Name,
        mode: VariableMode,
        is_optional: bool,
        is_rest: bool,
        interner: &StringInterner,
    ) -> (VariableId, bool) {
        debug_assert!(!self.scopes[scope.index()].already_resolved);
        debug_assert!(self.scopes[scope.index()].is_function_scope());
        debug_assert!(!self.scopes[scope.index()].decl().has_rest);
        debug_assert!(!is_optional || !is_rest);

        let mut is_duplicate = false;
        let variable = if mode == VariableMode::Temporary {
            self.new_temporary(scope, name)
        } else {
            let variable = self.declare_in_scope(
                scope,
                name,
                mode,
                VariableKind::Normal,
                InitializationFlag::CreatedInitialized,
                false,
            );
            is_duplicate = self.scopes[scope.index()].decl().params.contains(&variable);
            variable
        };
        let fields = self.scopes[scope.index()].decl_mut();
        if !is_optional && !is_rest && fields.arity == fields.params.len() {
            fields.arity += 1;
        }
        fields.has_rest = is_rest;
        fields.params.push(variable);
        if name == interner.arguments_string() {
            fields.has_arguments_parameter = true;
        }
        (variable, is_duplicate)
    }

    /// Declare the receiver binding. `this` is a CONST needing
    /// initialization in subclass constructors (it materializes only
    /// after the `super` call) and an ordinary created-initialized VAR
    /// everywhere else.
    pub fn declare_this(&mut self, scope: ScopeId, interner: &StringInterner) {
        debug_assert!(!self.scopes[scope.index()].already_resolved);
        debug_assert!(self.scopes[scope.index()].is_declaration_scope());
        debug_assert!(self.has_this_declaration(scope));

        let subclass_constructor = self.scopes[scope.index()]
            .decl()
            .function_kind
            .is_subclass_constructor();
        let variable = self.declare_in_scope(
            scope,
            interner.this_string(),
            if subclass_constructor {
                VariableMode::Const
            } else {
                VariableMode::Var
            },
            VariableKind::This,
            if subclass_constructor {
                InitializationFlag::NeedsInitialization
            } else {
                InitializationFlag::CreatedInitialized
            },
            false,
        );
        self.scopes[scope.index()].decl_mut().receiver = Some(variable);
    }

    /// Declare `arguments`, `.new.target` and (for methods, constructors
    /// and accessors) `.this.function`. They may never be accessed, in
    /// which case allocation drops them again.
    pub fn declare_default_function_variables(&mut self, scope: ScopeId, interner: &StringInterner) {
        debug_assert!(self.scopes[scope.index()].is_function_scope());
        debug_assert!(!self.scopes[scope.index()].is_arrow_scope());

        let arguments = self.declare_in_scope(
            scope,
            interner.arguments_string(),
            VariableMode::Var,
            VariableKind::Arguments,
            InitializationFlag::CreatedInitialized,
            false,
        );
        let new_target = self.declare_in_scope(
            scope,
            interner.new_target_string(),
            VariableMode::Const,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
            false,
        );
        let fields = self.scopes[scope.index()].decl_mut();
        fields.arguments = Some(arguments);
        fields.new_target = Some(new_target);

        if self.scopes[scope.index()].decl().function_kind.binds_this_function() {
            let this_function = self.declare_in_scope(
                scope,
                interner.this_function_string(),
                VariableMode::Const,
                VariableKind::Normal,
                InitializationFlag::CreatedInitialized,
                false,
            );
            self.scopes[scope.index()].decl_mut().this_function = Some(this_function);
        }
    }

    /// Declare the name binding of a named function expression. Lives
    /// outside the name map so it cannot collide with parameters or
    /// locals of the same name.
    pub fn declare_function_var(&mut self, scope: ScopeId, name: Name) -> VariableId {
        debug_assert!(self.scopes[scope.index()].is_function_scope());
        debug_assert!(self.scopes[scope.index()].decl().function.is_none());
        let mode = if self.scopes[scope.index()].language_mode() == LanguageMode::Strict {
            VariableMode::Const
        } else {
            VariableMode::ConstLegacy
        };
        let variable = self.new_detached_variable(
            scope,
            name,
            mode,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
        );
        self.scopes[scope.index()].decl_mut().function = Some(variable);
        variable
    }

    /// A compiler temporary, owned by the nearest enclosing closure scope
    /// and absent from any name map (the AST references it directly).
    pub fn new_temporary(&mut self, scope: ScopeId, name: Name) -> VariableId {
        let closure = self.get_closure_scope(scope);
        let variable = self.new_detached_variable(
            closure,
            name,
            VariableMode::Temporary,
            VariableKind::Normal,
            InitializationFlag::CreatedInitialized,
        );
        self.scopes[closure.index()].locals.push(variable);
        variable
    }

    /// Record a sloppy-mode block-level function declaration on this
    /// scope's enclosing declaration scope, for web-compat hoisting.
    pub fn declare_sloppy_block_function(
        &mut self,
        scope: ScopeId,
        statement: Rc<SloppyBlockFunction>,
    ) {
        let declaration_scope = self.get_declaration_scope(scope);
        self.scopes[declaration_scope.index()]
            .decl_mut()
            .sloppy_block_functions
            .entry(statement.name)
            .or_default()
            .push(statement);
    }

    // === Lookup ===

    /// This scope's own binding for `name`, materializing from an
    /// attached serialized record on first reference.
    pub fn lookup_local(&mut self, scope: ScopeId, name: Name) -> Option<VariableId> {
        if let Some(variable) = self.scopes[scope.index()].variables.lookup(name) {
            return Some(variable);
        }
        if self.scopes[scope.index()].scope_info.is_some() {
            return self.lookup_in_scope_info(scope, name);
        }
        None
    }

    /// Purely lexical outward lookup; no `with` / `eval` rewriting.
    pub fn lookup(&mut self, start: ScopeId, name: Name) -> Option<VariableId> {
        let mut current = Some(start);
        while let Some(scope) = current {
            if let Some(variable) = self.lookup_local(scope, name) {
                return Some(variable);
            }
            current = self.scopes[scope.index()].outer;
        }
        None
    }

    /// The function-name binding of a named function expression, if this
    /// scope has one for `name` (possibly backed by a serialized record).
    pub(crate) fn lookup_function_var(&mut self, scope: ScopeId, name: Name) -> Option<VariableId> {
        if let Some(function) = self.scopes[scope.index()].decl().function
            && self.variables[function.index()].name() == name
        {
            return Some(function);
        }
        if let Some(info) = self.scopes[scope.index()].scope_info.clone()
            && let Some(entry) = info.function_name()
            && entry.name == name
        {
            let variable = self.declare_function_var(scope, name);
            debug_assert_eq!(entry.mode, self.variables[variable.index()].mode());
            self.variables[variable.index()]
                .allocate_to(VariableLocation::Context(entry.slot));
            return Some(variable);
        }
        None
    }

    // === Unresolved references ===

    pub fn add_unresolved(&mut self, scope: ScopeId, proxy: Rc<VariableProxy>) {
        debug_assert!(!self.scopes[scope.index()].already_resolved);
        debug_assert!(!proxy.is_resolved());
        *proxy.next_unresolved.borrow_mut() = self.scopes[scope.index()].unresolved.take();
        self.scopes[scope.index()].unresolved = Some(proxy);
    }

    /// Remove a reference from the unresolved list, e.g. when speculative
    /// parsing re-interprets it. Returns whether it was found.
    pub fn remove_unresolved(&mut self, scope: ScopeId, proxy: &Rc<VariableProxy>) -> bool {
        let head = self.scopes[scope.index()].unresolved.clone();
        let Some(head) = head else { return false };
        if Rc::ptr_eq(&head, proxy) {
            self.scopes[scope.index()].unresolved = proxy.next_unresolved.borrow_mut().take();
            return true;
        }
        let mut current = head;
        loop {
            let next = current.next_unresolved.borrow().clone();
            match next {
                Some(next) if Rc::ptr_eq(&next, proxy) => {
                    let after = proxy.next_unresolved.borrow_mut().take();
                    *current.next_unresolved.borrow_mut() = after;
                    return true;
                }
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// Declare a reference to the global object on the script scope. The
    /// global object itself provides the storage.
    pub(crate) fn declare_dynamic_global(
        &mut self,
        scope: ScopeId,
        name: Name,
        kind: VariableKind,
    ) -> VariableId {
        debug_assert!(self.scopes[scope.index()].is_script_scope());
        self.declare_in_map_only(
            scope,
            name,
            VariableMode::DynamicGlobal,
            kind,
            InitializationFlag::CreatedInitialized,
        )
    }

    /// True for variables the global object stores: non-lexical bindings
    /// and dynamic lookups owned by the script scope.
    pub(crate) fn is_global_object_property(&self, variable: VariableId) -> bool {
        let v = &self.variables[variable.index()];
        let mode_allows = v.mode().is_dynamic()
            || (v.mode().is_declared() && !v.mode().is_lexical());
        mode_allows && self.scopes[v.scope().index()].is_script_scope()
    }

    // === Conflict checks ===

    /// Find the first `var` declaration that conflicts with a lexical
    /// binding on any scope between the declaration's syntactic scope and
    /// (inclusively) the enclosing declaration scope.
    pub fn check_conflicting_var_declarations(&self, scope: ScopeId) -> Option<Rc<Declaration>> {
        let is_block = self.scopes[scope.index()].is_block_scope();
        for declaration in &self.scopes[scope.index()].declarations {
            let variable = declaration
                .proxy()
                .binding()
                .expect("declaration proxy is bound at declaration time");
            let mode = self.variables[variable.index()].mode();
            // Lexical-vs-lexical conflicts in one scope were already
            // caught at declaration time. The remaining checks are
            // lexical vs VAR, plus declarations inside a declaration
            // block scope against lexicals of the surrounding scope.
            if mode.is_lexical() && !is_block {
                continue;
            }
            let name = declaration.proxy().name();
            let mut current = declaration.scope();
            if mode.is_lexical() {
                match self.scopes[current.index()].outer {
                    Some(outer) => current = outer,
                    None => continue,
                }
            }
            loop {
                if let Some(other) = self.scopes[current.index()].variables.lookup(name)
                    && self.variables[other.index()].mode().is_lexical()
                {
                    return Some(declaration.clone());
                }
                if self.scopes[current.index()].is_declaration_scope() {
                    break;
                }
                current = self.scopes[current.index()]
                    .outer
                    .expect("declaration scope missing from scope chain");
            }
        }
        None
    }

    /// The dual check: would any of `names` (e.g. a catch parameter or
    /// for-binding set) collide with a lexical binding already in this
    /// block?
    pub fn check_lex_declarations_conflicting_with(
        &mut self,
        scope: ScopeId,
        names: &[Name],
    ) -> Option<Rc<Declaration>> {
        debug_assert!(self.scopes[scope.index()].is_block_scope());
        for &name in names {
            let Some(variable) = self.lookup_local(scope, name) else {
                continue;
            };
            debug_assert!(self.variables[variable.index()].mode().is_lexical());
            for declaration in &self.scopes[scope.index()].declarations {
                if declaration.proxy().name() == name {
                    return Some(declaration.clone());
                }
            }
            debug_assert!(false, "conflicting binding has no declaration node");
        }
        None
    }

    // === Block elision ===

    /// Splice a block scope out of the tree if it owns nothing and does
    /// not itself call sloppy eval. Returns the block if it had to stay,
    /// `None` once eliminated.
    pub fn finalize_block_scope(&mut self, block: ScopeId) -> Option<ScopeId> {
        debug_assert!(self.scopes[block.index()].is_block_scope());

        if !self.scopes[block.index()].variables.is_empty()
            || self.scopes[block.index()].calls_sloppy_eval()
        {
            return Some(block);
        }

        let outer = self.scopes[block.index()]
            .outer
            .expect("block scope has an outer scope");
        self.remove_inner_scope(outer, block);

        // Reparent inner scopes onto the block's parent.
        if let Some(first) = self.scopes[block.index()].first_inner.take() {
            let mut last = first;
            self.scopes[last.index()].outer = Some(outer);
            while let Some(next) = self.scopes[last.index()].next_sibling {
                last = next;
                self.scopes[last.index()].outer = Some(outer);
            }
            self.scopes[last.index()].next_sibling = self.scopes[outer.index()].first_inner;
            self.scopes[outer.index()].first_inner = Some(first);
        }

        // Prepend this block's unresolved references to the parent's.
        if let Some(head) = self.scopes[block.index()].unresolved.take() {
            if let Some(outer_head) = self.scopes[outer.index()].unresolved.take() {
                let mut last = head.clone();
                loop {
                    let next = last.next_unresolved.borrow().clone();
                    match next {
                        Some(next) => last = next,
                        None => break,
                    }
                }
                *last.next_unresolved.borrow_mut() = Some(outer_head);
            }
            self.scopes[outer.index()].unresolved = Some(head);
        }

        self.propagate_usage_flags_to_scope(block, outer);
        // The eliminated block needs no runtime context.
        self.scopes[block.index()].num_heap_slots = 0;
        trace!(block = block.0, outer = outer.0, "block scope eliminated");
        None
    }

    // === Snapshot / reparent ===

    /// Capture this scope's mutable frontier before speculative parsing.
    pub fn snapshot(&self, scope: ScopeId) -> Snapshot {
        let closure = self.get_closure_scope(scope);
        Snapshot {
            scope,
            top_inner_scope: self.scopes[scope.index()].first_inner,
            top_unresolved: self.scopes[scope.index()].unresolved.clone(),
            top_local: self.scopes[closure.index()].locals.len(),
            top_decl: self.scopes[closure.index()].declarations.len(),
        }
    }

    /// Move everything registered after the snapshot line into
    /// `new_parent` — the arrow-function scope the parser discovered
    /// retroactively, which must already be the first inner scope of the
    /// snapshotted scope and still empty.
    pub fn reparent(&mut self, snapshot: &Snapshot, new_parent: ScopeId) {
        let outer = snapshot.scope;
        debug_assert_eq!(self.scopes[outer.index()].first_inner, Some(new_parent));
        debug_assert_eq!(self.scopes[new_parent.index()].outer, Some(outer));
        debug_assert_eq!(self.get_closure_scope(new_parent), new_parent);
        debug_assert!(self.scopes[new_parent.index()].first_inner.is_none());
        debug_assert!(self.scopes[new_parent.index()].unresolved.is_none());
        debug_assert!(self.scopes[new_parent.index()].locals.is_empty());

        // Inner scopes created after the snapshot sit between new_parent
        // and the snapshot head on the sibling list.
        if self.scopes[new_parent.index()].next_sibling != snapshot.top_inner_scope {
            let mut inner = self.scopes[new_parent.index()]
                .next_sibling
                .expect("sibling list ends before the snapshot line");
            loop {
                self.scopes[inner.index()].outer = Some(new_parent);
                debug_assert_ne!(inner, new_parent);
                if self.scopes[inner.index()].next_sibling == snapshot.top_inner_scope {
                    break;
                }
                inner = self.scopes[inner.index()]
                    .next_sibling
                    .expect("sibling list ends before the snapshot line");
            }
            self.scopes[new_parent.index()].first_inner =
                self.scopes[new_parent.index()].next_sibling;
            self.scopes[inner.index()].next_sibling = None;
            self.scopes[new_parent.index()].next_sibling = snapshot.top_inner_scope;
        }

        // Unresolved references added after the snapshot are the list
        // prefix down to (exclusive) the snapshot head.
        if !option_rc_ptr_eq(
            &self.scopes[outer.index()].unresolved,
            &snapshot.top_unresolved,
        ) {
            let head = self.scopes[outer.index()]
                .unresolved
                .clone()
                .expect("unresolved list ends before the snapshot line");
            let mut last = head.clone();
            loop {
                let next = last.next_unresolved.borrow().clone();
                if option_rc_ptr_eq(&next, &snapshot.top_unresolved) {
                    break;
                }
                last = next.expect("unresolved list ends before the snapshot line");
            }
            *last.next_unresolved.borrow_mut() = None;
            self.scopes[new_parent.index()].unresolved = Some(head);
            self.scopes[outer.index()].unresolved = snapshot.top_unresolved.clone();
        }

        // Locals and declarations recorded on the outer closure scope
        // after the snapshot move to the new parent; VAR bindings also
        // migrate in the name map.
        let outer_closure = self.get_closure_scope(outer);
        let moved: Vec<VariableId> =
            self.scopes[outer_closure.index()].locals[snapshot.top_local..].to_vec();
        for local in moved {
            let mode = self.variables[local.index()].mode();
            debug_assert!(mode == VariableMode::Temporary || mode == VariableMode::Var);
            debug_assert_eq!(self.variables[local.index()].scope(), outer_closure);
            debug_assert_ne!(self.variables[local.index()].scope(), new_parent);
            self.variables[local.index()].set_scope(new_parent);
            self.scopes[new_parent.index()].locals.push(local);
            if mode == VariableMode::Var {
                let name = self.variables[local.index()].name();
                self.scopes[outer_closure.index()].variables.remove(name);
                self.scopes[new_parent.index()].variables.add(name, local);
            }
        }
        self.scopes[outer_closure.index()]
            .locals
            .truncate(snapshot.top_local);
        self.scopes[outer_closure.index()]
            .declarations
            .truncate(snapshot.top_decl);
        trace!(
            from = outer.0,
            to = new_parent.0,
            "reparented speculative parse results"
        );
    }

    // === Whole-unit analysis ===

    /// Full analysis of a compilation unit rooted at `root`: propagate
    /// flags, resolve every reference, allocate storage, emit serialized
    /// scope records.
    pub fn analyze(&mut self, root: ScopeId, info: &AnalysisInfo) -> Result<(), ScopeError> {
        self.allocate_variables(root, info, false)
    }

    /// Like `analyze`, but emits a serialized record for every scope so
    /// the debugger can inspect arbitrary frames.
    pub fn analyze_for_debugger(
        &mut self,
        root: ScopeId,
        info: &AnalysisInfo,
    ) -> Result<(), ScopeError> {
        self.allocate_variables(root, info, true)
    }

    fn allocate_variables(
        &mut self,
        root: ScopeId,
        info: &AnalysisInfo,
        for_debugger: bool,
    ) -> Result<(), ScopeError> {
        debug_assert!(self.scopes[root.index()].is_declaration_scope());
        // The unit is top-level code, a function/eval/module directly
        // under the script scope, or nested in an already-analyzed scope.
        debug_assert!(
            self.scopes[root.index()].is_script_scope()
                || self.scopes[root.index()].outer.is_some_and(|outer| {
                    self.scopes[outer.index()].is_script_scope()
                        || self.scopes[outer.index()].already_resolved
                })
        );

        self.propagate_scope_flags(root);
        self.resolve_variables_recursively(root, info)?;
        self.allocate_variables_recursively(root);
        self.allocate_scope_infos_recursively(root, for_debugger);
        debug!(
            root = root.0,
            stack_slots = self.scopes[root.index()].num_stack_slots,
            heap_slots = self.scopes[root.index()].num_heap_slots,
            "scope analysis complete"
        );
        Ok(())
    }

    /// Pre-resolution flag propagation: inner function scopes of an
    /// asm.js module become asm functions.
    pub(crate) fn propagate_scope_flags(&mut self, scope: ScopeId) {
        for inner in self.inner_scopes(scope).collect::<Vec<_>>() {
            self.propagate_scope_flags(inner);
            if self.is_asm_module(scope) && self.scopes[inner.index()].is_function_scope() {
                self.scopes[inner.index()].decl_mut().asm_function = true;
            }
        }
    }

    /// Partial analysis for a lazily parsed function: resolve what can be
    /// resolved inside the function itself, copy the still-free
    /// references onto `migrate_to` (an equivalent scope that survives
    /// this one), migrate usage flags, and unlink this scope.
    pub fn analyze_partially(
        &mut self,
        scope: ScopeId,
        migrate_to: ScopeId,
        factory: &AstNodeFactory,
    ) -> Result<(), ScopeError> {
        debug_assert!(self.scopes[scope.index()].is_declaration_scope());
        self.propagate_scope_flags(scope);

        // Unresolvable references cannot be chased into the outer scopes
        // here; they are incomplete. Hand copies to migrate_to instead.
        let mut free = self.fetch_free_variables(scope, scope, None)?;
        while let Some(proxy) = free {
            free = proxy.next_unresolved.borrow().clone();
            debug_assert!(!proxy.is_resolved());
            let copy = factory.copy_variable_proxy(&proxy);
            self.add_unresolved(migrate_to, copy);
        }

        self.propagate_usage_flags_to_scope(scope, migrate_to);
        if self.scopes[scope.index()].decl().uses_super_property {
            self.scopes[migrate_to.index()].decl_mut().uses_super_property = true;
        }
        if self.scopes[scope.index()].inner_scope_calls_eval {
            self.scopes[migrate_to.index()].inner_scope_calls_eval = true;
        }
        debug_assert!(!self.scopes[scope.index()].decl().force_eager_compilation);

        self.scopes[migrate_to.index()].start_position = self.scopes[scope.index()].start_position;
        self.scopes[migrate_to.index()].end_position = self.scopes[scope.index()].end_position;
        self.scopes[migrate_to.index()].language_mode = self.scopes[scope.index()].language_mode;
        self.scopes[migrate_to.index()].force_context_allocation =
            self.scopes[scope.index()].force_context_allocation;
        self.scopes[migrate_to.index()].decl_mut().arity = self.scopes[scope.index()].decl().arity;

        let outer = self.scopes[scope.index()]
            .outer
            .expect("partially analyzed scope has an outer scope");
        self.remove_inner_scope(outer, scope);
        debug_assert_eq!(
            self.scopes[scope.index()].outer,
            self.scopes[migrate_to.index()].outer
        );
        Ok(())
    }

    /// The free names of a function, for preparse data. Destructive like
    /// `fetch_free_variables`.
    pub fn collect_non_locals(
        &mut self,
        scope: ScopeId,
        info: Option<&AnalysisInfo>,
    ) -> Result<Vec<Name>, ScopeError> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut non_locals = Vec::new();
        let mut free = self.fetch_free_variables(scope, scope, info)?;
        while let Some(proxy) = free {
            free = proxy.next_unresolved.borrow().clone();
            if seen.insert(proxy.name()) {
                non_locals.push(proxy.name());
            }
        }
        Ok(non_locals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNodeFactory;

    fn setup() -> (ScopeArena, StringInterner, AstNodeFactory) {
        (ScopeArena::new(), StringInterner::new(), AstNodeFactory)
    }

    #[test]
    fn declare_local_rejects_undeclarable_modes() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let x = interner.intern("x");
        assert_eq!(
            arena.declare_local(
                script,
                x,
                VariableMode::Temporary,
                InitializationFlag::CreatedInitialized,
                VariableKind::Normal,
                false,
            ),
            Err(ScopeError::InvalidMode)
        );
        assert_eq!(
            arena.declare_local(
                script,
                x,
                VariableMode::Dynamic,
                InitializationFlag::CreatedInitialized,
                VariableKind::Normal,
                false,
            ),
            Err(ScopeError::InvalidMode)
        );
    }

    #[test]
    fn declare_local_is_idempotent_per_name() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let x = interner.intern("x");
        let first = arena
            .declare_local(
                script,
                x,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                VariableKind::Normal,
                false,
            )
            .unwrap();
        let second = arena
            .declare_local(
                script,
                x,
                VariableMode::Let,
                InitializationFlag::NeedsInitialization,
                VariableKind::Normal,
                false,
            )
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(arena.variable(first).mode(), VariableMode::Var);
        assert_eq!(arena.scope(script).locals().len(), 1);
    }

    #[test]
    fn var_hoists_to_declaration_scope() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        let x = interner.intern("x");
        let proxy = factory.new_variable_proxy(x, 7);
        let declaration = factory.new_variable_declaration(proxy, block, 7);
        let declared = arena
            .declare_variable(
                block,
                &declaration,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        // The binding lands on the function, not the block.
        assert_eq!(arena.variable(declared.variable).scope(), function);
        assert!(arena.scope(block).variables().is_empty());
        assert_eq!(arena.scope(function).declarations().len(), 1);
    }

    #[test]
    fn redeclaring_a_lexical_name_is_an_error() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let x = interner.intern("x");
        let first = factory.new_variable_declaration(factory.new_variable_proxy(x, 0), function, 0);
        arena
            .declare_variable(
                function,
                &first,
                VariableMode::Let,
                InitializationFlag::NeedsInitialization,
                false,
            )
            .unwrap();
        let second = factory.new_variable_declaration(factory.new_variable_proxy(x, 9), function, 9);
        assert_eq!(
            arena
                .declare_variable(
                    function,
                    &second,
                    VariableMode::Var,
                    InitializationFlag::CreatedInitialized,
                    false,
                )
                .unwrap_err(),
            ScopeError::Redeclaration
        );
    }

    #[test]
    fn repeated_var_sets_maybe_assigned() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let x = interner.intern("x");
        let first = factory.new_variable_declaration(factory.new_variable_proxy(x, 0), function, 0);
        let declared = arena
            .declare_variable(
                function,
                &first,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert!(!arena.variable(declared.variable).maybe_assigned());
        let second = factory.new_variable_declaration(factory.new_variable_proxy(x, 4), function, 4);
        let redeclared = arena
            .declare_variable(
                function,
                &second,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert_eq!(declared.variable, redeclared.variable);
        assert!(arena.variable(declared.variable).maybe_assigned());
    }

    #[test]
    fn sloppy_block_function_redefinition_is_flagged_not_errored() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let g = interner.intern("g");

        let first_stmt = factory.new_sloppy_block_function(g, FunctionKind::Normal, 0);
        arena.declare_sloppy_block_function(function, first_stmt);
        let first =
            factory.new_function_declaration(factory.new_variable_proxy(g, 0), function, FunctionKind::Normal, 0);
        let declared = arena
            .declare_variable(
                function,
                &first,
                VariableMode::Let,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert!(!declared.sloppy_mode_block_scope_function_redefinition);

        let second_stmt = factory.new_sloppy_block_function(g, FunctionKind::Normal, 20);
        arena.declare_sloppy_block_function(function, second_stmt);
        let second =
            factory.new_function_declaration(factory.new_variable_proxy(g, 20), function, FunctionKind::Normal, 20);
        let redeclared = arena
            .declare_variable(
                function,
                &second,
                VariableMode::Let,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert!(redeclared.sloppy_mode_block_scope_function_redefinition);
        assert_eq!(declared.variable, redeclared.variable);
    }

    #[test]
    fn async_function_redefinition_stays_an_error() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let g = interner.intern("g");
        arena.declare_sloppy_block_function(
            function,
            factory.new_sloppy_block_function(g, FunctionKind::Async, 0),
        );
        let first =
            factory.new_function_declaration(factory.new_variable_proxy(g, 0), function, FunctionKind::Async, 0);
        arena
            .declare_variable(
                function,
                &first,
                VariableMode::Let,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        let second =
            factory.new_function_declaration(factory.new_variable_proxy(g, 9), function, FunctionKind::Async, 9);
        assert_eq!(
            arena
                .declare_variable(
                    function,
                    &second,
                    VariableMode::Let,
                    InitializationFlag::CreatedInitialized,
                    false,
                )
                .unwrap_err(),
            ScopeError::Redeclaration
        );
    }

    #[test]
    fn sloppy_eval_var_becomes_a_dynamic_lookup() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let eval = arena.new_eval_scope(script);
        let x = interner.intern("x");
        let declaration = factory.new_variable_declaration(factory.new_variable_proxy(x, 0), eval, 0);
        let declared = arena
            .declare_variable(
                eval,
                &declaration,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert_eq!(
            arena.variable(declared.variable).location(),
            VariableLocation::Lookup
        );
        // The lookup binding is not a local of the eval scope.
        assert!(arena.scope(eval).variables().is_empty());
        assert!(arena.scope(eval).locals().is_empty());
    }

    #[test]
    fn temporaries_belong_to_the_closure_scope() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        let temp = arena.new_temporary(block, interner.intern(".result"));
        assert_eq!(arena.variable(temp).scope(), function);
        assert_eq!(arena.variable(temp).mode(), VariableMode::Temporary);
        assert!(arena.scope(function).locals().contains(&temp));
        assert!(arena.scope(function).variables().is_empty());
    }

    #[test]
    fn record_eval_call_poisons_the_chain() {
        let (mut arena, _, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        arena.record_eval_call(block);
        assert!(arena.scope(block).calls_eval());
        // Sloppy mode: the calling scope itself is poisoned too.
        assert!(arena.scope(block).inner_scope_calls_eval());
        assert!(arena.scope(function).inner_scope_calls_eval());
        assert!(arena.scope(script).inner_scope_calls_eval());
        assert!(!arena.scope(function).calls_eval());
    }

    #[test]
    fn strict_eval_does_not_poison_its_own_scope() {
        let (mut arena, _, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        arena.set_language_mode(function, LanguageMode::Strict);
        arena.record_eval_call(function);
        assert!(arena.scope(function).calls_eval());
        assert!(!arena.scope(function).inner_scope_calls_eval());
        assert!(arena.scope(script).inner_scope_calls_eval());
    }

    #[test]
    fn conflicting_var_declaration_is_found() {
        // { let x; { var x; } } -- the inner var conflicts with the
        // outer lexical binding.
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let outer_block = arena.new_block_scope(function);
        let inner_block = arena.new_block_scope(outer_block);
        let x = interner.intern("x");

        let let_decl =
            factory.new_variable_declaration(factory.new_variable_proxy(x, 2), outer_block, 2);
        arena
            .declare_variable(
                outer_block,
                &let_decl,
                VariableMode::Let,
                InitializationFlag::NeedsInitialization,
                false,
            )
            .unwrap();

        let var_decl =
            factory.new_variable_declaration(factory.new_variable_proxy(x, 11), inner_block, 11);
        arena
            .declare_variable(
                inner_block,
                &var_decl,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();

        let conflict = arena
            .check_conflicting_var_declarations(function)
            .expect("conflict expected");
        assert!(Rc::ptr_eq(&conflict, &var_decl));
    }

    #[test]
    fn no_conflict_without_lexical_shadowing() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        let x = interner.intern("x");
        let var_decl = factory.new_variable_declaration(factory.new_variable_proxy(x, 0), block, 0);
        arena
            .declare_variable(
                block,
                &var_decl,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        assert!(arena.check_conflicting_var_declarations(function).is_none());
    }

    #[test]
    fn lex_declarations_conflicting_with_names() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let block = arena.new_block_scope(script);
        let e = interner.intern("e");
        let decl = factory.new_variable_declaration(factory.new_variable_proxy(e, 3), block, 3);
        arena
            .declare_variable(
                block,
                &decl,
                VariableMode::Let,
                InitializationFlag::NeedsInitialization,
                false,
            )
            .unwrap();
        let conflict = arena
            .check_lex_declarations_conflicting_with(block, &[e])
            .expect("conflict expected");
        assert!(Rc::ptr_eq(&conflict, &decl));
        assert!(arena
            .check_lex_declarations_conflicting_with(block, &[interner.intern("f")])
            .is_none());
    }

    #[test]
    fn empty_block_scope_is_eliminated() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        let inner_function = arena.new_function_scope(block, FunctionKind::Normal);
        let proxy = factory.new_variable_proxy(interner.intern("free"), 5);
        arena.add_unresolved(block, proxy.clone());

        assert!(arena.finalize_block_scope(block).is_none());
        assert_eq!(arena.scope(block).num_heap_slots(), 0);
        // The inner function now hangs off the function scope.
        assert_eq!(arena.scope(inner_function).outer(), Some(function));
        assert!(arena.inner_scopes(function).any(|s| s == inner_function));
        assert!(!arena.inner_scopes(function).any(|s| s == block));
        // The unresolved reference migrated.
        assert!(arena
            .scope(function)
            .unresolved()
            .any(|p| Rc::ptr_eq(&p, &proxy)));
    }

    #[test]
    fn block_scope_with_variables_is_kept() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let block = arena.new_block_scope(script);
        arena
            .declare_local(
                block,
                interner.intern("x"),
                VariableMode::Let,
                InitializationFlag::NeedsInitialization,
                VariableKind::Normal,
                false,
            )
            .unwrap();
        assert_eq!(arena.finalize_block_scope(block), Some(block));
    }

    #[test]
    fn eliminated_block_propagates_eval() {
        let (mut arena, _, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let block = arena.new_block_scope(function);
        arena.record_eval_call(block);
        // A sloppy-eval-calling block stays.
        assert_eq!(arena.finalize_block_scope(block), Some(block));

        // A strict one is elided and hands the eval flag to its parent.
        let strict_function = arena.new_function_scope(script, FunctionKind::Normal);
        arena.set_language_mode(strict_function, LanguageMode::Strict);
        let strict_block = arena.new_block_scope(strict_function);
        arena.record_eval_call(strict_block);
        assert!(arena.finalize_block_scope(strict_block).is_none());
        assert!(arena.scope(strict_function).calls_eval());
    }

    #[test]
    fn snapshot_then_immediate_reparent_is_a_no_op_above_the_line() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let existing_inner = arena.new_block_scope(function);
        let existing_proxy = factory.new_variable_proxy(interner.intern("before"), 1);
        arena.add_unresolved(function, existing_proxy.clone());
        let temp = arena.new_temporary(function, interner.intern(".t"));

        let snapshot = arena.snapshot(function);
        let arrow = arena.new_function_scope(function, FunctionKind::Arrow);
        arena.reparent(&snapshot, arrow);

        // Nothing above the line moved.
        assert_eq!(arena.scope(function).first_inner(), Some(arrow));
        assert_eq!(arena.scope(arrow).next_sibling(), Some(existing_inner));
        assert_eq!(arena.scope(existing_inner).outer(), Some(function));
        let unresolved: Vec<_> = arena.scope(function).unresolved().collect();
        assert_eq!(unresolved.len(), 1);
        assert!(Rc::ptr_eq(&unresolved[0], &existing_proxy));
        assert_eq!(arena.scope(function).locals(), &[temp]);
        // And the arrow scope stayed empty.
        assert!(arena.scope(arrow).first_inner().is_none());
        assert!(arena.scope(arrow).unresolved().next().is_none());
        assert!(arena.scope(arrow).locals().is_empty());
    }

    #[test]
    fn reparent_moves_the_speculative_frontier() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let before_proxy = factory.new_variable_proxy(interner.intern("before"), 0);
        arena.add_unresolved(function, before_proxy.clone());

        let snapshot = arena.snapshot(function);

        // Speculative parse produces scopes, references and locals that
        // turn out to belong to an arrow function body. The arrow scope
        // is created last, so it is the current first inner scope when
        // the reparent happens.
        let spec_block = arena.new_block_scope(function);
        let spec_proxy = factory.new_variable_proxy(interner.intern("inside"), 9);
        arena.add_unresolved(function, spec_proxy.clone());
        let spec_temp = arena.new_temporary(function, interner.intern(".spec"));
        let x = interner.intern("x");
        let var_decl =
            factory.new_variable_declaration(factory.new_variable_proxy(x, 12), function, 12);
        let declared = arena
            .declare_variable(
                function,
                &var_decl,
                VariableMode::Var,
                InitializationFlag::CreatedInitialized,
                false,
            )
            .unwrap();
        let arrow = arena.new_function_scope(function, FunctionKind::Arrow);

        arena.reparent(&snapshot, arrow);

        // The block scope moved under the arrow.
        assert_eq!(arena.scope(spec_block).outer(), Some(arrow));
        assert_eq!(arena.scope(arrow).first_inner(), Some(spec_block));
        // The speculative reference moved; the old one stayed.
        let arrow_unresolved: Vec<_> = arena.scope(arrow).unresolved().collect();
        assert_eq!(arrow_unresolved.len(), 1);
        assert!(Rc::ptr_eq(&arrow_unresolved[0], &spec_proxy));
        let outer_unresolved: Vec<_> = arena.scope(function).unresolved().collect();
        assert_eq!(outer_unresolved.len(), 1);
        assert!(Rc::ptr_eq(&outer_unresolved[0], &before_proxy));
        // Locals and the var binding migrated, map included.
        assert!(arena.scope(arrow).locals().contains(&spec_temp));
        assert!(arena.scope(arrow).locals().contains(&declared.variable));
        assert_eq!(arena.variable(declared.variable).scope(), arrow);
        assert_eq!(arena.scope(arrow).variables().lookup(x), Some(declared.variable));
        assert_eq!(arena.scope(function).variables().lookup(x), None);
        assert!(arena.scope(function).locals().is_empty());
        assert!(arena.scope(function).declarations().is_empty());
    }

    #[test]
    fn parameters_track_arity_and_duplicates() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let a = interner.intern("a");
        let b = interner.intern("b");

        let (_, dup) = arena.declare_parameter(function, a, VariableMode::Var, false, false, &interner);
        assert!(!dup);
        let (_, dup) = arena.declare_parameter(function, b, VariableMode::Var, true, false, &interner);
        assert!(!dup);
        // Duplicate name in sloppy mode.
        let (second_a, dup) =
            arena.declare_parameter(function, a, VariableMode::Var, false, false, &interner);
        assert!(dup);

        let fields = arena.scope(function).as_declaration().unwrap();
        assert_eq!(fields.parameters().len(), 3);
        // Arity stopped counting at the optional parameter.
        assert_eq!(fields.arity(), 1);
        // The duplicate reuses the same variable.
        assert_eq!(fields.parameters()[0], second_a);
    }

    #[test]
    fn rest_and_arguments_parameters_are_recorded() {
        let (mut arena, mut interner, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        arena.declare_parameter(
            function,
            interner.arguments_string(),
            VariableMode::Var,
            false,
            false,
            &interner,
        );
        arena.declare_parameter(
            function,
            interner.intern("rest"),
            VariableMode::Var,
            false,
            true,
            &interner,
        );
        let fields = arena.scope(function).as_declaration().unwrap();
        assert!(fields.has_arguments_parameter());
        assert!(fields.has_rest());
        assert_eq!(arena.rest_parameter(function), fields.parameters().last().copied());
    }

    #[test]
    fn remove_unresolved_unlinks_the_proxy() {
        let (mut arena, mut interner, factory) = setup();
        let script = arena.new_script_scope();
        let a = factory.new_variable_proxy(interner.intern("a"), 0);
        let b = factory.new_variable_proxy(interner.intern("b"), 1);
        let c = factory.new_variable_proxy(interner.intern("c"), 2);
        arena.add_unresolved(script, a.clone());
        arena.add_unresolved(script, b.clone());
        arena.add_unresolved(script, c.clone());

        assert!(arena.remove_unresolved(script, &b));
        let remaining: Vec<_> = arena.scope(script).unresolved().collect();
        assert_eq!(remaining.len(), 2);
        assert!(Rc::ptr_eq(&remaining[0], &c));
        assert!(Rc::ptr_eq(&remaining[1], &a));
        assert!(!arena.remove_unresolved(script, &b));
    }

    #[test]
    fn closure_and_receiver_scope_queries() {
        let (mut arena, _, _) = setup();
        let script = arena.new_script_scope();
        let function = arena.new_function_scope(script, FunctionKind::Normal);
        let arrow = arena.new_function_scope(function, FunctionKind::Arrow);
        let block = arena.new_block_scope(arrow);
        assert_eq!(arena.get_closure_scope(block), arrow);
        assert_eq!(arena.get_receiver_scope(block), function);
        assert_eq!(arena.get_declaration_scope(block), arrow);
        let decl_block = arena.new_declaration_block_scope(function);
        let inner = arena.new_block_scope(decl_block);
        assert_eq!(arena.get_declaration_scope(inner), decl_block);
        assert_eq!(arena.get_closure_scope(inner), function);
    }
}
